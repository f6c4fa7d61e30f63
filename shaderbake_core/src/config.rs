use crate::{
    batch::BatchOptions,
    compiler::{Compiler, Flavor},
    stage::{ShaderStage, StageTable},
};
use err_derive::Error;
use serde_yaml::Value;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const TEMPLATE: &str = include_str!("../resources/config.yml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(display = "Failed to read config file: {}", err)]
    ReadConfigFile { err: io::Error },
    #[error(display = "Failed to parse config: {}", err)]
    ParseConfig { err: serde_yaml::Error },
    #[error(
        display = "The structure of \"{}\" is not valid, please refer to:\n{}",
        path_str,
        template
    )]
    StructureValidation { path_str: String, template: String },
    #[error(display = "Invalid value for \"{}\": {}", key, reason)]
    InvalidValue { key: String, reason: String },
}

/// The config file merged over the built-in defaults.
#[derive(Debug)]
pub struct Config {
    conf: Value,
}

impl Config {
    #[allow(clippy::new_ret_no_self)]
    pub fn new(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let conf_src = match fs::read_to_string(&path) {
            Ok(conf_src) => conf_src,
            Err(err) => {
                return Err(ConfigError::ReadConfigFile { err });
            }
        };

        Config::parse(&conf_src, &path.as_ref().display().to_string())
    }

    /// `origin` only shows up in error messages.
    pub fn parse(conf_src: &str, origin: &str) -> Result<Config, ConfigError> {
        // serde_yaml refuses a stream without a document
        let conf = if is_blank(conf_src) {
            Value::Null
        } else {
            match serde_yaml::from_str(conf_src) {
                Ok(conf) => conf,
                Err(err) => return Err(ConfigError::ParseConfig { err }),
            }
        };

        let mut merged = template();

        if !conf.is_null() {
            if !matches_template(&conf, &merged) {
                return Err(ConfigError::StructureValidation {
                    path_str: origin.into(),
                    template: TEMPLATE.to_owned(),
                });
            }

            merge(&mut merged, conf);
        }

        Ok(Config { conf: merged })
    }

    pub fn settings(&self) -> Result<Settings, ConfigError> {
        let shaders = &self.conf["shaders"];
        let compiler = &self.conf["compiler"];
        let batch = &self.conf["batch"];

        let suffix = string(&shaders["suffix"], "shaders.suffix")?;
        if suffix.is_empty() {
            return Err(invalid("shaders.suffix", "must not be empty"));
        }

        let flavor_name = string(&compiler["flavor"], "compiler.flavor")?;
        let flavor = Flavor::from_name(flavor_name).ok_or_else(|| {
            invalid(
                "compiler.flavor",
                format!("unknown compiler \"{}\"", flavor_name),
            )
        })?;

        let program = match string(&compiler["program"], "compiler.program")? {
            "" => None,
            program => Some(PathBuf::from(program)),
        };

        let args = match compiler["args"].as_sequence() {
            Some(args) => args
                .iter()
                .map(|arg| string(arg, "compiler.args").map(str::to_owned))
                .collect::<Result<Vec<_>, _>>()?,
            None => return Err(invalid("compiler.args", "expected a list")),
        };

        let jobs = batch["jobs"]
            .as_u64()
            .ok_or_else(|| invalid("batch.jobs", "expected a positive number"))?;

        Ok(Settings {
            root: PathBuf::from(string(&shaders["root"], "shaders.root")?),
            stages: stage_table(&shaders["extensions"])?,
            compiler: CompilerSettings {
                flavor,
                program,
                args,
            },
            batch: BatchOptions {
                jobs: jobs as usize,
                fail_fast: boolean(&batch["fail_fast"], "batch.fail_fast")?,
                changed_only: boolean(&batch["changed_only"], "batch.changed_only")?,
                verify: boolean(&batch["verify"], "batch.verify")?,
                suffix: suffix.to_owned(),
            },
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Config { conf: template() }
    }
}

#[derive(Debug, Clone)]
pub struct CompilerSettings {
    pub flavor: Flavor,
    pub program: Option<PathBuf>,
    pub args: Vec<String>,
}

impl CompilerSettings {
    pub fn compiler(&self) -> Compiler {
        let compiler = match &self.program {
            Some(program) => Compiler::new(program, self.flavor),
            None => Compiler::locate(self.flavor),
        };

        compiler.with_args(self.args.clone())
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub root: PathBuf,
    pub stages: StageTable,
    pub compiler: CompilerSettings,
    pub batch: BatchOptions,
}

fn is_blank(conf_src: &str) -> bool {
    conf_src.lines().all(|line| {
        let line = line.trim();
        line.is_empty() || line.starts_with('#') || line == "---"
    })
}

fn template() -> Value {
    match serde_yaml::from_str(TEMPLATE) {
        Ok(template) => template,
        Err(err) => panic!("Template is invalid: {}", err),
    }
}

fn stage_table(extensions: &Value) -> Result<StageTable, ConfigError> {
    let map = match extensions.as_mapping() {
        Some(map) if !map.is_empty() => map,
        _ => return Ok(StageTable::default()),
    };

    let mut table = StageTable::new();
    for (ext, stage) in map.iter() {
        let ext = string(ext, "shaders.extensions")?;
        let name = string(stage, "shaders.extensions")?;
        let stage = ShaderStage::from_name(name)
            .ok_or_else(|| invalid("shaders.extensions", format!("unknown stage \"{}\"", name)))?;

        table.insert(ext.trim_start_matches('.'), stage);
    }

    Ok(table)
}

fn string<'a>(value: &'a Value, key: &str) -> Result<&'a str, ConfigError> {
    value.as_str().ok_or_else(|| invalid(key, "expected a string"))
}

fn boolean(value: &Value, key: &str) -> Result<bool, ConfigError> {
    value.as_bool().ok_or_else(|| invalid(key, "expected true or false"))
}

fn invalid(key: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.into(),
        reason: reason.into(),
    }
}

/// Every key of `conf` has to exist in `template` with a value of the same
/// kind. Empty mappings and lists in the template accept any strings.
fn matches_template(conf: &Value, template: &Value) -> bool {
    match (conf, template) {
        (Value::Mapping(conf), Value::Mapping(template)) if template.is_empty() => {
            conf.iter().all(|(key, val)| key.is_string() && val.is_string())
        }
        (Value::Mapping(conf), Value::Mapping(template)) => conf.iter().all(|(key, val)| {
            template
                .get(key)
                .map_or(false, |template| matches_template(val, template))
        }),
        (Value::Sequence(conf), Value::Sequence(template)) => match template.first() {
            Some(template) => conf.iter().all(|val| matches_template(val, template)),
            None => conf.iter().all(Value::is_string),
        },
        (conf, template) => normalize_value(conf) == normalize_value(template),
    }
}

fn normalize_value(value: &Value) -> Value {
    match value {
        Value::Null => Value::Null,
        Value::Bool(_) => Value::Bool(false),
        Value::Number(_) => Value::Number(serde_yaml::Number::from(0)),
        Value::String(_) => Value::String(String::new()),
        Value::Sequence(_) => Value::Sequence(Vec::new()),
        Value::Mapping(_) => Value::Mapping(serde_yaml::Mapping::new()),
    }
}

fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Mapping(base), Value::Mapping(overlay)) => {
            for (key, val) in overlay {
                match base.get_mut(&key) {
                    Some(base) => merge(base, val),
                    None => {
                        base.insert(key, val);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_come_from_template() {
        let settings = Config::default().settings().unwrap();

        assert_eq!(settings.root, PathBuf::from("shaders"));
        assert_eq!(settings.batch.suffix, "spv");
        assert_eq!(settings.batch.jobs, 1);
        assert!(!settings.batch.fail_fast);
        assert!(!settings.batch.changed_only);
        assert!(settings.batch.verify);
        assert_eq!(settings.compiler.flavor, Flavor::Glslc);
        assert_eq!(settings.compiler.program, None);
        assert!(settings.compiler.args.is_empty());
        assert_eq!(settings.stages.stage_of("vert"), Some(ShaderStage::Vertex));
        assert_eq!(settings.stages.stage_of("frag"), Some(ShaderStage::Fragment));
    }

    #[test]
    fn empty_file_is_defaults() {
        let settings = Config::parse("\n", "test").unwrap().settings().unwrap();
        assert_eq!(settings.root, PathBuf::from("shaders"));
    }

    #[test]
    fn commented_out_file_is_defaults() {
        let src = "# everything commented out\n---\n# batch:\n#   jobs: 4\n";
        let settings = Config::parse(src, "test").unwrap().settings().unwrap();
        assert_eq!(settings.batch.jobs, 1);

        let commented: String = TEMPLATE
            .lines()
            .map(|line| format!("# {}\n", line))
            .collect();
        let settings = Config::parse(&commented, "test").unwrap().settings().unwrap();
        assert_eq!(settings.root, PathBuf::from("shaders"));
    }

    #[test]
    fn comments_next_to_keys_still_count() {
        let src = "# bake faster\nbatch:\n  jobs: 4 # one per core\n";
        let settings = Config::parse(src, "test").unwrap().settings().unwrap();
        assert_eq!(settings.batch.jobs, 4);
    }

    #[test]
    fn partial_config_overrides() {
        let src = r#"
shaders:
  root: "assets/glsl"
  extensions:
    vs: "vertex"
    ".fs": "fragment"
compiler:
  flavor: "glslang"
  program: "/opt/vulkan/bin/glslangValidator"
  args: ["--target-env", "vulkan1.2"]
batch:
  jobs: 0
  fail_fast: true
"#;
        let settings = Config::parse(src, "test").unwrap().settings().unwrap();

        assert_eq!(settings.root, PathBuf::from("assets/glsl"));
        assert_eq!(settings.batch.suffix, "spv");
        assert_eq!(settings.stages.stage_of("vs"), Some(ShaderStage::Vertex));
        assert_eq!(settings.stages.stage_of("fs"), Some(ShaderStage::Fragment));
        assert_eq!(settings.stages.stage_of("vert"), None);
        assert_eq!(settings.compiler.flavor, Flavor::Glslang);
        assert_eq!(
            settings.compiler.program,
            Some(PathBuf::from("/opt/vulkan/bin/glslangValidator"))
        );
        assert_eq!(settings.compiler.args, vec!["--target-env", "vulkan1.2"]);
        assert_eq!(settings.batch.jobs, 0);
        assert!(settings.batch.fail_fast);
        assert!(settings.batch.verify);
    }

    #[test]
    fn unknown_keys_are_rejected() {
        match Config::parse("shaders:\n  rot: \"x\"\n", "test.yml") {
            Err(ConfigError::StructureValidation { path_str, .. }) => {
                assert_eq!(path_str, "test.yml")
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn wrong_kinds_are_rejected() {
        assert!(Config::parse("batch:\n  jobs: \"many\"\n", "test").is_err());
        assert!(Config::parse("compiler:\n  args: [1, 2]\n", "test").is_err());
        assert!(Config::parse("- a\n- b\n", "test").is_err());
    }

    #[test]
    fn bad_values_are_rejected() {
        let bad = [
            "compiler:\n  flavor: \"dxc\"\n",
            "shaders:\n  suffix: \"\"\n",
            "shaders:\n  extensions:\n    comp: \"compute\"\n",
            "batch:\n  jobs: -1\n",
        ];

        for src in &bad {
            match Config::parse(src, "test").unwrap().settings() {
                Err(ConfigError::InvalidValue { .. }) => {}
                other => panic!("{:?} gave {:?}", src, other),
            }
        }
    }

    #[test]
    fn unparsable_yaml() {
        match Config::parse("shaders: [", "test") {
            Err(ConfigError::ParseConfig { .. }) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn missing_file() {
        match Config::new("/nonexistent/shaderbake.yml") {
            Err(ConfigError::ReadConfigFile { .. }) => {}
            other => panic!("unexpected {:?}", other),
        }
    }
}
