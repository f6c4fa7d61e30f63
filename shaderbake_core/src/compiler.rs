use crate::source::ShaderSource;
use err_derive::Error;
use log::{debug, info};
use std::env;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

#[derive(Debug, Error)]
pub enum CompileError {
    #[error(display = "Failed to run \"{}\": {}", program, err)]
    Spawn { program: String, err: io::Error },
    #[error(display = "Compiler failed ({}):\n{}", status, stderr)]
    Failed { status: ExitStatus, stderr: String },
    #[error(display = "Compiler produced an invalid module: {}", err)]
    InvalidModule { err: crate::module::ModuleError },
}

/// Which command line to build for the external compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flavor {
    /// glslc from shaderc
    Glslc,
    /// glslangValidator, the Khronos reference compiler
    Glslang,
}

impl Flavor {
    pub fn from_name(name: &str) -> Option<Flavor> {
        match name {
            "glslc" => Some(Flavor::Glslc),
            "glslang" | "glslangValidator" => Some(Flavor::Glslang),
            _ => None,
        }
    }

    pub fn program_name(self) -> &'static str {
        match self {
            Flavor::Glslc => "glslc",
            Flavor::Glslang => "glslangValidator",
        }
    }
}

#[derive(Debug, Default)]
pub struct CompileOutput {
    /// Whatever the compiler printed to stderr on success
    pub warnings: String,
}

impl CompileOutput {
    pub fn has_warnings(&self) -> bool {
        !self.warnings.trim().is_empty()
    }
}

/// Turns one shader source into a binary module at `artifact`.
pub trait Compile: Sync {
    fn compile(
        &self,
        source: &ShaderSource,
        artifact: &Path,
    ) -> Result<CompileOutput, CompileError>;
}

/// An external offline compiler, run once per source.
#[derive(Debug, Clone)]
pub struct Compiler {
    program: PathBuf,
    flavor: Flavor,
    args: Vec<String>,
}

impl Compiler {
    pub fn new(program: impl Into<PathBuf>, flavor: Flavor) -> Self {
        Compiler {
            program: program.into(),
            flavor,
            args: Vec::new(),
        }
    }

    /// Looks for the compiler on PATH and in the Vulkan SDK.
    pub fn locate(flavor: Flavor) -> Self {
        let name = flavor.program_name();

        let program = find_program(name).unwrap_or_else(|| PathBuf::from(name));
        info!("Using {}", program.display());

        Compiler::new(program, flavor)
    }

    /// Extra arguments passed before the generated ones.
    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn args(&self, source: &ShaderSource, artifact: &Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = self.args.iter().map(OsString::from).collect();

        match self.flavor {
            Flavor::Glslc => {
                args.push(format!("-fshader-stage={}", source.stage.short_name()).into());
            }
            Flavor::Glslang => {
                args.push("-V".into());
                args.push("-S".into());
                args.push(source.stage.short_name().into());
            }
        }

        args.push("-o".into());
        args.push(artifact.into());
        args.push(source.path.clone().into());

        args
    }
}

impl Compile for Compiler {
    fn compile(
        &self,
        source: &ShaderSource,
        artifact: &Path,
    ) -> Result<CompileOutput, CompileError> {
        let args = self.args(source, artifact);
        debug!("{} {:?}", self.program.display(), args);

        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| CompileError::Spawn {
                program: self.program.display().to_string(),
                err,
            })?;

        let mut diagnostics = String::from_utf8_lossy(&output.stderr).into_owned();

        if output.status.success() {
            return Ok(CompileOutput {
                warnings: diagnostics,
            });
        }

        // glslangValidator reports errors on stdout
        if self.flavor == Flavor::Glslang {
            diagnostics.push_str(&String::from_utf8_lossy(&output.stdout));
        }

        Err(CompileError::Failed {
            status: output.status,
            stderr: diagnostics,
        })
    }
}

fn find_program(name: &str) -> Option<PathBuf> {
    if let Ok(output) = Command::new(name)
        .arg("--version")
        .stdin(Stdio::null())
        .output()
    {
        if output.status.success() {
            return Some(PathBuf::from(name));
        }
    }

    let sdk = env::var_os("VULKAN_SDK")?;
    let file_name = format!("{}{}", name, env::consts::EXE_SUFFIX);

    ["bin", "Bin"]
        .iter()
        .map(|bin| PathBuf::from(&sdk).join(bin).join(&file_name))
        .find(|path| path.exists())
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::stage::ShaderStage;
    use std::fs;
    use tempfile::TempDir;

    /// Stands in for glslc: writes a SPIR-V header to the `-o` path, or fails
    /// when the source contains `SYNTAX_ERROR`. Warns on `WARNING`.
    pub const FAKE_COMPILER: &str = r#"
out=""
src=""
while [ $# -gt 0 ]; do
    case "$1" in
        -o) out="$2"; shift 2 ;;
        -*) shift ;;
        *) src="$1"; shift ;;
    esac
done
if grep -q SYNTAX_ERROR "$src"; then
    echo "$src:1: error: 'vec5' : no matching overloaded function found" >&2
    exit 1
fi
if grep -q WARNING "$src"; then
    echo "$src:1: warning: unused variable" >&2
fi
printf '\003\002\043\007\000\000\001\000\000\000\000\000\001\000\000\000\000\000\000\000' > "$out"
"#;

    /// A compiler that runs the fake script through `sh`.
    pub fn fake_compiler(dir: &Path) -> Compiler {
        let script = dir.join("fake-glslc.sh");
        fs::write(&script, FAKE_COMPILER).unwrap();
        Compiler::new("sh", Flavor::Glslc).with_args(vec![script.display().to_string()])
    }

    #[test]
    fn glslc_arguments() {
        let compiler = Compiler::new("glslc", Flavor::Glslc).with_args(vec!["-O".into()]);
        let source = ShaderSource::new("shaders/a.frag", ShaderStage::Fragment);
        let args = compiler.args(&source, Path::new("shaders/a.frag.spv"));

        let expected: Vec<OsString> = vec![
            "-O".into(),
            "-fshader-stage=frag".into(),
            "-o".into(),
            "shaders/a.frag.spv".into(),
            "shaders/a.frag".into(),
        ];
        assert_eq!(args, expected);
    }

    #[test]
    fn glslang_arguments() {
        let compiler = Compiler::new("glslangValidator", Flavor::Glslang);
        let source = ShaderSource::new("a.vert", ShaderStage::Vertex);
        let args = compiler.args(&source, Path::new("a.vert.spv"));

        let expected: Vec<OsString> = vec![
            "-V".into(),
            "-S".into(),
            "vert".into(),
            "-o".into(),
            "a.vert.spv".into(),
            "a.vert".into(),
        ];
        assert_eq!(args, expected);
    }

    #[test]
    fn flavor_names() {
        assert_eq!(Flavor::from_name("glslc"), Some(Flavor::Glslc));
        assert_eq!(Flavor::from_name("glslangValidator"), Some(Flavor::Glslang));
        assert_eq!(Flavor::from_name("dxc"), None);
    }

    #[test]
    fn missing_program_is_a_spawn_error() {
        let compiler = Compiler::new("/nonexistent/shaderbake-glslc", Flavor::Glslc);
        let source = ShaderSource::new("a.vert", ShaderStage::Vertex);

        match compiler.compile(&source, Path::new("a.vert.spv")) {
            Err(CompileError::Spawn { .. }) => {}
            other => panic!("unexpected {:?}", other),
        }
    }

    #[cfg(unix)]
    #[test]
    fn runs_external_compiler() {
        let dir = TempDir::new().unwrap();
        let compiler = fake_compiler(dir.path());

        let path = dir.path().join("a.vert");
        fs::write(&path, "void main() {}\n").unwrap();
        let source = ShaderSource::new(path, ShaderStage::Vertex);
        let artifact = source.artifact_path("spv");

        let output = compiler.compile(&source, &artifact).unwrap();
        assert!(!output.has_warnings());
        assert!(crate::module::CompiledModule::load(&artifact).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn keeps_warnings() {
        let dir = TempDir::new().unwrap();
        let compiler = fake_compiler(dir.path());

        let path = dir.path().join("a.frag");
        fs::write(&path, "// WARNING\nvoid main() {}\n").unwrap();
        let source = ShaderSource::new(path, ShaderStage::Fragment);

        let output = compiler.compile(&source, &source.artifact_path("spv")).unwrap();
        assert!(output.warnings.contains("unused variable"));
    }

    #[cfg(unix)]
    #[test]
    fn failing_compiler_reports_stderr() {
        let dir = TempDir::new().unwrap();
        let compiler = fake_compiler(dir.path());

        let path = dir.path().join("b.vert");
        fs::write(&path, "uniform vec5 SYNTAX_ERROR;\n").unwrap();
        let source = ShaderSource::new(path, ShaderStage::Vertex);

        match compiler.compile(&source, &source.artifact_path("spv")) {
            Err(CompileError::Failed { status, stderr }) => {
                assert_eq!(status.code(), Some(1));
                assert!(stderr.contains("vec5"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
