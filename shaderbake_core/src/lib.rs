pub mod batch;
pub mod compiler;
pub mod config;
pub mod logger;
pub mod module;
pub mod prelude;
pub mod source;
pub mod stage;

use crate::{
    batch::{Batch, BatchError, BatchReport},
    compiler::{Compiler, Flavor},
    config::{Config, ConfigError, Settings},
    source::{discover, DiscoverError},
};
use clap::{App, Arg, ArgMatches};
use err_derive::Error;
use log::{debug, LevelFilter};
use std::ffi::OsString;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Picked up from the working directory when no `--config` is given.
pub const DEFAULT_CONFIG: &str = "shaderbake.yml";

#[derive(Debug, Error)]
pub enum InitError {
    #[error(display = "Failed to load config: {}", err)]
    Config { err: ConfigError },
}

#[derive(Debug, Error)]
pub enum BakeError {
    #[error(display = "Failed to find shaders: {}", err)]
    Discover { err: DiscoverError },
    #[error(display = "Failed to run batch: {}", err)]
    Batch { err: BatchError },
    #[error(display = "Failed to write status: {}", err)]
    Status { err: io::Error },
}

pub fn app<'a, 'b>(version: &'b str) -> App<'a, 'b> {
    App::new("shaderbake")
        .version(version)
        .about("Compiles GLSL shaders to SPIR-V modules next to their sources")
        .arg(
            Arg::with_name("root")
                .short("r")
                .long("root")
                .value_name("DIR")
                .help("Shader source directory, searched recursively"),
        )
        .arg(
            Arg::with_name("config")
                .short("c")
                .long("config")
                .value_name("FILE")
                .help("Config file (default: ./shaderbake.yml if present)"),
        )
        .arg(
            Arg::with_name("compiler")
                .long("compiler")
                .value_name("PROGRAM")
                .help("Compiler executable, found automatically if not given"),
        )
        .arg(
            Arg::with_name("flavor")
                .long("flavor")
                .value_name("NAME")
                .possible_values(&["glslc", "glslang"])
                .help("Which compiler command line to use"),
        )
        .arg(
            Arg::with_name("jobs")
                .short("j")
                .long("jobs")
                .value_name("N")
                .validator(|jobs| {
                    jobs.parse::<usize>()
                        .map(|_| ())
                        .map_err(|_| "must be a number".to_owned())
                })
                .help("Parallel compiles, 0 for one per core"),
        )
        .arg(
            Arg::with_name("fail-fast")
                .long("fail-fast")
                .help("Stop after the first shader that fails"),
        )
        .arg(
            Arg::with_name("changed-only")
                .long("changed-only")
                .help("Only compile shaders newer than their module"),
        )
        .arg(
            Arg::with_name("no-verify")
                .long("no-verify")
                .help("Don't check that the output is SPIR-V"),
        )
        .arg(
            Arg::with_name("no-color")
                .long("no-color")
                .help("Don't color the console log"),
        )
        .arg(
            Arg::with_name("verbose")
                .short("v")
                .long("verbose")
                .help("Log debug output"),
        )
}

/// Command line flags, each one overrides the config file.
#[derive(Debug, Default, Clone)]
pub struct Options {
    pub root: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub compiler: Option<PathBuf>,
    pub flavor: Option<Flavor>,
    pub jobs: Option<usize>,
    pub fail_fast: bool,
    pub changed_only: bool,
    pub no_verify: bool,
    pub no_color: bool,
    pub verbose: bool,
}

impl Options {
    pub fn parse<I, T>(version: &str, args: I) -> Result<Options, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = app(version).get_matches_from_safe(args)?;
        Ok(Options::from_matches(&matches))
    }

    pub fn from_matches(matches: &ArgMatches) -> Options {
        Options {
            root: matches.value_of_os("root").map(PathBuf::from),
            config: matches.value_of_os("config").map(PathBuf::from),
            compiler: matches.value_of_os("compiler").map(PathBuf::from),
            flavor: matches.value_of("flavor").and_then(Flavor::from_name),
            jobs: matches.value_of("jobs").and_then(|jobs| jobs.parse().ok()),
            fail_fast: matches.is_present("fail-fast"),
            changed_only: matches.is_present("changed-only"),
            no_verify: matches.is_present("no-verify"),
            no_color: matches.is_present("no-color"),
            verbose: matches.is_present("verbose"),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }

    pub fn apply(&self, settings: &mut Settings) {
        if let Some(root) = &self.root {
            settings.root = root.clone();
        }
        if let Some(program) = &self.compiler {
            settings.compiler.program = Some(program.clone());
        }
        if let Some(flavor) = self.flavor {
            settings.compiler.flavor = flavor;
        }
        if let Some(jobs) = self.jobs {
            settings.batch.jobs = jobs;
        }

        settings.batch.fail_fast |= self.fail_fast;
        settings.batch.changed_only |= self.changed_only;
        settings.batch.verify &= !self.no_verify;
    }
}

pub struct ShaderBake {
    settings: Settings,
    compiler: Compiler,
}

impl ShaderBake {
    /// Loads the config and resolves the compiler. Expects the logger to be set up.
    pub fn new(options: &Options) -> Result<Self, InitError> {
        let config = match &options.config {
            Some(path) => Config::new(path),
            None if Path::new(DEFAULT_CONFIG).is_file() => Config::new(DEFAULT_CONFIG),
            None => Ok(Config::default()),
        }
        .map_err(|err| InitError::Config { err })?;

        let mut settings = config.settings().map_err(|err| InitError::Config { err })?;
        options.apply(&mut settings);
        debug!("{:?}", settings);

        let compiler = settings.compiler.compiler();

        Ok(ShaderBake::with_compiler(settings, compiler))
    }

    pub fn with_compiler(settings: Settings, compiler: Compiler) -> Self {
        ShaderBake { settings, compiler }
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// One pass over every shader under the root. The two status lines go to
    /// `status`, everything else to the log.
    pub fn run(&self, status: &mut impl Write) -> Result<BatchReport, BakeError> {
        let root = &self.settings.root;
        let sources =
            discover(root, &self.settings.stages).map_err(|err| BakeError::Discover { err })?;

        writeln!(
            status,
            "Compiling {} shaders in {}...",
            sources.len(),
            root.display()
        )
        .map_err(|err| BakeError::Status { err })?;

        let report = Batch::new(&self.compiler, self.settings.batch.clone())
            .run(&sources)
            .map_err(|err| BakeError::Batch { err })?;

        writeln!(status, "Finished: {}", report).map_err(|err| BakeError::Status { err })?;

        Ok(report)
    }
}
