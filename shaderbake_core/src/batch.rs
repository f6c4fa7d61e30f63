use crate::compiler::{Compile, CompileError};
use crate::module::CompiledModule;
use crate::source::ShaderSource;
use err_derive::Error;
use log::{error, info, warn};
use rayon::prelude::*;
use rayon::{ThreadPoolBuildError, ThreadPoolBuilder};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

#[derive(Debug, Error)]
pub enum BatchError {
    #[error(display = "Failed to create threadpool: {}", err)]
    ThreadPoolCreation { err: ThreadPoolBuildError },
}

#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// 1 compiles one file after another, 0 uses every core
    pub jobs: usize,
    /// Stop starting new compiles after the first failure
    pub fail_fast: bool,
    /// Skip sources whose artifact is at least as new as the source
    pub changed_only: bool,
    /// Check that every artifact is a SPIR-V module
    pub verify: bool,
    pub suffix: String,
}

impl Default for BatchOptions {
    fn default() -> Self {
        BatchOptions {
            jobs: 1,
            fail_fast: false,
            changed_only: false,
            verify: true,
            suffix: "spv".into(),
        }
    }
}

#[derive(Debug)]
pub struct Failure {
    pub source: PathBuf,
    pub error: CompileError,
}

#[derive(Debug, Default)]
pub struct BatchReport {
    pub compiled: Vec<PathBuf>,
    pub up_to_date: Vec<PathBuf>,
    pub skipped: Vec<PathBuf>,
    pub failures: Vec<Failure>,
}

impl BatchReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn total(&self) -> usize {
        self.compiled.len() + self.up_to_date.len() + self.skipped.len() + self.failures.len()
    }
}

impl fmt::Display for BatchReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} compiled", self.compiled.len())?;

        if !self.up_to_date.is_empty() {
            write!(f, ", {} up to date", self.up_to_date.len())?;
        }

        write!(f, ", {} failed", self.failures.len())?;

        if !self.skipped.is_empty() {
            write!(f, ", {} skipped", self.skipped.len())?;
        }

        Ok(())
    }
}

enum Outcome {
    Compiled(PathBuf),
    UpToDate,
    Skipped,
    Failed(CompileError),
}

pub struct Batch<'a, C: Compile> {
    compiler: &'a C,
    options: BatchOptions,
}

impl<'a, C: Compile> Batch<'a, C> {
    pub fn new(compiler: &'a C, options: BatchOptions) -> Self {
        Batch { compiler, options }
    }

    pub fn run(&self, sources: &[ShaderSource]) -> Result<BatchReport, BatchError> {
        let abort = AtomicBool::new(false);

        let outcomes: Vec<Outcome> = if self.options.jobs == 1 || sources.len() < 2 {
            sources
                .iter()
                .map(|source| self.compile_one(source, &abort))
                .collect()
        } else {
            let pool = ThreadPoolBuilder::new()
                .num_threads(self.options.jobs)
                .thread_name(|i| format!("shaderbake-{}", i))
                .build()
                .map_err(|err| BatchError::ThreadPoolCreation { err })?;

            pool.install(|| {
                sources
                    .par_iter()
                    .map(|source| self.compile_one(source, &abort))
                    .collect()
            })
        };

        let mut report = BatchReport::default();
        for (source, outcome) in sources.iter().zip(outcomes) {
            match outcome {
                Outcome::Compiled(artifact) => report.compiled.push(artifact),
                Outcome::UpToDate => report.up_to_date.push(source.path.clone()),
                Outcome::Skipped => report.skipped.push(source.path.clone()),
                Outcome::Failed(error) => report.failures.push(Failure {
                    source: source.path.clone(),
                    error,
                }),
            }
        }

        Ok(report)
    }

    fn compile_one(&self, source: &ShaderSource, abort: &AtomicBool) -> Outcome {
        if self.options.fail_fast && abort.load(Ordering::SeqCst) {
            return Outcome::Skipped;
        }

        let artifact = source.artifact_path(&self.options.suffix);

        if self.options.changed_only
            && is_up_to_date(&source.path, &artifact)
            && (!self.options.verify || CompiledModule::load(&artifact).is_ok())
        {
            info!("{} is up to date", source.path.display());
            return Outcome::UpToDate;
        }

        info!("Compiling {}...", source.path.display());

        match self.compile_and_verify(source, &artifact) {
            Ok(()) => Outcome::Compiled(artifact),
            Err(err) => {
                error!("{} failed: {}", source.path.display(), err);
                abort.store(true, Ordering::SeqCst);
                Outcome::Failed(err)
            }
        }
    }

    fn compile_and_verify(
        &self,
        source: &ShaderSource,
        artifact: &Path,
    ) -> Result<(), CompileError> {
        let output = self.compiler.compile(source, artifact)?;

        if output.has_warnings() {
            warn!("{}:\n{}", source.path.display(), output.warnings.trim_end());
        }

        if self.options.verify {
            if let Err(err) = CompiledModule::load(artifact) {
                // a broken module must not look up to date on the next run
                let _ = fs::remove_file(artifact);
                return Err(CompileError::InvalidModule { err });
            }
        }

        Ok(())
    }
}

fn is_up_to_date(source: &Path, artifact: &Path) -> bool {
    let modified = |path: &Path| fs::metadata(path).and_then(|meta| meta.modified());

    match (modified(source), modified(artifact)) {
        (Ok(source), Ok(artifact)) => artifact >= source,
        _ => false,
    }
}
