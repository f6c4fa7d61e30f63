use crate::stage::{ShaderStage, StageTable};
use err_derive::Error;
use log::{debug, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum DiscoverError {
    #[error(display = "Failed to walk shader directory: {}", err)]
    Walk { err: walkdir::Error },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSource {
    pub path: PathBuf,
    pub stage: ShaderStage,
}

impl ShaderSource {
    pub fn new(path: impl Into<PathBuf>, stage: ShaderStage) -> Self {
        ShaderSource {
            path: path.into(),
            stage,
        }
    }

    /// `shaders/a.vert` -> `shaders/a.vert.spv`
    pub fn artifact_path(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".");
        name.push(suffix);
        PathBuf::from(name)
    }
}

/// Recursively collects every file below `root` whose extension is in `table`.
///
/// A missing root is not an error, there is just nothing to compile.
pub fn discover(
    root: impl AsRef<Path>,
    table: &StageTable,
) -> Result<Vec<ShaderSource>, DiscoverError> {
    let root = root.as_ref();

    if !root.exists() {
        warn!("Shader directory {} does not exist", root.display());
        return Ok(Vec::new());
    }

    let mut sources = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|err| DiscoverError::Walk { err })?;

        if !entry.file_type().is_file() {
            continue;
        }

        let stage = match entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| table.stage_of(ext))
        {
            Some(stage) => stage,
            None => continue,
        };

        debug!("Found {} shader {}", stage, entry.path().display());
        sources.push(ShaderSource::new(entry.into_path(), stage));
    }

    sources.sort_by(|a, b| a.path.cmp(&b.path));

    Ok(sources)
}
