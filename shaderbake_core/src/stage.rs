use hashbrown::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl ShaderStage {
    pub fn from_extension(ext: &str) -> Option<ShaderStage> {
        match ext {
            "vert" => Some(ShaderStage::Vertex),
            "frag" => Some(ShaderStage::Fragment),
            _ => None,
        }
    }

    /// Parses the stage names used in the config file.
    pub fn from_name(name: &str) -> Option<ShaderStage> {
        match name {
            "vertex" | "vert" => Some(ShaderStage::Vertex),
            "fragment" | "frag" => Some(ShaderStage::Fragment),
            _ => None,
        }
    }

    /// glslc's `-fshader-stage=` and glslangValidator's `-S` both take this
    pub fn short_name(self) -> &'static str {
        match self {
            ShaderStage::Vertex => "vert",
            ShaderStage::Fragment => "frag",
        }
    }
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ShaderStage::Vertex => write!(f, "vertex"),
            ShaderStage::Fragment => write!(f, "fragment"),
        }
    }
}

/// Which file extensions are treated as shader sources, and as which stage.
#[derive(Debug, Clone)]
pub struct StageTable {
    stages: HashMap<String, ShaderStage>,
}

impl StageTable {
    pub fn new() -> Self {
        StageTable {
            stages: HashMap::new(),
        }
    }

    pub fn insert(&mut self, ext: impl Into<String>, stage: ShaderStage) {
        self.stages.insert(ext.into(), stage);
    }

    pub fn stage_of(&self, ext: &str) -> Option<ShaderStage> {
        self.stages.get(ext).cloned()
    }
}

impl Default for StageTable {
    fn default() -> Self {
        let mut table = StageTable::new();
        for ext in &["vert", "frag"] {
            if let Some(stage) = ShaderStage::from_extension(ext) {
                table.insert(*ext, stage);
            }
        }
        table
    }
}
