pub use crate::{
    batch::{Batch, BatchOptions, BatchReport},
    compiler::{Compile, Compiler, Flavor},
    config::{Config, Settings},
    logger::{Logger, UnwrapOrLog},
    module::CompiledModule,
    source::{discover, ShaderSource},
    stage::{ShaderStage, StageTable},
    Options, ShaderBake,
};
