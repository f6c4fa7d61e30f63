use err_derive::Error;
use std::fs;
use std::io;
use std::path::Path;

pub const SPIRV_MAGIC: u32 = 0x0723_0203;

/// Magic number plus version, generator, bound and schema.
const HEADER_WORDS: usize = 5;

#[derive(Debug, Error)]
pub enum ModuleError {
    #[error(display = "Failed to read compiled module: {}", err)]
    Read { err: io::Error },
    #[error(display = "The SPIR-V module is not aligned to 4 bytes ({} bytes)", len)]
    Unaligned { len: usize },
    #[error(display = "The SPIR-V module is too short for a header ({} bytes)", len)]
    Truncated { len: usize },
    #[error(display = "Not a SPIR-V module, magic number is {:#010x}", magic)]
    BadMagic { magic: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endianness {
    Little,
    Big,
}

/// A SPIR-V binary as written by the compiler.
#[derive(Debug)]
pub struct CompiledModule {
    bytes: Vec<u8>,
    endianness: Endianness,
}

impl CompiledModule {
    pub fn load(path: impl AsRef<Path>) -> Result<CompiledModule, ModuleError> {
        let bytes = fs::read(path).map_err(|err| ModuleError::Read { err })?;
        CompiledModule::from_bytes(bytes)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Result<CompiledModule, ModuleError> {
        let len = bytes.len();

        if len % 4 != 0 {
            return Err(ModuleError::Unaligned { len });
        }

        if len < HEADER_WORDS * 4 {
            return Err(ModuleError::Truncated { len });
        }

        let first = [bytes[0], bytes[1], bytes[2], bytes[3]];
        let endianness = if u32::from_le_bytes(first) == SPIRV_MAGIC {
            Endianness::Little
        } else if u32::from_be_bytes(first) == SPIRV_MAGIC {
            Endianness::Big
        } else {
            return Err(ModuleError::BadMagic {
                magic: u32::from_le_bytes(first),
            });
        };

        Ok(CompiledModule { bytes, endianness })
    }

    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The module as words, the form a graphics API wants it in.
    pub fn words(&self) -> Vec<u32> {
        self.bytes
            .chunks_exact(4)
            .map(|chunk| {
                let word = [chunk[0], chunk[1], chunk[2], chunk[3]];
                match self.endianness {
                    Endianness::Little => u32::from_le_bytes(word),
                    Endianness::Big => u32::from_be_bytes(word),
                }
            })
            .collect()
    }

    /// SPIR-V version as (major, minor).
    pub fn version(&self) -> (u8, u8) {
        let version = self.words()[1];
        (((version >> 16) & 0xff) as u8, ((version >> 8) & 0xff) as u8)
    }
}
