//! SPIR-V binary loading

use crate::assets::AssetError;
use std::io::Cursor;
use std::path::Path;

/// A SPIR-V module read from disk, as 32-bit words
#[derive(Debug, Clone)]
pub struct ShaderBinary {
    /// Module words in host byte order
    pub words: Vec<u32>,
}

impl ShaderBinary {
    /// Read a SPIR-V file byte for byte
    ///
    /// The file length must be a multiple of 4.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => AssetError::NotFound(path.display().to_string()),
            _ => AssetError::IoError(e),
        })?;
        log::debug!("Read shader {} ({} bytes)", path.display(), bytes.len());
        Self::from_bytes(&bytes).map_err(|e| match e {
            AssetError::InvalidData(reason) => AssetError::InvalidData(format!("{}: {}", path.display(), reason)),
            other => other,
        })
    }

    /// Interpret raw bytes as a SPIR-V module
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, AssetError> {
        if bytes.is_empty() {
            return Err(AssetError::InvalidData("shader binary is empty".to_string()));
        }
        if bytes.len() % 4 != 0 {
            return Err(AssetError::InvalidData(format!(
                "shader binary length {} is not a multiple of 4",
                bytes.len()
            )));
        }
        let words = ash::util::read_spv(&mut Cursor::new(bytes))?;
        Ok(Self { words })
    }

    /// Size of the module in bytes
    pub fn size_bytes(&self) -> usize {
        self.words.len() * 4
    }
}
