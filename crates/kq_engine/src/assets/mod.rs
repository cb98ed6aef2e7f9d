//! Asset loading
//!
//! The renderer reads two kinds of files at startup: precompiled SPIR-V
//! shader binaries and the PNG layers of the tile texture array.

pub mod image_loader;
pub mod shader_loader;

pub use image_loader::ImageData;
pub use shader_loader::ShaderBinary;

use thiserror::Error;

/// Asset loading errors
#[derive(Error, Debug)]
pub enum AssetError {
    /// Asset not found
    #[error("Asset not found: {0}")]
    NotFound(String),

    /// Failed to decode asset
    #[error("Failed to load asset: {0}")]
    LoadFailed(String),

    /// Invalid asset data
    #[error("Invalid data: {0}")]
    InvalidData(String),

    /// Decoded image does not have the size the caller asked for
    #[error("{path} is {actual_width}x{actual_height}, expected {expected_width}x{expected_height}")]
    DimensionMismatch {
        /// Image path
        path: String,
        /// Requested width
        expected_width: u32,
        /// Requested height
        expected_height: u32,
        /// Decoded width
        actual_width: u32,
        /// Decoded height
        actual_height: u32,
    },

    /// IO error during asset loading
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
