//! Image loading utilities for texture data

use crate::assets::AssetError;
use std::path::Path;

/// Loaded image data ready for GPU upload
#[derive(Debug, Clone)]
pub struct ImageData {
    /// Raw RGBA pixel data
    pub data: Vec<u8>,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

impl ImageData {
    /// Load an image from a file path, converted to RGBA8
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, AssetError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(AssetError::NotFound(path.display().to_string()));
        }

        let img = image::open(path)
            .map_err(|e| AssetError::LoadFailed(format!("{}: {}", path.display(), e)))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();

        log::debug!("Loaded image {}x{} from {:?}", width, height, path);

        Ok(Self {
            data: rgba.into_raw(),
            width,
            height,
        })
    }

    /// Load an image that must be exactly `width` x `height`
    pub fn load_exact<P: AsRef<Path>>(path: P, width: u32, height: u32) -> Result<Self, AssetError> {
        let path = path.as_ref();
        let image = Self::from_file(path)?;
        if image.width != width || image.height != height {
            log::error!(
                "{} is {}x{}, expected {}x{}",
                path.display(),
                image.width,
                image.height,
                width,
                height
            );
            return Err(AssetError::DimensionMismatch {
                path: path.display().to_string(),
                expected_width: width,
                expected_height: height,
                actual_width: image.width,
                actual_height: image.height,
            });
        }
        Ok(image)
    }

    /// Create a solid color image
    pub fn solid_color(width: u32, height: u32, color: [u8; 4]) -> Self {
        let pixel_count = (width * height) as usize;
        Self {
            data: color.repeat(pixel_count),
            width,
            height,
        }
    }

    /// Get the size of the image data in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}
