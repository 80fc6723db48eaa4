//! Texture image loading
//!
//! Decodes binary PPM (and PNG) files into tightly packed RGBA8 pixels.

use std::path::Path;
use thiserror::Error;

/// Image loading errors
#[derive(Error, Debug)]
pub enum ImageLoadError {
    /// The file could not be read or decoded
    #[error("Failed to load image {path}: {source}")]
    Decode {
        /// File that failed
        path: String,
        /// Decoder error
        #[source]
        source: image::ImageError,
    },

    /// The image has a zero dimension
    #[error("Image {0} is empty")]
    Empty(String),
}

/// Loaded image data ready for GPU upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageData {
    /// RGBA8 pixel data, row-major
    pub data: Vec<u8>,
    /// Image width in pixels
    pub width: u32,
    /// Image height in pixels
    pub height: u32,
}

impl ImageData {
    /// Load an image from a file path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ImageLoadError> {
        let path = path.as_ref();
        log::debug!("Loading image from: {:?}", path);

        let image = image::open(path).map_err(|source| ImageLoadError::Decode {
            path: path.display().to_string(),
            source,
        })?;

        let loaded = Self::from_dynamic(image, &path.display().to_string())?;
        log::info!("Loaded image {}x{} from {:?}", loaded.width, loaded.height, path);
        Ok(loaded)
    }

    /// Decode an image held in memory
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ImageLoadError> {
        let image = image::load_from_memory(bytes).map_err(|source| ImageLoadError::Decode {
            path: "<memory>".to_string(),
            source,
        })?;
        Self::from_dynamic(image, "<memory>")
    }

    fn from_dynamic(image: image::DynamicImage, name: &str) -> Result<Self, ImageLoadError> {
        // RGB sources get an opaque alpha channel here
        let rgba = image.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(ImageLoadError::Empty(name.to_string()));
        }

        Ok(Self {
            data: rgba.into_raw(),
            width,
            height,
        })
    }

    /// Size of the pixel data in bytes
    pub fn byte_size(&self) -> u64 {
        u64::from(self.width) * u64::from(self.height) * 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ppm_expands_to_opaque_rgba() {
        let mut ppm = b"P6\n2 1\n255\n".to_vec();
        ppm.extend_from_slice(&[255, 0, 0, 0, 0, 255]);

        let image = ImageData::from_bytes(&ppm).unwrap();

        assert_eq!((image.width, image.height), (2, 1));
        assert_eq!(image.data, vec![255, 0, 0, 255, 0, 0, 255, 255]);
        assert_eq!(image.byte_size(), 8);
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(ImageData::from_bytes(b"not an image").is_err());
    }
}
