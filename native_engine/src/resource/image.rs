/// Decoded image waiting to be uploaded into a texture

use crate::error::{Error, Result};
use crate::graphics_device::TextureFormat;

#[derive(Debug, Clone)]
pub struct ImageData {
    width: u32,
    height: u32,
    format: TextureFormat,
    pixels: Vec<u8>,
}

impl ImageData {
    /// Wrap decoded pixels
    ///
    /// # Errors
    ///
    /// Returns an error if `pixels` does not hold exactly one full image.
    pub fn new(width: u32, height: u32, format: TextureFormat, pixels: Vec<u8>) -> Result<Self> {
        let expected = width as usize * height as usize * format.bytes_per_pixel() as usize;
        if pixels.len() != expected {
            return Err(Error::InvalidResource(format!(
                "Image {}x{} {:?} needs {} bytes, got {}",
                width, height, format, expected, pixels.len()
            )));
        }
        Ok(Self { width, height, format, pixels })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }
}

#[cfg(test)]
#[path = "image_tests.rs"]
mod tests;
