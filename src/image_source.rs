//! Image source
//!
//! Decodes image files into RGBA8 pixel data for upload. The pipeline only
//! ever sees a [`DecodedImage`], never a path.

use std::path::Path;

use crate::pipeline::PipelineError;

/// Decoded RGBA8 pixels, row 0 at the top
#[derive(Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pixels: Vec<u8>,
    width: u32,
    height: u32,
}

impl std::fmt::Debug for DecodedImage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecodedImage")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

impl DecodedImage {
    /// Wrap raw RGBA8 pixels, checking the buffer matches the dimensions
    pub fn new(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self, PipelineError> {
        if width == 0 || height == 0 {
            return Err(PipelineError::ImageLoad(format!(
                "image has zero size ({}x{})",
                width, height
            )));
        }
        let expected = width as usize * height as usize * 4;
        if pixels.len() != expected {
            return Err(PipelineError::ImageLoad(format!(
                "expected {} bytes for {}x{} RGBA, got {}",
                expected,
                width,
                height,
                pixels.len()
            )));
        }
        Ok(Self {
            pixels,
            width,
            height,
        })
    }

    /// A single-color image
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Result<Self, PipelineError> {
        let pixels = rgba
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 4)
            .collect();
        Self::new(pixels, width, height)
    }

    /// Decode an in-memory encoded image (PNG, JPEG, ...)
    pub fn from_encoded(bytes: &[u8]) -> Result<Self, PipelineError> {
        let rgba = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = rgba.dimensions();
        Self::new(rgba.into_raw(), width, height)
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Bytes per row of the pixel buffer
    pub fn bytes_per_row(&self) -> u32 {
        self.width * 4
    }
}

/// Decode an image file from disk
pub fn load_image(path: &Path) -> Result<DecodedImage, PipelineError> {
    let rgba = image::open(path)
        .map_err(|e| PipelineError::ImageLoad(format!("{}: {}", path.display(), e)))?
        .to_rgba8();
    let (width, height) = rgba.dimensions();
    tracing::debug!(path = %path.display(), width, height, "Decoded image");
    DecodedImage::new(rgba.into_raw(), width, height)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_new_rejects_wrong_length() {
        let result = DecodedImage::new(vec![0; 10], 2, 2);
        assert!(matches!(result, Err(PipelineError::ImageLoad(_))));
    }

    #[test]
    fn test_new_rejects_zero_size() {
        let result = DecodedImage::new(Vec::new(), 0, 4);
        assert!(matches!(result, Err(PipelineError::ImageLoad(_))));
    }

    #[test]
    fn test_solid_fills_pixels() {
        let image = DecodedImage::solid(3, 2, [10, 20, 30, 255]).unwrap();
        assert_eq!(image.pixels().len(), 24);
        assert_eq!(&image.pixels()[20..24], &[10, 20, 30, 255]);
        assert_eq!(image.bytes_per_row(), 12);
    }

    #[test]
    fn test_from_encoded_png() {
        let source = image::RgbaImage::from_pixel(4, 3, image::Rgba([1, 2, 3, 255]));
        let mut bytes = Vec::new();
        source
            .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
            .unwrap();

        let decoded = DecodedImage::from_encoded(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (4, 3));
        assert_eq!(&decoded.pixels()[..4], &[1, 2, 3, 255]);
    }

    #[test]
    fn test_from_encoded_garbage_fails() {
        let result = DecodedImage::from_encoded(b"definitely not an image");
        assert!(matches!(result, Err(PipelineError::ImageLoad(_))));
    }

    #[test]
    fn test_load_missing_file_fails() {
        let result = load_image(Path::new("/nonexistent/fx-viewer/missing.png"));
        assert!(matches!(result, Err(PipelineError::ImageLoad(_))));
    }
}
