//! Decoded raster frames handed across the capture boundary.

use anyhow::{anyhow, Context, Result};
use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;

/// One captured screen image.
///
/// A frame is owned exclusively by whoever receives it from the capture
/// engine and must be released once the cycle is done with it; there is no
/// reference counting across the boundary.
#[derive(Debug)]
pub struct Frame {
    image: Option<DynamicImage>,
    width: u32,
    height: u32,
}

impl Frame {
    pub(crate) fn new(image: DynamicImage) -> Self {
        let width = image.width();
        let height = image.height();
        Self {
            image: Some(image),
            width,
            height,
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn is_released(&self) -> bool {
        self.image.is_none()
    }

    /// Encode the frame for upload. Capture tools emit PNG; JPEG keeps the
    /// request body a fraction of that size.
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        let image = self
            .image
            .as_ref()
            .ok_or_else(|| anyhow!("frame was already released"))?;
        // JPEG has no alpha channel.
        let rgb = image.to_rgb8();
        let mut out = Vec::new();
        JpegEncoder::new_with_quality(&mut out, quality)
            .encode_image(&rgb)
            .context("JPEG encode failed")?;
        Ok(out)
    }

    /// Drop the raster buffer. Dimensions stay readable for logging.
    pub fn release(&mut self) {
        self.image = None;
    }
}
