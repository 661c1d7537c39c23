//! Captured frames in the canonical gateway orientation.

use chrono::{DateTime, Utc};
use image::codecs::jpeg::JpegEncoder;
use image::{imageops, RgbImage};

use armlink_core::{FrameSize, Result};

/// One captured image, already rotated 90° clockwise from sensor orientation.
#[derive(Debug, Clone)]
pub struct Frame {
    image: RgbImage,
    captured_at: DateTime<Utc>,
}

impl Frame {
    /// Normalize a raw sensor image into a canonical frame.
    pub fn from_sensor(raw: &RgbImage) -> Self {
        Self {
            image: imageops::rotate90(raw),
            captured_at: Utc::now(),
        }
    }

    /// Wrap an image that is already in canonical orientation.
    pub fn from_canonical(image: RgbImage) -> Self {
        Self {
            image,
            captured_at: Utc::now(),
        }
    }

    /// Frame dimensions.
    pub fn size(&self) -> FrameSize {
        FrameSize::new(self.image.width(), self.image.height())
    }

    /// Capture timestamp.
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Pixel data.
    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    /// Consume the frame, returning its pixel data.
    pub fn into_image(self) -> RgbImage {
        self.image
    }

    /// Encode as JPEG with the given quality (1-100).
    pub fn to_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality.clamp(1, 100));
        encoder.encode_image(&self.image)?;
        Ok(bytes)
    }
}
