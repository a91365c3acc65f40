use std::sync::Arc;

use image::RgbImage;

const CHANNELS: usize = 3;

/// A captured camera frame: packed RGB8 pixels plus capture metadata.
///
/// The pixel buffer is shared and immutable. Cloning a frame is cheap and
/// never gives the clone a way to modify the original, so a frame handed to
/// a reader can't change underneath it when the next capture lands.
#[derive(Debug, Clone)]
pub struct Frame {
    width: u32,
    height: u32,
    pixels: Arc<[u8]>,
    /// Unix millis at which the camera delivered the frame.
    pub captured_at_ms: i64,
    /// Per-camera sequence number, starting at 0.
    pub seq: u64,
}

impl Frame {
    /// Build a frame from packed RGB8 bytes (`width * height * 3` long).
    pub fn new(
        width: u32,
        height: u32,
        pixels: Vec<u8>,
        captured_at_ms: i64,
        seq: u64,
    ) -> Result<Self, FrameError> {
        let expected = width as usize * height as usize * CHANNELS;
        if width == 0 || height == 0 {
            return Err(FrameError::EmptyDimensions);
        }
        if pixels.len() != expected {
            return Err(FrameError::SizeMismatch {
                width,
                height,
                got: pixels.len(),
                expected,
            });
        }
        Ok(Self {
            width,
            height,
            pixels: pixels.into(),
            captured_at_ms,
            seq,
        })
    }

    /// Build a frame from a decoded image.
    pub fn from_image(img: RgbImage, captured_at_ms: i64, seq: u64) -> Result<Self, FrameError> {
        let (width, height) = img.dimensions();
        Self::new(width, height, img.into_raw(), captured_at_ms, seq)
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Packed RGB8 bytes, row-major.
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Single-channel intensity plane (BT.601 weights, integer arithmetic).
    pub fn to_luma(&self) -> Vec<u8> {
        self.pixels
            .chunks_exact(CHANNELS)
            .map(|px| {
                let (r, g, b) = (px[0] as u32, px[1] as u32, px[2] as u32);
                ((299 * r + 587 * g + 114 * b + 500) / 1000) as u8
            })
            .collect()
    }

    /// Copy the pixels into an owned image for encoding.
    pub fn to_image(&self) -> RgbImage {
        // Dimensions were validated in `new`, so this always succeeds.
        RgbImage::from_fn(self.width, self.height, |x, y| {
            let i = (y as usize * self.width as usize + x as usize) * CHANNELS;
            image::Rgb([self.pixels[i], self.pixels[i + 1], self.pixels[i + 2]])
        })
    }

    /// Timestamp formatted the way snapshot filenames and messages show it.
    pub fn timestamp_label(&self) -> String {
        let dt = chrono::DateTime::from_timestamp_millis(self.captured_at_ms)
            .unwrap_or_else(chrono::Utc::now)
            .with_timezone(&chrono::Local);
        dt.format("%Y%m%d_%H%M%S").to_string()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame dimensions must be non-zero")]
    EmptyDimensions,
    #[error("pixel buffer for {width}x{height} frame is {got} bytes, expected {expected}")]
    SizeMismatch {
        width: u32,
        height: u32,
        got: usize,
        expected: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgb: [u8; 3]) -> Frame {
        let pixels = rgb.repeat(width as usize * height as usize);
        Frame::new(width, height, pixels, 1_708_300_000_000, 0).unwrap()
    }

    #[test]
    fn rejects_wrong_buffer_length() {
        let err = Frame::new(4, 4, vec![0; 10], 0, 0).unwrap_err();
        assert!(matches!(err, FrameError::SizeMismatch { expected: 48, got: 10, .. }));
    }

    #[test]
    fn rejects_empty_dimensions() {
        assert!(matches!(
            Frame::new(0, 4, vec![], 0, 0),
            Err(FrameError::EmptyDimensions)
        ));
    }

    #[test]
    fn luma_weights() {
        assert_eq!(solid(2, 2, [255, 255, 255]).to_luma(), vec![255; 4]);
        assert_eq!(solid(1, 1, [0, 0, 0]).to_luma(), vec![0]);
        // Pure green carries most of the perceived brightness.
        assert_eq!(solid(1, 1, [0, 255, 0]).to_luma(), vec![150]);
        assert_eq!(solid(1, 1, [255, 0, 0]).to_luma(), vec![76]);
    }

    #[test]
    fn clones_share_pixels() {
        let frame = solid(8, 8, [10, 20, 30]);
        let copy = frame.clone();
        assert!(std::ptr::eq(frame.pixels().as_ptr(), copy.pixels().as_ptr()));
    }

    #[test]
    fn image_roundtrip_keeps_pixels() {
        let frame = solid(3, 2, [1, 2, 3]);
        let img = frame.to_image();
        assert_eq!(img.dimensions(), (3, 2));
        let back = Frame::from_image(img, frame.captured_at_ms, 1).unwrap();
        assert_eq!(back.pixels(), frame.pixels());
        assert_eq!(back.seq, 1);
    }

    #[test]
    fn timestamp_label_shape() {
        let label = solid(1, 1, [0, 0, 0]).timestamp_label();
        assert_eq!(label.len(), 15);
        assert_eq!(&label[8..9], "_");
    }
}
