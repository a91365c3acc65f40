use picam_common::config::MotionConfig;
use picam_common::frame::Frame;
use tracing::{debug, trace};

/// Frame-difference motion detector.
///
/// Converts each frame to luma, takes the absolute per-pixel difference
/// against the previous frame, and reports motion when more than
/// `min_changed_pixels` pixels differ by more than `pixel_threshold`.
///
/// This is a naive detector: there is no background model, so lighting
/// flicker and camera exposure changes register as motion.
pub struct MotionDetector {
    pixel_threshold: u8,
    min_changed_pixels: usize,
    /// Luma plane and dimensions of the previous frame.
    previous: Option<(u32, u32, Vec<u8>)>,
}

impl MotionDetector {
    pub fn new(pixel_threshold: u8, min_changed_pixels: usize) -> Self {
        Self {
            pixel_threshold,
            min_changed_pixels,
            previous: None,
        }
    }

    pub fn from_config(config: &MotionConfig) -> Self {
        Self::new(config.pixel_threshold, config.min_changed_pixels)
    }

    /// Compare `frame` against the previous one and return the verdict.
    ///
    /// The first frame (and any frame whose size differs from the previous
    /// one) only primes the history and reports no motion. The history is
    /// always replaced with this frame's luma afterwards.
    pub fn evaluate(&mut self, frame: &Frame) -> bool {
        let luma = frame.to_luma();
        let dims = (frame.width(), frame.height());

        let verdict = match &self.previous {
            Some((w, h, prev)) if (*w, *h) == dims => {
                let changed = count_changed(prev, &luma, self.pixel_threshold);
                let motion = changed > self.min_changed_pixels;
                trace!(
                    seq = frame.seq,
                    changed,
                    min_changed = self.min_changed_pixels,
                    motion,
                    "frame difference"
                );
                motion
            }
            Some((w, h, _)) => {
                debug!(
                    previous = format!("{w}x{h}"),
                    current = format!("{}x{}", dims.0, dims.1),
                    "frame size changed, resetting motion history"
                );
                false
            }
            None => {
                debug!(seq = frame.seq, "first frame, priming motion history");
                false
            }
        };

        self.previous = Some((dims.0, dims.1, luma));
        verdict
    }

    pub fn reset(&mut self) {
        self.previous = None;
    }
}

/// Number of pixels whose absolute difference exceeds `threshold`.
fn count_changed(prev: &[u8], current: &[u8], threshold: u8) -> usize {
    prev.iter()
        .zip(current)
        .filter(|(a, b)| a.abs_diff(**b) > threshold)
        .count()
}
