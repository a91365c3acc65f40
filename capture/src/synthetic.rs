use async_trait::async_trait;
use chrono::Utc;
use picam_common::frame::Frame;
use picam_controller::ports::{Camera, CaptureError};
use tracing::info;

const BACKGROUND: u8 = 40;
const SQUARE: u8 = 220;

/// Test-pattern camera for running without hardware.
///
/// Renders a dark gray field with a bright square. The square jumps to a new
/// position every `move_every` frames, which the motion detector sees as a
/// one-frame burst of motion.
pub struct SyntheticCamera {
    width: u32,
    height: u32,
    move_every: u64,
    seq: u64,
}

impl SyntheticCamera {
    pub fn new(width: u32, height: u32, move_every: u64) -> Self {
        info!(width, height, move_every, "using synthetic test-pattern camera");
        Self {
            width,
            height,
            move_every: move_every.max(1),
            seq: 0,
        }
    }

    /// Top-left corner of the square for frame `seq`.
    fn square_origin(&self, side: u32, seq: u64) -> (u32, u32) {
        let step = seq / self.move_every;
        let cols = (self.width / side).max(1) as u64;
        let rows = (self.height / side).max(1) as u64;
        let cell = step % (cols * rows);
        (((cell % cols) as u32) * side, ((cell / cols) as u32) * side)
    }

    fn render(&self, seq: u64) -> Vec<u8> {
        let (w, h) = (self.width, self.height);
        let side = (w.min(h) / 4).max(1);
        let (x0, y0) = self.square_origin(side, seq);

        let mut pixels = vec![BACKGROUND; w as usize * h as usize * 3];
        for y in y0..(y0 + side).min(h) {
            let row = (y as usize * w as usize + x0 as usize) * 3;
            let end = row + (side.min(w - x0) as usize) * 3;
            pixels[row..end].fill(SQUARE);
        }
        pixels
    }
}

#[async_trait]
impl Camera for SyntheticCamera {
    async fn capture_frame(&mut self) -> Result<Frame, CaptureError> {
        let pixels = self.render(self.seq);
        let frame = Frame::new(
            self.width,
            self.height,
            pixels,
            Utc::now().timestamp_millis(),
            self.seq,
        )
        .map_err(|e| CaptureError::Other(e.to_string()))?;
        self.seq += 1;
        Ok(frame)
    }

    fn name(&self) -> &str {
        "synthetic"
    }
}
