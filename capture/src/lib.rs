//! Camera collaborators for the controller's acquisition loop.

pub mod http;
pub mod synthetic;

use std::time::Duration;

use picam_common::config::CameraConfig;
use picam_controller::ports::{Camera, CaptureError};

pub use http::HttpCamera;
pub use synthetic::SyntheticCamera;

/// Frames between jumps of the synthetic test pattern (~1 s at 30 Hz).
const SYNTHETIC_MOVE_EVERY: u64 = 30;

/// Build the camera selected by `camera.source`.
pub fn from_config(config: &CameraConfig) -> Result<Box<dyn Camera>, CaptureError> {
    match config.source.as_str() {
        "http" => Ok(Box::new(HttpCamera::new(
            &config.url,
            Duration::from_millis(config.timeout_ms),
        )?)),
        "synthetic" => Ok(Box::new(SyntheticCamera::new(
            config.width,
            config.height,
            SYNTHETIC_MOVE_EVERY,
        ))),
        other => Err(CaptureError::Other(format!("unknown camera source '{other}'"))),
    }
}
