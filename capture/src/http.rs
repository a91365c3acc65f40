use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use image::ImageReader;
use picam_common::frame::Frame;
use picam_controller::ports::{Camera, CaptureError};
use tracing::{debug, info};

/// Camera that fetches one JPEG still per capture from an HTTP endpoint
/// (for example a libcamera or mjpg-streamer `?action=snapshot` URL).
pub struct HttpCamera {
    client: reqwest::Client,
    url: String,
    seq: u64,
}

impl HttpCamera {
    pub fn new(url: &str, timeout: Duration) -> Result<Self, CaptureError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| CaptureError::Transport(e.to_string()))?;
        info!(url, timeout_ms = timeout.as_millis() as u64, "using HTTP still camera");
        Ok(Self {
            client,
            url: url.to_string(),
            seq: 0,
        })
    }
}

#[async_trait]
impl Camera for HttpCamera {
    async fn capture_frame(&mut self) -> Result<Frame, CaptureError> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| CaptureError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(CaptureError::Status(response.status().as_u16()));
        }

        let jpeg = response
            .bytes()
            .await
            .map_err(|e| CaptureError::Transport(e.to_string()))?;
        let captured_at_ms = Utc::now().timestamp_millis();
        let seq = self.seq;

        // JPEG decoding of a full-resolution still is CPU-bound.
        let frame = tokio::task::spawn_blocking(move || decode_jpeg(&jpeg, captured_at_ms, seq))
            .await
            .map_err(|e| CaptureError::Other(e.to_string()))??;

        debug!(seq, width = frame.width(), height = frame.height(), "captured frame");
        self.seq += 1;
        Ok(frame)
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// Decode JPEG (or any format `image` can sniff) into an RGB frame.
pub fn decode_jpeg(data: &[u8], captured_at_ms: i64, seq: u64) -> Result<Frame, CaptureError> {
    let img = ImageReader::new(Cursor::new(data))
        .with_guessed_format()
        .map_err(|e| CaptureError::Decode(e.to_string()))?
        .decode()
        .map_err(|e| CaptureError::Decode(e.to_string()))?
        .to_rgb8();
    Frame::from_image(img, captured_at_ms, seq).map_err(|e| CaptureError::Decode(e.to_string()))
}
