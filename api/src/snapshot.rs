use std::path::PathBuf;

use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use picam_common::frame::Frame;
use picam_controller::ports::{PersistError, Snapshot, SnapshotSink};
use tracing::info;

/// Stores snapshots as JPEG files named `capture_{YYYYmmdd_HHMMSS}.jpg`.
pub struct JpegDirectory {
    dir: PathBuf,
    quality: u8,
}

impl JpegDirectory {
    /// Create the directory if it doesn't exist yet.
    pub fn new(dir: PathBuf, quality: u8) -> Result<Self, PersistError> {
        std::fs::create_dir_all(&dir).map_err(|source| PersistError::Write {
            path: dir.clone(),
            source,
        })?;
        info!(dir = %dir.display(), quality, "snapshot directory ready");
        Ok(Self {
            dir,
            quality: quality.clamp(1, 100),
        })
    }
}

#[async_trait]
impl SnapshotSink for JpegDirectory {
    async fn save(&self, frame: &Frame) -> Result<Snapshot, PersistError> {
        let frame = frame.clone();
        let dir = self.dir.clone();
        let quality = self.quality;

        tokio::task::spawn_blocking(move || {
            let bytes = encode_jpeg(&frame, quality)?;

            let stamp = frame.timestamp_label();
            let mut filename = format!("capture_{stamp}.jpg");
            if dir.join(&filename).exists() {
                // Two captures in the same second.
                filename = format!("capture_{stamp}_{}.jpg", frame.seq);
            }
            let path = dir.join(&filename);
            std::fs::write(&path, &bytes).map_err(|source| PersistError::Write {
                path: path.clone(),
                source,
            })?;

            Ok(Snapshot {
                filename,
                path,
                bytes,
                content_type: "image/jpeg",
            })
        })
        .await
        .map_err(|e| PersistError::Task(e.to_string()))?
    }
}

/// Encode a frame as JPEG at the given quality (1-100).
pub fn encode_jpeg(frame: &Frame, quality: u8) -> Result<Vec<u8>, PersistError> {
    let mut out = Vec::new();
    JpegEncoder::new_with_quality(&mut out, quality)
        .encode_image(&frame.to_image())
        .map_err(|e| PersistError::Encode(e.to_string()))?;
    Ok(out)
}
