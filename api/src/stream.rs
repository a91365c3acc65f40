use std::convert::Infallible;
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use futures_util::stream::{self, Stream};
use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use picam_common::config::StreamConfig;
use picam_common::frame::Frame;
use picam_controller::FrameStore;
use tokio::time::{interval, Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

pub const CONTENT_TYPE: &str = "multipart/x-mixed-replace; boundary=frame";

const PART_HEADER: &[u8] = b"--frame\r\nContent-Type: image/jpeg\r\n\r\n";

struct Feed {
    frames: Arc<FrameStore>,
    config: StreamConfig,
    cancel: CancellationToken,
    ticker: Interval,
    last_seq: Option<u64>,
}

/// MJPEG parts for the video feed: the latest frame, downscaled and
/// re-encoded, at most once per `interval_ms`. A frame already sent is not
/// sent again. The stream ends when `cancel` fires.
pub fn mjpeg_stream(
    frames: Arc<FrameStore>,
    config: StreamConfig,
    cancel: CancellationToken,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    let mut ticker = interval(std::time::Duration::from_millis(config.interval_ms.max(1)));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let feed = Feed {
        frames,
        config,
        cancel,
        ticker,
        last_seq: None,
    };

    stream::unfold(feed, |mut feed| async move {
        loop {
            tokio::select! {
                biased;
                _ = feed.cancel.cancelled() => {
                    debug!("video feed closed by shutdown");
                    return None;
                }
                _ = feed.ticker.tick() => {}
            }

            let Some(frame) = feed.frames.get().frame else {
                continue;
            };
            if feed.last_seq == Some(frame.seq) {
                continue;
            }
            feed.last_seq = Some(frame.seq);

            let (width, height, quality) = (
                feed.config.width,
                feed.config.height,
                feed.config.jpeg_quality,
            );
            match tokio::task::spawn_blocking(move || encode_part(&frame, width, height, quality))
                .await
            {
                Ok(Ok(part)) => return Some((Ok(part), feed)),
                Ok(Err(e)) => warn!(error = %e, "video feed encode failed"),
                Err(e) => warn!(error = %e, "video feed encode task failed"),
            }
        }
    })
}

/// One multipart section holding `frame` as a JPEG of `width`x`height`.
fn encode_part(
    frame: &Frame,
    width: u32,
    height: u32,
    quality: u8,
) -> Result<Bytes, image::ImageError> {
    let mut img = frame.to_image();
    if (img.width(), img.height()) != (width, height) {
        img = imageops::resize(&img, width, height, FilterType::Triangle);
    }

    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, quality.clamp(1, 100)).encode_image(&img)?;

    let mut part = BytesMut::with_capacity(PART_HEADER.len() + jpeg.len() + 2);
    part.put_slice(PART_HEADER);
    part.put_slice(&jpeg);
    part.put_slice(b"\r\n");
    Ok(part.freeze())
}
