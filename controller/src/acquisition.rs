use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use picam_common::frame::Frame;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::frame_store::FrameStore;
use crate::motion::MotionDetector;
use crate::ports::Camera;
use crate::runtime::FailureStreak;

/// Capture a frame every `period`, run motion detection on it and publish
/// the (frame, verdict) pair to the [`FrameStore`].
///
/// Capture errors are logged and the cycle is skipped; the next tick simply
/// tries again. A slow cycle delays the next tick instead of overlapping it.
/// Differencing a full-resolution frame is CPU-bound, so it runs on the
/// blocking pool.
pub async fn run_acquisition_loop(
    mut camera: Box<dyn Camera>,
    detector: MotionDetector,
    frames: Arc<FrameStore>,
    period: Duration,
    cancel: CancellationToken,
) {
    let detector = Arc::new(Mutex::new(detector));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failures = FailureStreak::new("acquisition");
    let mut total: u64 = 0;
    let mut was_moving = false;

    info!(
        camera = camera.name(),
        period_ms = period.as_millis() as u64,
        "acquisition loop started"
    );

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let captured = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = camera.capture_frame() => result,
        };

        let frame = match captured {
            Ok(frame) => {
                failures.success();
                frame
            }
            Err(e) => {
                failures.failure(&e);
                continue;
            }
        };

        let motion = match evaluate_blocking(&detector, frame.clone()).await {
            Ok(motion) => motion,
            Err(e) => {
                warn!(error = %e, seq = frame.seq, "motion evaluation failed, clearing history");
                lock(&detector).reset();
                continue;
            }
        };
        if motion != was_moving {
            debug!(seq = frame.seq, motion, "motion verdict changed");
            was_moving = motion;
        }
        frames.put(frame, motion);

        total += 1;
        if total % 1000 == 0 {
            debug!(total, "frames acquired");
        }
    }

    info!(total, "acquisition loop stopped");
}

fn lock(detector: &Mutex<MotionDetector>) -> std::sync::MutexGuard<'_, MotionDetector> {
    detector.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The loop is the only user of the detector, so the lock is never contended.
async fn evaluate_blocking(
    detector: &Arc<Mutex<MotionDetector>>,
    frame: Frame,
) -> Result<bool, tokio::task::JoinError> {
    let detector = Arc::clone(detector);
    tokio::task::spawn_blocking(move || lock(&detector).evaluate(&frame)).await
}
