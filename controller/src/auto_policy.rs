use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{info, trace};

use crate::frame_store::FrameStore;
use crate::led::{Color, LedTargetStore};

/// Steady color the auto policy wants for a motion verdict.
pub fn policy_color(motion: bool) -> Color {
    if motion {
        Color::BLUE
    } else {
        Color::OFF
    }
}

/// One policy step: sample the current verdict and, if auto mode is on,
/// write the matching steady color. Returns the color written, if any.
pub fn apply_auto_policy(frames: &FrameStore, leds: &LedTargetStore) -> Option<Color> {
    let target = policy_color(frames.motion());
    let previous = leds.set_steady_auto(target)?;
    if previous != target {
        info!(from = %previous, to = %target, "auto policy changed steady color");
    }
    Some(target)
}

/// Run [`apply_auto_policy`] every `period`.
///
/// The verdict is sampled at each tick; a motion pulse that starts and ends
/// between two ticks is not seen. With auto mode off the loop keeps ticking
/// but writes nothing, so a manually chosen color stays in place.
pub async fn run_auto_policy_loop(
    frames: Arc<FrameStore>,
    leds: Arc<LedTargetStore>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    info!(period_ms = period.as_millis() as u64, "auto policy loop started");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if apply_auto_policy(&frames, &leds).is_none() {
            trace!("auto mode off, policy idle");
        }
    }

    info!("auto policy loop stopped");
}
