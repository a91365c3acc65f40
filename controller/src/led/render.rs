use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::color::Color;
use super::store::LedTargetStore;
use crate::ports::Actuator;
use crate::runtime::FailureStreak;

/// Resolve the effective color every `period` and push it to the actuator.
///
/// This is the only caller of [`Actuator::drive`]. Other components change
/// the LED by writing to the [`LedTargetStore`]; the store is read once per
/// cycle, so the LED sees at most one color change per period.
///
/// On cancellation the LED is driven off once before returning.
pub async fn run_render_loop(
    leds: Arc<LedTargetStore>,
    mut actuator: Box<dyn Actuator>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut failures = FailureStreak::new("render");
    let mut last: Option<Color> = None;

    info!(period_ms = period.as_millis() as u64, "render loop started");

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        let color = leds.resolve(Instant::now());
        if last != Some(color) {
            debug!(color = %color, "effective LED color changed");
            last = Some(color);
        }

        match actuator.drive(color) {
            Ok(()) => failures.success(),
            Err(e) => failures.failure(&e),
        }
    }

    if let Err(e) = actuator.drive(Color::OFF) {
        warn!(error = %e, "failed to switch LED off on shutdown");
    }
    info!("render loop stopped");
}
