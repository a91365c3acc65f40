use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use picam_common::config::TimingConfig;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::acquisition::run_acquisition_loop;
use crate::auto_policy::run_auto_policy_loop;
use crate::frame_store::FrameStore;
use crate::led::{run_render_loop, LedTargetStore};
use crate::motion::MotionDetector;
use crate::ports::{Actuator, Camera};

/// Cadences of the periodic loops plus the flash length.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopTimings {
    pub acquisition: Duration,
    pub render: Duration,
    pub auto_policy: Duration,
    pub flash: Duration,
}

impl From<&TimingConfig> for LoopTimings {
    fn from(config: &TimingConfig) -> Self {
        Self {
            acquisition: config.acquisition_interval(),
            render: config.render_interval(),
            auto_policy: config.auto_policy_interval(),
            flash: config.flash_duration(),
        }
    }
}

impl Default for LoopTimings {
    fn default() -> Self {
        Self::from(&TimingConfig::default())
    }
}

/// The running acquisition, render and auto-policy loops.
pub struct Runtime {
    cancel: CancellationToken,
    tracker: TaskTracker,
}

impl Runtime {
    /// Spawn all three loops. The camera goes to the acquisition loop and the
    /// actuator to the render loop; neither is reachable from anywhere else.
    pub fn start(
        camera: Box<dyn Camera>,
        detector: MotionDetector,
        actuator: Box<dyn Actuator>,
        frames: Arc<FrameStore>,
        leds: Arc<LedTargetStore>,
        timings: LoopTimings,
        cancel: CancellationToken,
    ) -> Self {
        let tracker = TaskTracker::new();

        tracker.spawn(run_acquisition_loop(
            camera,
            detector,
            Arc::clone(&frames),
            timings.acquisition,
            cancel.clone(),
        ));
        tracker.spawn(run_render_loop(
            Arc::clone(&leds),
            actuator,
            timings.render,
            cancel.clone(),
        ));
        tracker.spawn(run_auto_policy_loop(
            frames,
            leds,
            timings.auto_policy,
            cancel.clone(),
        ));
        tracker.close();

        info!(
            acquisition_ms = timings.acquisition.as_millis() as u64,
            render_ms = timings.render.as_millis() as u64,
            auto_policy_ms = timings.auto_policy.as_millis() as u64,
            "controller loops running"
        );
        Self { cancel, tracker }
    }

    /// Signal every loop to stop and wait for them to finish their cycle.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        self.tracker.wait().await;
        info!("controller loops stopped");
    }
}

/// Counts consecutive failures of one loop so a persistent fault logs once
/// plus every `LOG_EVERY` cycles instead of every cycle.
pub(crate) struct FailureStreak {
    loop_name: &'static str,
    consecutive: u32,
}

impl FailureStreak {
    const LOG_EVERY: u32 = 100;

    pub(crate) fn new(loop_name: &'static str) -> Self {
        Self {
            loop_name,
            consecutive: 0,
        }
    }

    pub(crate) fn failure(&mut self, error: &dyn Display) {
        self.consecutive = self.consecutive.saturating_add(1);
        if self.consecutive == 1 || self.consecutive % Self::LOG_EVERY == 0 {
            warn!(
                loop_name = self.loop_name,
                consecutive = self.consecutive,
                error = %error,
                "cycle failed, retrying next cycle"
            );
        }
    }

    pub(crate) fn success(&mut self) {
        if self.consecutive > 0 {
            info!(
                loop_name = self.loop_name,
                failures = self.consecutive,
                "recovered after failures"
            );
            self.consecutive = 0;
        }
    }

    #[cfg(test)]
    pub(crate) fn consecutive(&self) -> u32 {
        self.consecutive
    }
}
