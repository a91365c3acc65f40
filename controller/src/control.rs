use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{info, warn};

use crate::frame_store::FrameStore;
use crate::led::{Color, LedError, LedSnapshot, LedTargetStore};
use crate::notify::NotificationQueue;
use crate::ports::{Notification, PersistError, Snapshot, SnapshotSink};

/// Operations offered to the request layer.
///
/// Cheap to clone; every clone talks to the same stores. Any number of
/// request handlers may call into it concurrently. It never touches the
/// camera or the LED directly, only the two stores.
#[derive(Clone)]
pub struct ControlSurface {
    frames: Arc<FrameStore>,
    leds: Arc<LedTargetStore>,
    snapshots: Arc<dyn SnapshotSink>,
    notifications: NotificationQueue,
    flash_duration: Duration,
}

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("No frame available")]
    NotReady,
    #[error(transparent)]
    Persist(#[from] PersistError),
}

/// Everything the status endpoint reports, read in one pass.
#[derive(Debug, Clone, Copy)]
pub struct Status {
    pub frame_ready: bool,
    pub motion: bool,
    pub led: LedSnapshot,
}

impl ControlSurface {
    pub fn new(
        frames: Arc<FrameStore>,
        leds: Arc<LedTargetStore>,
        snapshots: Arc<dyn SnapshotSink>,
        notifications: NotificationQueue,
        flash_duration: Duration,
    ) -> Self {
        Self {
            frames,
            leds,
            snapshots,
            notifications,
            flash_duration,
        }
    }

    /// Persist the latest frame, flash the LED white and send a notification.
    pub async fn request_snapshot(&self) -> Result<Snapshot, SnapshotError> {
        let Some(frame) = self.frames.get().frame else {
            return Err(SnapshotError::NotReady);
        };

        let snapshot = self.snapshots.save(&frame).await.map_err(|e| {
            warn!(error = %e, seq = frame.seq, "failed to persist snapshot");
            e
        })?;

        self.leds.set_override(Instant::now(), self.flash_duration);

        let auto = self.leds.auto_enabled();
        let color_name = self.leds.steady().name();
        info!(
            file = snapshot.filename,
            seq = frame.seq,
            led = color_name,
            auto,
            "snapshot captured"
        );
        self.notifications.send(Notification::new(
            "Pi Cam Snapshot",
            format!(
                "Snapshot captured at {}.\nLED: {color_name}\nAuto LED: {}",
                frame.timestamp_label(),
                auto_label(auto)
            ),
        ));
        Ok(snapshot)
    }

    /// Set the steady color from percentages (0-100 per channel).
    ///
    /// Out-of-range values are clamped and non-finite ones count as 0.
    /// Refused while auto mode is on.
    pub fn set_manual_color(&self, red: f64, green: f64, blue: f64) -> Result<Color, LedError> {
        let color = Color::from_percentages(red, green, blue);
        if let Err(e) = self.leds.set_steady_manual(color) {
            info!(color = %color, "manual color rejected, auto mode active");
            return Err(e);
        }

        info!(color = %color, "manual color set");
        self.notifications.send(Notification::new(
            "LED Status",
            format!("LED set to {}.\nAuto LED: {}", color.name(), auto_label(false)),
        ));
        Ok(color)
    }

    /// Flip auto mode; the auto policy picks up the change on its next tick.
    pub fn toggle_auto_mode(&self) -> bool {
        let auto = self.leds.toggle_auto();
        info!(auto, "auto mode toggled");
        auto
    }

    /// Switch the steady color off, whatever the auto mode.
    pub fn force_off(&self) {
        self.leds.set_steady(Color::OFF);
        info!("LED forced off");
        self.notifications
            .send(Notification::new("LED Status", "LED turned off (Off)."));
    }

    pub fn motion_status(&self) -> bool {
        self.frames.motion()
    }

    pub fn status(&self) -> Status {
        let reading = self.frames.get();
        Status {
            frame_ready: reading.frame.is_some(),
            motion: reading.motion,
            led: self.leds.snapshot(Instant::now()),
        }
    }

    /// Shared frame store, for read-only consumers such as the video feed.
    pub fn frames(&self) -> &Arc<FrameStore> {
        &self.frames
    }
}

fn auto_label(auto: bool) -> &'static str {
    if auto {
        "Enabled"
    } else {
        "Disabled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notify::tests::{RecordingNotifier, StuckNotifier};
    use async_trait::async_trait;
    use picam_common::frame::Frame;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use tokio_util::sync::CancellationToken;

    #[derive(Default)]
    struct MemorySink {
        saved: Mutex<Vec<u64>>,
    }

    #[async_trait]
    impl SnapshotSink for MemorySink {
        async fn save(&self, frame: &Frame) -> Result<Snapshot, PersistError> {
            self.saved.lock().unwrap().push(frame.seq);
            Ok(Snapshot {
                filename: format!("capture_{}.jpg", frame.seq),
                path: PathBuf::from(format!("/tmp/capture_{}.jpg", frame.seq)),
                bytes: vec![0xFF, 0xD8],
                content_type: "image/jpeg",
            })
        }
    }

    struct BrokenSink;

    #[async_trait]
    impl SnapshotSink for BrokenSink {
        async fn save(&self, _frame: &Frame) -> Result<Snapshot, PersistError> {
            Err(PersistError::Encode("disk full".into()))
        }
    }

    fn frame(seq: u64) -> Frame {
        Frame::new(2, 2, vec![0; 12], 1_708_300_000_000, seq).unwrap()
    }

    fn surface(auto: bool, sink: Arc<dyn SnapshotSink>) -> ControlSurface {
        ControlSurface::new(
            Arc::new(FrameStore::new()),
            Arc::new(LedTargetStore::new(auto)),
            sink,
            NotificationQueue::disabled(),
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn snapshot_before_first_frame_is_not_ready() {
        let control = surface(false, Arc::new(MemorySink::default()));
        let err = control.request_snapshot().await.unwrap_err();
        assert!(matches!(err, SnapshotError::NotReady));
        assert!(!control.status().led.override_active);
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_persists_and_flashes() {
        let sink = Arc::new(MemorySink::default());
        let control = surface(false, sink.clone());
        control.frames.put(frame(7), false);

        let snapshot = control.request_snapshot().await.unwrap();
        assert_eq!(snapshot.filename, "capture_7.jpg");
        assert_eq!(*sink.saved.lock().unwrap(), vec![7]);
        assert_eq!(control.leds.resolve(Instant::now()), Color::WHITE);

        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(control.leds.resolve(Instant::now()), Color::OFF);
    }

    #[tokio::test]
    async fn persistence_failure_fails_snapshot_without_flash() {
        let control = surface(false, Arc::new(BrokenSink));
        control.frames.put(frame(1), false);
        let err = control.request_snapshot().await.unwrap_err();
        assert!(matches!(err, SnapshotError::Persist(_)));
        assert!(!control.status().led.override_active);
    }

    #[tokio::test]
    async fn stuck_notifier_does_not_delay_snapshot() {
        let cancel = CancellationToken::new();
        let (queue, worker) = NotificationQueue::spawn(Arc::new(StuckNotifier), 1, cancel.clone());
        let control = ControlSurface::new(
            Arc::new(FrameStore::new()),
            Arc::new(LedTargetStore::new(false)),
            Arc::new(MemorySink::default()),
            queue,
            Duration::from_secs(2),
        );
        control.frames.put(frame(1), false);

        for _ in 0..5 {
            tokio::time::timeout(Duration::from_millis(200), control.request_snapshot())
                .await
                .expect("snapshot must not wait on notifications")
                .unwrap();
        }
        worker.abort();
    }

    #[test]
    fn manual_color_rejected_in_auto_mode() {
        let control = surface(true, Arc::new(MemorySink::default()));
        control.leds.set_steady(Color::BLUE);
        assert_eq!(
            control.set_manual_color(100.0, 0.0, 0.0),
            Err(LedError::AutoModeActive)
        );
        assert_eq!(control.leds.steady(), Color::BLUE);
    }

    #[test]
    fn manual_color_applied_in_manual_mode() {
        let control = surface(false, Arc::new(MemorySink::default()));
        let color = control.set_manual_color(100.0, 0.0, 0.0).unwrap();
        assert_eq!(color, Color::new(1.0, 0.0, 0.0));
        assert_eq!(control.leds.steady(), Color::new(1.0, 0.0, 0.0));
    }

    #[test]
    fn manual_color_sanitizes_input() {
        let control = surface(false, Arc::new(MemorySink::default()));
        let color = control.set_manual_color(f64::NAN, 180.0, -5.0).unwrap();
        assert_eq!(color, Color::new(0.0, 1.0, 0.0));
    }

    #[test]
    fn force_off_ignores_auto_mode() {
        for auto in [true, false] {
            let control = surface(auto, Arc::new(MemorySink::default()));
            control.leds.set_steady(Color::BLUE);
            control.force_off();
            assert_eq!(control.leds.steady(), Color::OFF);
            assert_eq!(control.leds.auto_enabled(), auto);
        }
    }

    #[test]
    fn toggle_twice_restores_state() {
        let control = surface(true, Arc::new(MemorySink::default()));
        control.leds.set_steady(Color::BLUE);
        assert!(!control.toggle_auto_mode());
        assert!(control.toggle_auto_mode());
        assert_eq!(control.leds.steady(), Color::BLUE);
        assert!(control.leds.auto_enabled());
    }

    #[test]
    fn motion_status_reads_store() {
        let control = surface(true, Arc::new(MemorySink::default()));
        assert!(!control.motion_status());
        control.frames.put(frame(1), true);
        assert!(control.motion_status());
        assert!(control.status().frame_ready);
    }

    #[tokio::test]
    async fn notifications_follow_operations() {
        let notifier = Arc::new(RecordingNotifier::default());
        let cancel = CancellationToken::new();
        let (queue, worker) = NotificationQueue::spawn(notifier.clone(), 8, cancel.clone());
        let control = ControlSurface::new(
            Arc::new(FrameStore::new()),
            Arc::new(LedTargetStore::new(false)),
            Arc::new(MemorySink::default()),
            queue,
            Duration::from_secs(2),
        );
        control.frames.put(frame(1), false);

        control.set_manual_color(50.0, 0.0, 50.0).unwrap();
        control.request_snapshot().await.unwrap();
        control.force_off();
        control.toggle_auto_mode();
        drop(control);
        worker.await.unwrap();

        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 3);
        assert_eq!(sent[0].message, "LED set to Violet.\nAuto LED: Disabled");
        assert_eq!(sent[1].title, "Pi Cam Snapshot");
        assert!(sent[1].message.contains("LED: Violet\nAuto LED: Disabled"));
        assert_eq!(sent[2].message, "LED turned off (Off).");
    }
}
