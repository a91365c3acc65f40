use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::ports::{Notification, Notifier};

/// Fire-and-forget handle for push notifications.
///
/// Messages go onto a bounded queue drained by a single worker. `send` never
/// waits: when the queue is full (slow or unreachable notifier) the message
/// is dropped with a warning.
#[derive(Clone)]
pub struct NotificationQueue {
    tx: Option<mpsc::Sender<Notification>>,
}

impl NotificationQueue {
    /// Start the worker task. It exits once `cancel` fires or every sender
    /// has been dropped.
    pub fn spawn(
        notifier: Arc<dyn Notifier>,
        depth: usize,
        cancel: CancellationToken,
    ) -> (Self, JoinHandle<()>) {
        let (tx, rx) = mpsc::channel(depth.max(1));
        let worker = tokio::spawn(run_worker(notifier, rx, cancel));
        (Self { tx: Some(tx) }, worker)
    }

    /// A queue that discards everything, for when notifications are off.
    pub fn disabled() -> Self {
        Self { tx: None }
    }

    pub fn send(&self, notification: Notification) {
        let Some(tx) = &self.tx else {
            debug!(title = notification.title, "notifications disabled, dropping");
            return;
        };
        match tx.try_send(notification) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(n)) => {
                warn!(title = n.title, "notification queue full, dropping message");
            }
            Err(mpsc::error::TrySendError::Closed(n)) => {
                warn!(title = n.title, "notification worker stopped, dropping message");
            }
        }
    }
}

async fn run_worker(
    notifier: Arc<dyn Notifier>,
    mut rx: mpsc::Receiver<Notification>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = rx.recv() => next,
        };
        let Some(notification) = next else { break };

        match notifier.notify(&notification).await {
            Ok(()) => debug!(title = notification.title, "push notification sent"),
            Err(e) => warn!(error = %e, title = notification.title, "failed to send push notification"),
        }
    }
    info!("notification worker stopped");
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::ports::NotifyError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Records every delivered notification.
    #[derive(Default)]
    pub(crate) struct RecordingNotifier {
        pub sent: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(notification.clone());
            Ok(())
        }
    }

    /// Never completes a delivery.
    pub(crate) struct StuckNotifier;

    #[async_trait]
    impl Notifier for StuckNotifier {
        async fn notify(&self, _notification: &Notification) -> Result<(), NotifyError> {
            std::future::pending().await
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl Notifier for FailingNotifier {
        async fn notify(&self, _notification: &Notification) -> Result<(), NotifyError> {
            Err(NotifyError::Status {
                status: 500,
                body: "down".into(),
            })
        }
    }

    #[tokio::test]
    async fn delivers_in_order() {
        let notifier = Arc::new(RecordingNotifier::default());
        let cancel = CancellationToken::new();
        let (queue, worker) = NotificationQueue::spawn(notifier.clone(), 8, cancel.clone());

        queue.send(Notification::new("a", "first"));
        queue.send(Notification::new("b", "second"));
        drop(queue);
        worker.await.unwrap();

        let sent = notifier.sent.lock().unwrap();
        let titles: Vec<_> = sent.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, ["a", "b"]);
    }

    #[tokio::test]
    async fn full_queue_drops_without_blocking() {
        let cancel = CancellationToken::new();
        let (queue, worker) = NotificationQueue::spawn(Arc::new(StuckNotifier), 2, cancel.clone());

        let sending = async {
            for i in 0..50 {
                queue.send(Notification::new("t", format!("{i}")));
            }
        };
        tokio::time::timeout(Duration::from_millis(100), sending)
            .await
            .expect("send must not block");

        cancel.cancel();
        worker.abort();
    }

    #[tokio::test]
    async fn failures_keep_worker_alive() {
        let cancel = CancellationToken::new();
        let (queue, worker) = NotificationQueue::spawn(Arc::new(FailingNotifier), 4, cancel.clone());
        queue.send(Notification::new("t", "x"));
        queue.send(Notification::new("t", "y"));
        tokio::task::yield_now().await;
        assert!(!worker.is_finished());
        cancel.cancel();
        worker.await.unwrap();
    }

    #[test]
    fn disabled_queue_accepts_everything() {
        let queue = NotificationQueue::disabled();
        queue.send(Notification::new("t", "ignored"));
    }
}
