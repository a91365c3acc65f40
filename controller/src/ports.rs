//! Collaborator interfaces at the edge of the controller.
//!
//! The loops and the control surface only ever talk to hardware, storage and
//! notification services through these traits. Concrete implementations live
//! in the `picam-capture` and `picam-api` crates; tests use in-memory fakes.

use std::path::PathBuf;

use async_trait::async_trait;
use picam_common::frame::Frame;

use crate::led::Color;

/// Source of camera frames. Only the acquisition loop calls it.
#[async_trait]
pub trait Camera: Send {
    async fn capture_frame(&mut self) -> Result<Frame, CaptureError>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "camera"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("camera transport error: {0}")]
    Transport(String),
    #[error("camera returned HTTP status {0}")]
    Status(u16),
    #[error("failed to decode camera frame: {0}")]
    Decode(String),
    #[error("camera error: {0}")]
    Other(String),
}

/// Physical LED output. Only the render loop calls it.
pub trait Actuator: Send {
    fn drive(&mut self, color: Color) -> Result<(), ActuatorError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ActuatorError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("actuator unavailable: {0}")]
    Unavailable(String),
}

/// A persisted snapshot, returned to the caller as the capture artifact.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub filename: String,
    pub path: PathBuf,
    /// Encoded image bytes.
    pub bytes: Vec<u8>,
    pub content_type: &'static str,
}

/// Encodes and stores snapshot frames.
#[async_trait]
pub trait SnapshotSink: Send + Sync {
    async fn save(&self, frame: &Frame) -> Result<Snapshot, PersistError>;
}

#[derive(Debug, thiserror::Error)]
pub enum PersistError {
    #[error("failed to encode snapshot: {0}")]
    Encode(String),
    #[error("failed to write snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("snapshot task failed: {0}")]
    Task(String),
}

/// A push notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub title: String,
    pub priority: i8,
}

impl Notification {
    pub fn new(title: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            title: title.into(),
            priority: 0,
        }
    }
}

/// Delivers push notifications. Called from the notification worker only,
/// never on a request path.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notification: &Notification) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport error: {0}")]
    Transport(String),
    #[error("notification service returned status {status}: {body}")]
    Status { status: u16, body: String },
}
