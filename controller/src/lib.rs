//! Concurrency core of the camera controller.
//!
//! Three periodic loops share state only through two stores:
//!
//! - acquisition: camera -> [`MotionDetector`] -> [`FrameStore`]
//! - auto policy: [`FrameStore`] verdict -> [`LedTargetStore`] steady color
//! - render: [`LedTargetStore`] effective color -> actuator
//!
//! The request layer goes through [`ControlSurface`], which reads and writes
//! the same two stores.

pub mod acquisition;
pub mod auto_policy;
pub mod control;
pub mod frame_store;
pub mod led;
pub mod motion;
pub mod notify;
pub mod ports;
pub mod runtime;

pub use control::{ControlSurface, SnapshotError, Status};
pub use frame_store::{FrameReading, FrameStore};
pub use led::{Color, LedError, LedTargetStore, Polarity};
pub use motion::MotionDetector;
pub use notify::NotificationQueue;
pub use runtime::{LoopTimings, Runtime};
