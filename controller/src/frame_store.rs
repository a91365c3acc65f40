use std::sync::{PoisonError, RwLock};

use picam_common::frame::Frame;

/// The latest captured frame together with the motion verdict computed for it.
#[derive(Debug, Clone, Default)]
pub struct FrameReading {
    /// `None` until the first capture completes.
    pub frame: Option<Frame>,
    pub motion: bool,
}

/// Holds the most recent (frame, motion) pair.
///
/// The pair is replaced as one unit, so a reader never sees a frame from one
/// acquisition cycle next to the verdict from another. Frames are stored by
/// value; readers get a clone that shares the immutable pixel buffer, so the
/// lock is only ever held for a pointer copy.
#[derive(Debug, Default)]
pub struct FrameStore {
    current: RwLock<FrameReading>,
}

impl FrameStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, frame: Frame, motion: bool) {
        let reading = FrameReading {
            frame: Some(frame),
            motion,
        };
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = reading;
    }

    pub fn get(&self) -> FrameReading {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Current verdict only, without cloning the frame.
    pub fn motion(&self) -> bool {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .motion
    }
}
