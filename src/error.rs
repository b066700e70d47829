use thiserror::Error;

use crate::bbox::CoordinateSpace;
use crate::timestamp::Timestamp;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Invalid frame rate: {0}")]
    InvalidFrameRate(f64),

    #[error("Frame {0} is out of range")]
    FrameOutOfRange(Timestamp),

    #[error("Frame source exhausted: expected {expected} frames, got {got}")]
    FrameSourceExhausted { expected: u64, got: u64 },

    #[error("Frame source overrun: more than the declared {expected} frames")]
    FrameSourceOverrun { expected: u64 },

    #[error("Frame count mismatch: clock declares {expected} frames, got {got}")]
    FrameCountMismatch { expected: u64, got: u64 },

    #[error("Frame #{index} has timestamp {got}, expected {expected}")]
    FrameTimestampMismatch {
        index: u64,
        expected: Timestamp,
        got: Timestamp,
    },

    #[error("Video has {frames} frames, frame cache capacity is {capacity}")]
    CacheCapacityExceeded { frames: u64, capacity: usize },

    #[error("Anchors are in {anchors:?}, tracker reports {tracker:?}")]
    CoordinateSpaceMismatch {
        anchors: CoordinateSpace,
        tracker: CoordinateSpace,
    },

    #[error("Anchors are in {anchors:?}, frames are in {frames:?}")]
    FrameSpaceMismatch {
        anchors: CoordinateSpace,
        frames: CoordinateSpace,
    },

    #[error("Anchor at {0} is not on the frame grid")]
    AnchorOffGrid(Timestamp),

    #[error("Anchor at {0} lies outside its coordinate space")]
    AnchorOutOfBounds(Timestamp),

    #[error("Detector Error: {0}")]
    Detector(String),

    #[error("Correction Error: {0}")]
    Correction(String),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

/// Raised by a visual tracker when it loses the object. Never fatal: the
/// propagation that hit it simply stops.
#[derive(Debug, Clone, Error)]
#[error("Tracker lost the object: {reason}")]
pub struct TrackerFailure {
    pub reason: String,
}

impl TrackerFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}
