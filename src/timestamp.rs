use serde_derive::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};

/// Milliseconds from the start of the video.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct Timestamp(pub u64);

impl Timestamp {
    #[inline]
    pub fn from_millis(ms: u64) -> Self {
        Timestamp(ms)
    }

    #[inline(always)]
    pub fn as_millis(&self) -> u64 {
        self.0
    }

    /// Rounded to the nearest millisecond, so converting the same index twice
    /// always lands on the same value.
    #[inline]
    pub fn from_frame_index(index: u64, fps: f64) -> Self {
        Timestamp((index as f64 * 1000.0 / fps).round() as u64)
    }

    #[inline]
    pub fn abs_diff(&self, other: Timestamp) -> u64 {
        self.0.abs_diff(other.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Frame rate and length of a video; the only source of truth for the frame
/// grid.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct FrameClock {
    fps: f64,
    frame_count: u64,
}

/// Above this rate two frames round to the same millisecond.
pub const MAX_FPS: f64 = 1000.0;

impl FrameClock {
    pub fn new(fps: f64, frame_count: u64) -> Result<Self> {
        if !fps.is_finite() || fps <= 0.0 || fps > MAX_FPS {
            return Err(Error::InvalidFrameRate(fps));
        }

        Ok(Self { fps, frame_count })
    }

    #[inline(always)]
    pub fn fps(&self) -> f64 {
        self.fps
    }

    #[inline(always)]
    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    #[inline]
    pub fn frame_interval_ms(&self) -> f64 {
        1000.0 / self.fps
    }

    #[inline]
    pub fn timestamp(&self, index: u64) -> Timestamp {
        Timestamp::from_frame_index(index, self.fps)
    }

    /// Frame index of an on-grid timestamp, `None` for anything else.
    pub fn index_of(&self, ts: Timestamp) -> Option<u64> {
        let index = (ts.0 as f64 * self.fps / 1000.0).round() as u64;

        if index < self.frame_count && self.timestamp(index) == ts {
            Some(index)
        } else {
            None
        }
    }

    pub fn timestamps(&self) -> impl DoubleEndedIterator<Item = Timestamp> {
        let fps = self.fps;
        (0..self.frame_count).map(move |i| Timestamp::from_frame_index(i, fps))
    }

    #[inline]
    pub fn first(&self) -> Option<Timestamp> {
        (self.frame_count > 0).then(|| self.timestamp(0))
    }

    #[inline]
    pub fn last(&self) -> Option<Timestamp> {
        self.frame_count.checked_sub(1).map(|i| self.timestamp(i))
    }

    /// Length of the whole video, one interval past the last frame.
    #[inline]
    pub fn duration_ms(&self) -> u64 {
        self.timestamp(self.frame_count).0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_index_roundtrip_is_exact() {
        let clock = FrameClock::new(29.97, 1000).unwrap();

        for (i, ts) in clock.timestamps().enumerate() {
            assert_eq!(clock.index_of(ts), Some(i as u64));
            assert_eq!(clock.timestamp(i as u64), ts);
        }
    }

    #[test]
    fn test_off_grid_timestamp() {
        let clock = FrameClock::new(25.0, 10).unwrap();

        assert_eq!(clock.index_of(Timestamp(40)), Some(1));
        assert_eq!(clock.index_of(Timestamp(41)), None);
        assert_eq!(clock.index_of(Timestamp(400)), None);
    }

    #[test]
    fn test_edges_and_duration() {
        let clock = FrameClock::new(25.0, 10).unwrap();

        assert_eq!(clock.first(), Some(Timestamp(0)));
        assert_eq!(clock.last(), Some(Timestamp(360)));
        assert_eq!(clock.duration_ms(), 400);

        let empty = FrameClock::new(25.0, 0).unwrap();
        assert_eq!(empty.first(), None);
        assert_eq!(empty.last(), None);
    }

    #[test]
    fn test_rejects_bad_fps() {
        assert!(FrameClock::new(0.0, 10).is_err());
        assert!(FrameClock::new(f64::NAN, 10).is_err());
        assert!(FrameClock::new(-30.0, 10).is_err());
        assert!(matches!(
            FrameClock::new(2000.0, 10),
            Err(Error::InvalidFrameRate(_))
        ));
        assert!(FrameClock::new(1000.1, 10).is_err());
    }

    #[test]
    fn test_highest_rate_keeps_frames_apart() {
        let clock = FrameClock::new(MAX_FPS, 100).unwrap();
        let ts: Vec<Timestamp> = clock.timestamps().collect();

        assert!(ts.windows(2).all(|w| w[0] < w[1]));
        for (i, t) in ts.iter().enumerate() {
            assert_eq!(clock.index_of(*t), Some(i as u64));
        }

        let odd = FrameClock::new(999.7, 1000).unwrap();
        for (i, t) in odd.timestamps().enumerate() {
            assert_eq!(odd.index_of(t), Some(i as u64));
        }
    }
}
