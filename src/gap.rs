//! Gap structure of a sparse anchor set.
//!
//! Anchors on consecutive frames form a run. A propagation travelling away
//! from a timestamp may go as far as the end of the nearest run ahead of it,
//! and no further: past that point the anchors themselves take over.

use crate::anchors::AnchorSet;
use crate::propagate::Direction;
use crate::timestamp::{FrameClock, Timestamp};

pub struct GapAnalyzer<'a> {
    anchors: &'a AnchorSet,
    clock: &'a FrameClock,
    max_gap_ms: f64,
}

impl<'a> GapAnalyzer<'a> {
    /// `tolerance` scales one frame interval into the largest gap still
    /// considered contiguous.
    pub fn new(anchors: &'a AnchorSet, clock: &'a FrameClock, tolerance: f64) -> Self {
        Self {
            anchors,
            clock,
            max_gap_ms: clock.frame_interval_ms() * tolerance,
        }
    }

    #[inline(always)]
    pub fn max_gap_ms(&self) -> f64 {
        self.max_gap_ms
    }

    /// The far end of the contiguous run of anchors nearest to `from` in
    /// `direction`, or `None` when there is nothing ahead or the run reaches
    /// the edge of the video.
    pub fn boundary(&self, from: Timestamp, direction: Direction) -> Option<Timestamp> {
        let mut ahead = self.anchors.beyond(from, direction);
        let mut last = ahead.next()?;

        for next in ahead {
            // a gap equal to the tolerance still counts as contiguous
            if next.abs_diff(last) as f64 > self.max_gap_ms {
                break;
            }
            last = next;
        }

        if Some(last) == self.clock.first() || Some(last) == self.clock.last() {
            None
        } else {
            Some(last)
        }
    }
}
