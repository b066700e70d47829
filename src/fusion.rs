use serde_derive::{Deserialize, Serialize};
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use crate::anchors::AnchorSet;
use crate::bbox::{BBox, Ltrb};
use crate::error::Result;
use crate::propagate::{Direction, PropagatedTrack};
use crate::timestamp::{FrameClock, Timestamp};

/// Where a merged box came from.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Anchor,
    Propagated(Direction),
}

/// One box per covered timestamp. Timestamps nobody could cover are simply
/// absent; `CoverageReport::uncovered` lists them as spans.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct MergedTrajectory {
    pub(crate) boxes: BTreeMap<Timestamp, BBox<Ltrb>>,
    pub(crate) sources: BTreeMap<Timestamp, Source>,
}

impl MergedTrajectory {
    #[inline]
    pub fn get(&self, ts: Timestamp) -> Option<&BBox<Ltrb>> {
        self.boxes.get(&ts)
    }

    #[inline]
    pub fn source(&self, ts: Timestamp) -> Option<Source> {
        self.sources.get(&ts).copied()
    }

    #[inline]
    pub fn contains(&self, ts: Timestamp) -> bool {
        self.boxes.contains_key(&ts)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }

    #[inline]
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (Timestamp, &BBox<Ltrb>)> {
        self.boxes.iter().map(|(ts, b)| (*ts, b))
    }

    #[inline]
    pub fn first(&self) -> Option<Timestamp> {
        self.boxes.keys().next().copied()
    }

    #[inline]
    pub fn last(&self) -> Option<Timestamp> {
        self.boxes.keys().next_back().copied()
    }

    /// Fraction of the video's frames that have a box.
    pub fn retention(&self, clock: &FrameClock) -> f64 {
        if clock.frame_count() == 0 {
            return 0.0;
        }

        self.len() as f64 / clock.frame_count() as f64
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    fn set(&mut self, ts: Timestamp, bbox: BBox<Ltrb>, source: Source) {
        self.boxes.insert(ts, bbox);
        self.sources.insert(ts, source);
    }
}

struct Candidate<'a> {
    direction: Direction,
    bbox: &'a BBox<Ltrb>,
    priority: u64,
}

/// Anchors are copied as they are. Every other timestamp takes the estimate
/// closest to its own seed; on equal distance the track listed first in
/// `tracks` keeps the slot.
pub fn merge(anchors: &AnchorSet, tracks: &[PropagatedTrack], clock: &FrameClock) -> MergedTrajectory {
    let worst = clock.duration_ms();
    let mut best: BTreeMap<Timestamp, Candidate<'_>> = BTreeMap::new();

    for track in tracks {
        let direction = track.direction();

        for (ts, bbox) in track.iter() {
            if anchors.contains(ts) {
                continue;
            }

            let candidate = Candidate {
                direction,
                bbox,
                priority: direction.priority(anchors, ts, worst),
            };

            match best.entry(ts) {
                Entry::Vacant(slot) => {
                    slot.insert(candidate);
                }
                Entry::Occupied(mut slot) => {
                    if candidate.priority < slot.get().priority {
                        slot.insert(candidate);
                    }
                }
            }
        }
    }

    let mut merged = MergedTrajectory::default();

    for (ts, bbox) in anchors.iter() {
        merged.set(ts, *bbox, Source::Anchor);
    }

    for (ts, c) in best {
        merged.set(ts, *c.bbox, Source::Propagated(c.direction));
    }

    merged
}

/// Inclusive range of consecutive frames without a box.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: Timestamp,
    pub end: Timestamp,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CoverageReport {
    pub retention: f64,
    pub total_frames: u64,
    pub covered_frames: u64,
    pub anchor_frames: u64,
    pub forward_frames: u64,
    pub backward_frames: u64,
    pub uncovered: Vec<Span>,
}

impl CoverageReport {
    pub fn new(merged: &MergedTrajectory, clock: &FrameClock) -> Self {
        let mut anchor_frames = 0;
        let mut forward_frames = 0;
        let mut backward_frames = 0;

        for source in merged.sources.values() {
            match source {
                Source::Anchor => anchor_frames += 1,
                Source::Propagated(Direction::Forward) => forward_frames += 1,
                Source::Propagated(Direction::Backward) => backward_frames += 1,
            }
        }

        let mut uncovered = Vec::new();
        let mut open: Option<Span> = None;

        for ts in clock.timestamps() {
            if merged.contains(ts) {
                uncovered.extend(open.take());
            } else {
                match &mut open {
                    Some(span) => span.end = ts,
                    None => open = Some(Span { start: ts, end: ts }),
                }
            }
        }
        uncovered.extend(open);

        Self {
            retention: merged.retention(clock),
            total_frames: clock.frame_count(),
            covered_frames: merged.len() as u64,
            anchor_frames,
            forward_frames,
            backward_frames,
            uncovered,
        }
    }
}
