use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::bbox::{BBox, CoordinateSpace, Ltrb};
use crate::error::{Error, Result};
use crate::propagate::Direction;
use crate::timestamp::{FrameClock, Timestamp};

/// Trusted object locations keyed by timestamp. Nothing downstream may
/// replace the box of an anchor at its own timestamp.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AnchorSet {
    space: CoordinateSpace,
    boxes: BTreeMap<Timestamp, BBox<Ltrb>>,
}

impl AnchorSet {
    pub fn new(space: CoordinateSpace) -> Self {
        Self {
            space,
            boxes: BTreeMap::new(),
        }
    }

    pub fn with_anchors<I>(space: CoordinateSpace, iter: I) -> Self
    where
        I: IntoIterator<Item = (Timestamp, BBox<Ltrb>)>,
    {
        Self {
            space,
            boxes: iter.into_iter().collect(),
        }
    }

    #[inline(always)]
    pub fn coordinate_space(&self) -> CoordinateSpace {
        self.space
    }

    #[inline]
    pub fn insert(&mut self, ts: Timestamp, bbox: BBox<Ltrb>) -> Option<BBox<Ltrb>> {
        self.boxes.insert(ts, bbox)
    }

    #[inline]
    pub fn remove(&mut self, ts: Timestamp) -> Option<BBox<Ltrb>> {
        self.boxes.remove(&ts)
    }

    #[inline]
    pub fn get(&self, ts: Timestamp) -> Option<&BBox<Ltrb>> {
        self.boxes.get(&ts)
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
    pub fn timestamps(&self) -> impl DoubleEndedIterator<Item = Timestamp> + '_ {
        self.boxes.keys().copied()
    }

    /// Latest anchor strictly before `ts`.
    pub fn preceding(&self, ts: Timestamp) -> Option<Timestamp> {
        self.boxes.range(..ts).next_back().map(|(t, _)| *t)
    }

    /// Earliest anchor strictly after `ts`.
    pub fn following(&self, ts: Timestamp) -> Option<Timestamp> {
        self.boxes
            .range((std::ops::Bound::Excluded(ts), std::ops::Bound::Unbounded))
            .next()
            .map(|(t, _)| *t)
    }

    /// Anchors strictly past `ts`, nearest first, in the order a propagation
    /// travelling in `direction` would meet them.
    pub fn beyond(
        &self,
        ts: Timestamp,
        direction: Direction,
    ) -> Box<dyn Iterator<Item = Timestamp> + '_> {
        match direction {
            Direction::Forward => Box::new(
                self.boxes
                    .range((std::ops::Bound::Excluded(ts), std::ops::Bound::Unbounded))
                    .map(|(t, _)| *t),
            ),
            Direction::Backward => Box::new(self.boxes.range(..ts).rev().map(|(t, _)| *t)),
        }
    }

    /// Checks the anchors against the video they are supposed to describe.
    pub fn validate(&self, clock: &FrameClock) -> Result<()> {
        for (ts, bbox) in self.iter() {
            if clock.index_of(ts).is_none() {
                return Err(Error::AnchorOffGrid(ts));
            }

            if !self.space.contains(bbox) {
                return Err(Error::AnchorOutOfBounds(ts));
            }
        }

        Ok(())
    }
}
