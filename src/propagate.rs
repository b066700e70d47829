use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info_span};

use crate::anchors::AnchorSet;
use crate::bbox::{BBox, Ltrb};
use crate::error::{Error, Result, TrackerFailure};
use crate::frame::FrameStore;
use crate::gap::GapAnalyzer;
use crate::timestamp::{FrameClock, Timestamp};
use crate::tracker::VisualTracker;

/// Way a propagation travels through the video. Each variant knows where it
/// seeds from, so fusion can rank its estimates by distance to that seed.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Forward,
    Backward,
}

impl Direction {
    /// Anchor a propagation reaching `ts` in this direction was seeded from.
    #[inline]
    pub fn seed(&self, anchors: &AnchorSet, ts: Timestamp) -> Option<Timestamp> {
        match self {
            Direction::Forward => anchors.preceding(ts),
            Direction::Backward => anchors.following(ts),
        }
    }

    /// Distance from `ts` back to its seed, `worst` when there is none.
    /// Lower is more trustworthy since drift grows with that distance.
    #[inline]
    pub fn priority(&self, anchors: &AnchorSet, ts: Timestamp, worst: u64) -> u64 {
        self.seed(anchors, ts)
            .map(|seed| seed.abs_diff(ts))
            .unwrap_or(worst)
    }

    #[inline]
    fn reached(&self, ts: Timestamp, limit: Timestamp) -> bool {
        match self {
            Direction::Forward => ts >= limit,
            Direction::Backward => ts <= limit,
        }
    }
}

/// Estimates produced by one propagation pass. Never contains anchor
/// timestamps.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct PropagatedTrack {
    direction: Direction,
    boxes: BTreeMap<Timestamp, BBox<Ltrb>>,
}

impl PropagatedTrack {
    pub fn new(direction: Direction) -> Self {
        Self {
            direction,
            boxes: BTreeMap::new(),
        }
    }

    #[inline(always)]
    pub fn direction(&self) -> Direction {
        self.direction
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

    pub(crate) fn insert(&mut self, ts: Timestamp, bbox: BBox<Ltrb>) {
        self.boxes.insert(ts, bbox);
    }
}

/// Frame timestamps in travel order.
struct Walk {
    direction: Direction,
    clock: FrameClock,
    order: Vec<Timestamp>,
}

impl Walk {
    fn new(direction: Direction, clock: FrameClock) -> Self {
        let order = match direction {
            Direction::Forward => clock.timestamps().collect(),
            Direction::Backward => clock.timestamps().rev().collect(),
        };

        Self {
            direction,
            clock,
            order,
        }
    }

    fn position(&self, ts: Timestamp) -> Result<usize> {
        let index = self.clock.index_of(ts).ok_or(Error::AnchorOffGrid(ts))? as usize;

        Ok(match self.direction {
            Direction::Forward => index,
            Direction::Backward => self.order.len() - 1 - index,
        })
    }
}

enum Stopped {
    Limit,
    EndOfVideo,
    Lost(TrackerFailure),
}

/// Seeds the tracker at each anchor that has a gap after it (in `direction`)
/// and follows the object until the tracker loses it or the next contiguous
/// anchor run is reached.
pub fn propagate<S, T>(
    direction: Direction,
    anchors: &AnchorSet,
    store: &S,
    tracker: &T,
    gap_tolerance: f64,
) -> Result<PropagatedTrack>
where
    S: FrameStore,
    T: VisualTracker<S::Frame>,
{
    let _span = info_span!("propagate", ?direction, anchors = anchors.len()).entered();

    let clock = *store.clock();
    let walk = Walk::new(direction, clock);
    let gap = GapAnalyzer::new(anchors, &clock, gap_tolerance);
    let mut track = PropagatedTrack::new(direction);

    let mut i = 0;
    while i < walk.order.len() {
        let ts = walk.order[i];

        if anchors.contains(ts) {
            i += 1;
            continue;
        }

        let limit = gap.boundary(ts, direction);
        let seed = match direction.seed(anchors, ts) {
            Some(seed) => seed,
            None => match anchors.beyond(ts, direction).next() {
                Some(first) => {
                    i = walk.position(first)?;
                    continue;
                }
                None => {
                    debug!(at = %ts, "no anchor to seed from");
                    break;
                }
            },
        };

        let before = track.len();
        let stopped = follow(&walk, i, seed, limit, anchors, store, tracker, &mut track)?;

        match &stopped {
            Stopped::Lost(failure) => {
                debug!(seed = %seed, ?limit, emitted = track.len() - before, %failure, "tracker lost the object")
            }
            _ => debug!(seed = %seed, ?limit, emitted = track.len() - before, "segment done"),
        }

        match limit {
            Some(limit) => i = walk.position(limit)?,
            None => break,
        }
    }

    debug!(frames = track.len(), "propagation finished");

    Ok(track)
}

#[allow(clippy::too_many_arguments)]
fn follow<S, T>(
    walk: &Walk,
    start: usize,
    seed: Timestamp,
    limit: Option<Timestamp>,
    anchors: &AnchorSet,
    store: &S,
    tracker: &T,
    track: &mut PropagatedTrack,
) -> Result<Stopped>
where
    S: FrameStore,
    T: VisualTracker<S::Frame>,
{
    let seed_box = anchors.get(seed).ok_or(Error::AnchorOffGrid(seed))?;
    let mut handle = match tracker.init(store.frame_at(seed)?, seed_box) {
        Ok(handle) => handle,
        Err(failure) => return Ok(Stopped::Lost(failure)),
    };

    for &ts in &walk.order[start..] {
        if matches!(limit, Some(limit) if walk.direction.reached(ts, limit)) {
            return Ok(Stopped::Limit);
        }

        let bbox = match tracker.update(&mut handle, store.frame_at(ts)?) {
            Ok(bbox) if bbox.is_finite() => bbox,
            Ok(_) => return Ok(Stopped::Lost(TrackerFailure::new("non-finite box"))),
            Err(failure) => return Ok(Stopped::Lost(failure)),
        };

        // anchors inside the segment keep their own box, the tracker only
        // needs to see the frame
        if !anchors.contains(ts) {
            track.insert(ts, bbox);
        }
    }

    Ok(Stopped::EndOfVideo)
}

#[inline]
pub fn forward<S, T>(anchors: &AnchorSet, store: &S, tracker: &T, gap_tolerance: f64) -> Result<PropagatedTrack>
where
    S: FrameStore,
    T: VisualTracker<S::Frame>,
{
    propagate(Direction::Forward, anchors, store, tracker, gap_tolerance)
}

#[inline]
pub fn backward<S, T>(anchors: &AnchorSet, store: &S, tracker: &T, gap_tolerance: f64) -> Result<PropagatedTrack>
where
    S: FrameStore,
    T: VisualTracker<S::Frame>,
{
    propagate(Direction::Backward, anchors, store, tracker, gap_tolerance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::CoordinateSpace;
    use crate::frame::FrameCache;
    use std::collections::HashSet;

    /// Frames are their own index. The tracker shifts the box right by one
    /// pixel per frame away from its seed and loses the object on frames
    /// listed in `lost`.
    struct Shift {
        lost: HashSet<u64>,
    }

    impl VisualTracker<u64> for Shift {
        type Handle = (u64, BBox<Ltrb>);

        fn coordinate_space(&self) -> CoordinateSpace {
            CoordinateSpace::Pixels {
                width: 1000,
                height: 1000,
            }
        }

        fn init(&self, frame: &u64, bbox: &BBox<Ltrb>) -> std::result::Result<Self::Handle, TrackerFailure> {
            Ok((*frame, *bbox))
        }

        fn update(&self, handle: &mut Self::Handle, frame: &u64) -> std::result::Result<BBox<Ltrb>, TrackerFailure> {
            if self.lost.contains(frame) {
                return Err(TrackerFailure::new("occluded"));
            }

            let d = frame.abs_diff(handle.0) as f32;
            let b = handle.1;

            Ok(BBox::ltrb(b.left() + d, b.top(), b.right() + d, b.bottom()))
        }
    }

    fn store(frames: u64) -> FrameCache<u64> {
        let clock = FrameClock::new(25.0, frames).unwrap();
        let space = CoordinateSpace::Pixels {
            width: 1000,
            height: 1000,
        };

        FrameCache::from_frames(clock, space, (0..frames).collect()).unwrap()
    }

    fn anchors(frames: &[u64]) -> AnchorSet {
        AnchorSet::with_anchors(
            CoordinateSpace::Pixels {
                width: 1000,
                height: 1000,
            },
            frames
                .iter()
                .map(|&f| (Timestamp(f * 40), BBox::ltrb(100.0, 100.0, 110.0, 110.0))),
        )
    }

    fn frames_of(track: &PropagatedTrack) -> Vec<u64> {
        track.iter().map(|(ts, _)| ts.as_millis() / 40).collect()
    }

    fn tracker(lost: &[u64]) -> Shift {
        Shift {
            lost: lost.iter().copied().collect(),
        }
    }

    #[test]
    fn test_forward_stays_strictly_between_seed_and_limit() {
        let store = store(20);
        let a = anchors(&[2, 8, 9]);

        let track = forward(&a, &store, &tracker(&[]), 1.1).unwrap();

        assert_eq!(track.direction(), Direction::Forward);
        // 8 is an anchor, 9 the limit; after the limit the run continues to
        // the end of the video
        assert_eq!(frames_of(&track), vec![3, 4, 5, 6, 7, 10, 11, 12, 13, 14, 15, 16, 17, 18, 19]);

        let b = track.get(Timestamp(5 * 40)).unwrap();
        assert_eq!(b.left(), 103.0);
    }

    #[test]
    fn test_forward_truncates_on_failure() {
        let store = store(20);
        let a = anchors(&[2, 12]);

        let track = forward(&a, &store, &tracker(&[6]), 1.1).unwrap();

        assert_eq!(frames_of(&track), vec![3, 4, 5, 13, 14, 15, 16, 17, 18, 19]);
    }

    #[test]
    fn test_forward_skips_until_first_anchor() {
        let store = store(10);
        let a = anchors(&[4]);

        let track = forward(&a, &store, &tracker(&[]), 1.1).unwrap();

        assert_eq!(frames_of(&track), vec![5, 6, 7, 8, 9]);
    }

    #[test]
    fn test_backward_mirrors_forward() {
        let store = store(20);
        let a = anchors(&[2, 3, 12]);

        let track = backward(&a, &store, &tracker(&[]), 1.1).unwrap();

        assert_eq!(track.direction(), Direction::Backward);
        // limit from 11 backward is 2, the far end of the {3, 2} run
        assert_eq!(frames_of(&track), vec![0, 1, 4, 5, 6, 7, 8, 9, 10, 11]);

        let b = track.get(Timestamp(10 * 40)).unwrap();
        assert_eq!(b.left(), 102.0);
    }

    #[test]
    fn test_backward_truncates_on_failure() {
        let store = store(20);
        let a = anchors(&[2, 12]);

        let track = backward(&a, &store, &tracker(&[9]), 1.1).unwrap();

        assert_eq!(frames_of(&track), vec![0, 1, 10, 11]);
    }

    #[test]
    fn test_no_anchors_gives_empty_tracks() {
        let store = store(10);
        let a = anchors(&[]);

        assert!(forward(&a, &store, &tracker(&[]), 1.1).unwrap().is_empty());
        assert!(backward(&a, &store, &tracker(&[]), 1.1).unwrap().is_empty());
    }

    #[test]
    fn test_full_coverage_gives_empty_tracks() {
        let store = store(10);
        let all: Vec<u64> = (0..10).collect();
        let a = anchors(&all);

        assert!(forward(&a, &store, &tracker(&[]), 1.1).unwrap().is_empty());
        assert!(backward(&a, &store, &tracker(&[]), 1.1).unwrap().is_empty());
    }

    #[test]
    fn test_off_grid_anchor_is_rejected() {
        let store = store(10);
        let mut a = anchors(&[]);
        a.insert(Timestamp(41), BBox::ltrb(100.0, 100.0, 110.0, 110.0));

        assert!(forward(&a, &store, &tracker(&[]), 1.1).is_err());
    }

    #[test]
    fn test_priority_is_distance_to_seed() {
        let a = anchors(&[2, 12]);
        let ts = Timestamp(5 * 40);

        assert_eq!(Direction::Forward.priority(&a, ts, 9999), 120);
        assert_eq!(Direction::Backward.priority(&a, ts, 9999), 280);
        assert_eq!(Direction::Backward.priority(&a, Timestamp(14 * 40), 9999), 9999);
    }
}
