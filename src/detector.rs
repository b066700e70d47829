use tracing::{debug, info_span};

use crate::anchors::AnchorSet;
use crate::bbox::{BBox, Ltrb};
use crate::error::{Error, Result};
use crate::frame::FrameSource;

/// Expensive object detector; `None` means the object was not found.
pub trait Detector<Frame> {
    fn detect(&mut self, frame: &Frame) -> Result<Option<BBox<Ltrb>>>;
}

impl<Frame, F> Detector<Frame> for F
where
    F: FnMut(&Frame) -> Result<Option<BBox<Ltrb>>>,
{
    #[inline]
    fn detect(&mut self, frame: &Frame) -> Result<Option<BBox<Ltrb>>> {
        self(frame)
    }
}

/// Runs `detector` on every `stride`-th frame of `source` and keeps the hits.
///
/// The detector only ever sees frames in order, so a plain sequential source
/// is enough here.
pub fn detect_anchors<S, D>(mut source: S, detector: &mut D, stride: usize) -> Result<AnchorSet>
where
    S: FrameSource,
    D: Detector<S::Frame>,
{
    if stride == 0 {
        return Err(Error::InvalidConfig("detection stride must be positive".into()));
    }

    let clock = source.clock();
    let _span = info_span!("detect_anchors", frames = clock.frame_count(), stride).entered();

    let expected = clock.frame_count();
    let mut anchors = AnchorSet::new(source.coordinate_space());
    let mut sampled = 0usize;

    for index in 0..expected {
        let Some((ts, frame)) = source.next_frame()? else {
            return Err(Error::FrameSourceExhausted { expected, got: index });
        };

        if index % stride as u64 == 0 {
            sampled += 1;
            if let Some(bbox) = detector.detect(&frame)? {
                anchors.insert(ts, bbox);
            }
        }
    }

    if source.next_frame()?.is_some() {
        return Err(Error::FrameSourceOverrun { expected });
    }

    debug!(sampled, hits = anchors.len(), "detection pass finished");

    Ok(anchors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bbox::CoordinateSpace;
    use crate::timestamp::{FrameClock, Timestamp};

    struct Frames {
        clock: FrameClock,
        next: u64,
        stop_at: u64,
    }

    impl FrameSource for Frames {
        type Frame = u64;

        fn clock(&self) -> FrameClock {
            self.clock
        }

        fn coordinate_space(&self) -> CoordinateSpace {
            CoordinateSpace::Normalized
        }

        fn next_frame(&mut self) -> Result<Option<(Timestamp, u64)>> {
            if self.next >= self.stop_at {
                return Ok(None);
            }
            let i = self.next;
            self.next += 1;
            Ok(Some((self.clock.timestamp(i), i)))
        }
    }

    fn frames(count: u64, stop_at: u64) -> Frames {
        Frames {
            clock: FrameClock::new(25.0, count).unwrap(),
            next: 0,
            stop_at,
        }
    }

    #[test]
    fn test_stride_and_misses() {
        let mut seen = Vec::new();
        let mut detector = |f: &u64| -> Result<Option<BBox<Ltrb>>> {
            seen.push(*f);
            // the ball is hidden on frame 4
            Ok((*f != 4).then(|| BBox::ltrb(0.1, 0.1, 0.2, 0.2)))
        };

        let anchors = detect_anchors(frames(10, 10), &mut detector, 2).unwrap();

        assert_eq!(seen, vec![0, 2, 4, 6, 8]);
        let ts: Vec<_> = anchors.timestamps().map(|t| t.as_millis()).collect();
        assert_eq!(ts, vec![0, 80, 240, 320]);
    }

    #[test]
    fn test_detector_error_is_surfaced() {
        let mut detector =
            |_: &u64| -> Result<Option<BBox<Ltrb>>> { Err(Error::Detector("model crashed".into())) };

        assert!(matches!(
            detect_anchors(frames(3, 3), &mut detector, 1),
            Err(Error::Detector(_))
        ));
    }

    #[test]
    fn test_short_source() {
        let mut detector = |_: &u64| -> Result<Option<BBox<Ltrb>>> { Ok(None) };

        assert!(matches!(
            detect_anchors(frames(10, 4), &mut detector, 1),
            Err(Error::FrameSourceExhausted { expected: 10, got: 4 })
        ));
    }

    #[test]
    fn test_long_source() {
        let mut detector = |_: &u64| -> Result<Option<BBox<Ltrb>>> { Ok(None) };

        assert!(matches!(
            detect_anchors(frames(10, 500), &mut detector, 1),
            Err(Error::FrameSourceOverrun { expected: 10 })
        ));
    }

    #[test]
    fn test_zero_stride() {
        let mut detector = |_: &u64| -> Result<Option<BBox<Ltrb>>> { Ok(None) };

        assert!(detect_anchors(frames(3, 3), &mut detector, 0).is_err());
    }
}
