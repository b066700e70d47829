use tracing::debug;

use crate::bbox::CoordinateSpace;
use crate::error::{Error, Result};
use crate::timestamp::{FrameClock, Timestamp};

/// Decoded video readable front to back only.
pub trait FrameSource {
    type Frame;

    fn clock(&self) -> FrameClock;
    fn coordinate_space(&self) -> CoordinateSpace;
    fn next_frame(&mut self) -> Result<Option<(Timestamp, Self::Frame)>>;
}

/// Decoded video with random access by timestamp. Backward propagation
/// cannot work without one.
pub trait FrameStore {
    type Frame;

    fn clock(&self) -> &FrameClock;
    fn coordinate_space(&self) -> CoordinateSpace;
    fn frame_at(&self, ts: Timestamp) -> Result<&Self::Frame>;
}

/// Whole video held in memory, indexed by frame number.
///
/// The capacity is an explicit limit on how many frames may be materialized;
/// longer inputs are rejected up front instead of exhausting memory midway.
pub struct FrameCache<F> {
    clock: FrameClock,
    space: CoordinateSpace,
    frames: Vec<F>,
}

impl<F> FrameCache<F> {
    pub fn materialize<S>(mut source: S, capacity: usize) -> Result<Self>
    where
        S: FrameSource<Frame = F>,
    {
        let clock = source.clock();
        let space = source.coordinate_space();
        let expected = clock.frame_count();

        if expected > capacity as u64 {
            return Err(Error::CacheCapacityExceeded {
                frames: expected,
                capacity,
            });
        }

        let mut frames = Vec::with_capacity(expected as usize);

        while (frames.len() as u64) < expected {
            let index = frames.len() as u64;
            let (ts, frame) = match source.next_frame()? {
                Some(item) => item,
                None => {
                    return Err(Error::FrameSourceExhausted {
                        expected,
                        got: index,
                    })
                }
            };

            let want = clock.timestamp(index);
            if ts != want {
                return Err(Error::FrameTimestampMismatch {
                    index,
                    expected: want,
                    got: ts,
                });
            }

            frames.push(frame);
        }

        if source.next_frame()?.is_some() {
            return Err(Error::FrameSourceOverrun { expected });
        }

        debug!(frames = frames.len(), fps = clock.fps(), "materialized frame cache");

        Ok(Self {
            clock,
            space,
            frames,
        })
    }

    pub fn from_frames(clock: FrameClock, space: CoordinateSpace, frames: Vec<F>) -> Result<Self> {
        if frames.len() as u64 != clock.frame_count() {
            return Err(Error::FrameCountMismatch {
                expected: clock.frame_count(),
                got: frames.len() as u64,
            });
        }

        Ok(Self {
            clock,
            space,
            frames,
        })
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl<F> FrameStore for FrameCache<F> {
    type Frame = F;

    #[inline]
    fn clock(&self) -> &FrameClock {
        &self.clock
    }

    #[inline]
    fn coordinate_space(&self) -> CoordinateSpace {
        self.space
    }

    fn frame_at(&self, ts: Timestamp) -> Result<&F> {
        self.clock
            .index_of(ts)
            .and_then(|i| self.frames.get(i as usize))
            .ok_or(Error::FrameOutOfRange(ts))
    }
}
