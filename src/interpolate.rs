use std::ops::Bound;

use crate::bbox::{BBox, Ltrb};
use crate::fusion::MergedTrajectory;
use crate::timestamp::{FrameClock, Timestamp};

impl MergedTrajectory {
    /// Box at any time `t_ms` between the first and last known timestamps,
    /// blended linearly from the two known boxes around it. Never
    /// extrapolates.
    pub fn interpolate(&self, t_ms: f64) -> Option<BBox<Ltrb>> {
        let first = self.first()?.as_millis() as f64;
        let last = self.last()?.as_millis() as f64;

        if !t_ms.is_finite() || t_ms < first || t_ms > last {
            return None;
        }

        let floor = Timestamp(t_ms.floor() as u64);
        let (t0, b0) = self.boxes.range(..=floor).next_back()?;

        if t0.as_millis() as f64 == t_ms {
            return Some(*b0);
        }

        let (t1, b1) = self
            .boxes
            .range((Bound::Excluded(*t0), Bound::Unbounded))
            .next()?;

        let span = (t1.as_millis() - t0.as_millis()) as f64;
        let factor = (t_ms - t0.as_millis() as f64) / span;

        Some(b0.lerp(b1, factor as f32))
    }

    /// One entry per frame of the video, for overlay rendering. Frames
    /// outside the known range stay `None`.
    pub fn render(&self, clock: &FrameClock) -> Vec<(Timestamp, Option<BBox<Ltrb>>)> {
        clock
            .timestamps()
            .map(|ts| {
                let bbox = match self.get(ts) {
                    Some(b) => Some(*b),
                    None => self.interpolate(ts.as_millis() as f64),
                };
                (ts, bbox)
            })
            .collect()
    }
}
