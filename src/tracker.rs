use crate::bbox::{BBox, CoordinateSpace, Ltrb};
use crate::error::TrackerFailure;

/// Short-horizon visual tracker, seeded with a box and advanced one frame at
/// a time. Its internals are opaque; only success and the returned box are
/// observed.
///
/// Methods take `&self` so one tracker can serve both propagation directions
/// at once; per-run state lives in the handle.
pub trait VisualTracker<Frame> {
    type Handle;

    /// Space of the boxes it accepts and returns.
    fn coordinate_space(&self) -> CoordinateSpace;

    fn init(&self, frame: &Frame, bbox: &BBox<Ltrb>) -> Result<Self::Handle, TrackerFailure>;

    fn update(&self, handle: &mut Self::Handle, frame: &Frame) -> Result<BBox<Ltrb>, TrackerFailure>;
}
