use nalgebra as na;
use serde_derive::{Deserialize, Serialize};
use std::marker::PhantomData;

pub trait BBoxFormat: std::fmt::Debug + Copy + PartialEq {}

/// Left-top-right-bottom format, contains left top and right bottom corners
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct Ltrb;
impl BBoxFormat for Ltrb {}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(transparent, bound = "")]
pub struct BBox<F: BBoxFormat> {
    coords: [f32; 4],
    format: PhantomData<F>,
}

impl<F: BBoxFormat> BBox<F> {
    // Use carefully when you REALLY sure that slice have needed format
    #[inline(always)]
    pub fn assigned(slice: &[f32; 4]) -> Self {
        BBox {
            coords: *slice,
            format: PhantomData,
        }
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.coords.iter().all(|c| c.is_finite())
    }
}

impl BBox<Ltrb> {
    #[inline]
    pub fn ltrb(left: f32, top: f32, right: f32, bottom: f32) -> Self {
        Self::assigned(&[left, top, right, bottom])
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.coords[0]
    }

    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.coords[1]
    }

    #[inline(always)]
    pub fn right(&self) -> f32 {
        self.coords[2]
    }

    #[inline(always)]
    pub fn bottom(&self) -> f32 {
        self.coords[3]
    }

    /// Coordinate-wise linear blend, `factor` 0 gives `self`, 1 gives `other`.
    #[inline]
    pub fn lerp(&self, other: &BBox<Ltrb>, factor: f32) -> BBox<Ltrb> {
        let a = na::Vector4::from(self.coords);
        let b = na::Vector4::from(other.coords);
        let c = a.lerp(&b, factor);

        BBox::ltrb(c[0], c[1], c[2], c[3])
    }
}

/// The space every box of one pipeline run is expressed in.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CoordinateSpace {
    /// Absolute pixels of a `width` x `height` frame
    Pixels { width: u32, height: u32 },
    /// Fractions of frame width/height, `[0, 1]` on both axes
    Normalized,
}

impl CoordinateSpace {
    pub fn contains(&self, bbox: &BBox<Ltrb>) -> bool {
        let (w, h) = match *self {
            CoordinateSpace::Pixels { width, height } => (width as f32, height as f32),
            CoordinateSpace::Normalized => (1.0, 1.0),
        };

        bbox.is_finite()
            && bbox.left() <= bbox.right()
            && bbox.top() <= bbox.bottom()
            && bbox.left() >= 0.0
            && bbox.top() >= 0.0
            && bbox.right() <= w
            && bbox.bottom() <= h
    }
}
