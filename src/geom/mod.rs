//! Integer rectangle geometry used by window enumeration and overlap
//! filtering.
//!
//! All coordinates are pixel units. Rectangles are stored as top-left corner
//! plus extent; the right/bottom edges are exclusive (`x + width`,
//! `y + height`). Areas are computed in `u64` so that intersection and union
//! of large images cannot overflow.

use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle in pixel coordinates.
///
/// Enumeration only ever produces rectangles with positive extent; the type
/// itself does not forbid zero extent so that degenerate values coming from
/// an untrusted snapshot can be represented and then rejected by validation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Rect {
    /// Creates a new rectangle from its top-left corner and extent.
    #[inline]
    pub fn new(x: u32, y: u32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Returns the exclusive right edge (`x + width`).
    #[inline]
    pub fn right(&self) -> u64 {
        self.x as u64 + self.width as u64
    }

    /// Returns the exclusive bottom edge (`y + height`).
    #[inline]
    pub fn bottom(&self) -> u64 {
        self.y as u64 + self.height as u64
    }

    /// Returns the area in square pixels.
    #[inline]
    pub fn area(&self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Returns true if both extents are positive.
    #[inline]
    pub fn has_area(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    /// Returns true if the rectangle lies entirely inside an image of the
    /// given dimensions.
    #[inline]
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.right() <= width as u64 && self.bottom() <= height as u64
    }

    /// Returns the area of the intersection with `other`, or 0 when the
    /// rectangles are disjoint.
    pub fn intersection_area(&self, other: &Rect) -> u64 {
        let x1 = self.x.max(other.x) as u64;
        let y1 = self.y.max(other.y) as u64;
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());
        if x2 > x1 && y2 > y1 {
            (x2 - x1) * (y2 - y1)
        } else {
            0
        }
    }

    /// Returns the area of the union with `other`.
    pub fn union_area(&self, other: &Rect) -> u64 {
        self.area() + other.area() - self.intersection_area(other)
    }

    /// Returns intersection-over-union with `other`.
    ///
    /// A zero-area union yields 0.0 rather than dividing by zero; callers
    /// that filter on a threshold must treat that case as a rejection.
    pub fn iou(&self, other: &Rect) -> f64 {
        let union = self.union_area(other);
        if union == 0 {
            return 0.0;
        }
        self.intersection_area(other) as f64 / union as f64
    }
}

/// A width/height pair in pixels.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    /// Creates a new size.
    #[inline]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns true if both dimensions are positive.
    #[inline]
    pub fn has_area(&self) -> bool {
        self.width > 0 && self.height > 0
    }
}

impl std::fmt::Display for Size {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}
