//! Rectangle primitives in the OCR model's normalized 0-1000 coordinate space.
//!
//! All functions here are pure. Inverted or zero-area rectangles are accepted:
//! widths, heights and intersections clamp at zero so [`Rect::area`] is never
//! negative and degenerate input simply stops overlapping anything.

mod expand;

pub use expand::{ExpandedRect, PixelBox, RectExpander};

use serde::{Deserialize, Serialize};

use crate::error::GeometryError;

/// Side length of the normalized coordinate space.
pub const NORMALIZED_SCALE: f64 = 1000.0;

/// A tagged rectangle in normalized coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub ymin: f64,
    pub xmin: f64,
    pub ymax: f64,
    pub xmax: f64,
    /// Source text this rectangle was parsed from.
    pub full_tag: String,
    /// Caption parsed alongside the coordinates.
    pub desc: String,
}

impl Rect {
    /// Create an unlabeled rectangle.
    pub fn new(ymin: f64, xmin: f64, ymax: f64, xmax: f64) -> Self {
        Self {
            ymin,
            xmin,
            ymax,
            xmax,
            full_tag: String::new(),
            desc: String::new(),
        }
    }

    /// Attach the source tag and caption.
    pub fn with_label(mut self, full_tag: impl Into<String>, desc: impl Into<String>) -> Self {
        self.full_tag = full_tag.into();
        self.desc = desc.into();
        self
    }

    /// Copy of this rectangle's label with new bounds.
    pub fn with_bounds(&self, ymin: f64, xmin: f64, ymax: f64, xmax: f64) -> Self {
        Self {
            ymin,
            xmin,
            ymax,
            xmax,
            full_tag: self.full_tag.clone(),
            desc: self.desc.clone(),
        }
    }

    /// Signed width; negative for inverted input.
    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    /// Signed height; negative for inverted input.
    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }

    /// Area with both sides clamped at zero. Always `>= 0`.
    pub fn area(&self) -> f64 {
        self.width().max(0.0) * self.height().max(0.0)
    }

    /// Center point as (x, y).
    pub fn center(&self) -> (f64, f64) {
        ((self.xmin + self.xmax) / 2.0, (self.ymin + self.ymax) / 2.0)
    }

    /// True if either side is zero or negative.
    pub fn is_degenerate(&self) -> bool {
        self.width() <= 0.0 || self.height() <= 0.0
    }

    /// True if `other` lies within this rectangle's bounds.
    pub fn contains(&self, other: &Rect) -> bool {
        self.xmin <= other.xmin
            && self.ymin <= other.ymin
            && self.xmax >= other.xmax
            && self.ymax >= other.ymax
    }

    /// Size in pixels for an image of the given dimensions, as (width, height).
    pub fn pixel_size(&self, image_width: u32, image_height: u32) -> (f64, f64) {
        (
            self.width() * image_width as f64 / NORMALIZED_SCALE,
            self.height() * image_height as f64 / NORMALIZED_SCALE,
        )
    }
}

/// Intersection over union of two rectangles, in `[0, 1]`.
pub fn intersection_over_union(a: &Rect, b: &Rect) -> f64 {
    let iw = (a.xmax.min(b.xmax) - a.xmin.max(b.xmin)).max(0.0);
    let ih = (a.ymax.min(b.ymax) - a.ymin.max(b.ymin)).max(0.0);
    let intersection = iw * ih;
    let union = a.area() + b.area() - intersection;

    if union > 0.0 {
        (intersection / union).clamp(0.0, 1.0)
    } else {
        0.0
    }
}

/// Euclidean distance between rectangle centers.
pub fn center_distance(a: &Rect, b: &Rect) -> f64 {
    let (ax, ay) = a.center();
    let (bx, by) = b.center();
    ((ax - bx).powi(2) + (ay - by).powi(2)).sqrt()
}

/// Distance between the nearest edges of two rectangles.
///
/// Each axis contributes the gap between the projections, or zero where the
/// projections overlap or touch; the result is zero for overlapping or
/// touching rectangles.
pub fn gap_distance(a: &Rect, b: &Rect) -> f64 {
    let dx = (a.xmin.max(b.xmin) - a.xmax.min(b.xmax)).max(0.0);
    let dy = (a.ymin.max(b.ymin) - a.ymax.min(b.ymax)).max(0.0);
    (dx * dx + dy * dy).sqrt()
}

/// Minimal rectangle enclosing every input.
///
/// The label of the first rectangle is carried over; only the geometry of the
/// result is meaningful.
pub fn union(rects: &[Rect]) -> Result<Rect, GeometryError> {
    let (first, rest) = rects.split_first().ok_or(GeometryError::EmptyInput)?;
    Ok(rest.iter().fold(first.clone(), |acc, r| enclose(&acc, r)))
}

/// Union of two rectangles, keeping the label of `a`.
pub(crate) fn enclose(a: &Rect, b: &Rect) -> Rect {
    a.with_bounds(
        a.ymin.min(b.ymin),
        a.xmin.min(b.xmin),
        a.ymax.max(b.ymax),
        a.xmax.max(b.xmax),
    )
}
