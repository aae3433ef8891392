//! Scale-aware margin expansion.
//!
//! The expanded footprint only drives clustering and suppression. Crops are
//! taken from the original union with a fresh margin computed by the same
//! expander, never from an already-expanded box.

use serde::{Deserialize, Serialize};

use super::{Rect, NORMALIZED_SCALE};
use crate::models::config::ExpansionConfig;

/// A rectangle with its clustering footprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpandedRect {
    /// Margin-expanded footprint used for clustering and NMS.
    pub visual: Rect,
    /// The rectangle as parsed.
    pub original: Rect,
    /// Position of the source tag in parse order.
    pub tag_index: usize,
}

/// Integer pixel box, clamped to the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Computes per-axis margins of `ratio * size`, clamped to `[min, max]` pixels.
#[derive(Debug, Clone)]
pub struct RectExpander {
    margin_ratio: f64,
    min_margin_px: f64,
    max_margin_px: f64,
}

impl RectExpander {
    /// Create an expander with default margins (10%, 24..120 px).
    pub fn new() -> Self {
        Self::from_config(&ExpansionConfig::default())
    }

    /// Create an expander from configuration.
    pub fn from_config(config: &ExpansionConfig) -> Self {
        Self {
            margin_ratio: config.margin_ratio,
            min_margin_px: config.min_margin_px,
            max_margin_px: config.max_margin_px,
        }
    }

    /// Set the margin ratio.
    pub fn with_margin_ratio(mut self, ratio: f64) -> Self {
        self.margin_ratio = ratio;
        self
    }

    /// Set the margin clamp range in pixels.
    pub fn with_margin_bounds(mut self, min_px: f64, max_px: f64) -> Self {
        self.min_margin_px = min_px;
        self.max_margin_px = max_px;
        self
    }

    /// Margin for an axis of the given pixel size.
    pub fn margin(&self, size_px: f64) -> f64 {
        (size_px * self.margin_ratio)
            .max(self.min_margin_px)
            .min(self.max_margin_px)
    }

    /// Derive the clustering footprint of a parsed rectangle.
    pub fn expand(
        &self,
        rect: Rect,
        tag_index: usize,
        image_width: u32,
        image_height: u32,
    ) -> ExpandedRect {
        ExpandedRect {
            visual: self.expand_rect(&rect, image_width, image_height),
            original: rect,
            tag_index,
        }
    }

    /// Expand `rect` by the scale-aware margin, clamped to the image.
    ///
    /// Returns the input unchanged for an empty image.
    pub fn expand_rect(&self, rect: &Rect, image_width: u32, image_height: u32) -> Rect {
        if image_width == 0 || image_height == 0 {
            return rect.clone();
        }

        let (x0, x1) = self.expand_axis(rect.xmin, rect.xmax, image_width);
        let (y0, y1) = self.expand_axis(rect.ymin, rect.ymax, image_height);

        rect.with_bounds(y0, x0, y1, x1)
    }

    /// Pixel crop box for `rect` with the margin re-applied.
    ///
    /// Returns `None` when the clamped box has no area.
    pub fn crop_box(&self, rect: &Rect, image_width: u32, image_height: u32) -> Option<PixelBox> {
        if image_width == 0 || image_height == 0 {
            return None;
        }

        let w = image_width as f64;
        let h = image_height as f64;

        let (x0, x1) = self.pixel_axis(rect.xmin, rect.xmax, image_width);
        let (y0, y1) = self.pixel_axis(rect.ymin, rect.ymax, image_height);

        let x0 = x0.floor().clamp(0.0, w) as u32;
        let y0 = y0.floor().clamp(0.0, h) as u32;
        let x1 = x1.ceil().clamp(0.0, w) as u32;
        let y1 = y1.ceil().clamp(0.0, h) as u32;

        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        Some(PixelBox {
            x: x0,
            y: y0,
            width: x1 - x0,
            height: y1 - y0,
        })
    }

    /// Expanded bounds of one axis in pixels, clamped to `[0, dim]`.
    fn pixel_axis(&self, min: f64, max: f64, dim: u32) -> (f64, f64) {
        let limit = dim as f64;
        let lo = min * limit / NORMALIZED_SCALE;
        let hi = max * limit / NORMALIZED_SCALE;
        let margin = self.margin(hi - lo);

        ((lo - margin).clamp(0.0, limit), (hi + margin).clamp(0.0, limit))
    }

    fn expand_axis(&self, min: f64, max: f64, dim: u32) -> (f64, f64) {
        let (lo, hi) = self.pixel_axis(min, max, dim);
        let limit = dim as f64;
        (lo * NORMALIZED_SCALE / limit, hi * NORMALIZED_SCALE / limit)
    }
}

impl Default for RectExpander {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_margin_clamped() {
        let expander = RectExpander::new();
        assert_eq!(expander.margin(50.0), 24.0);
        assert_eq!(expander.margin(500.0), 50.0);
        assert_eq!(expander.margin(5000.0), 120.0);
        // Inverted input still gets the minimum
        assert_eq!(expander.margin(-80.0), 24.0);
    }

    #[test]
    fn test_expand_small_rect() {
        // 800x800 image: [100,100,200,200] is 80x80 px, margin 24 px = 30 units
        let expander = RectExpander::new();
        let rect = Rect::new(100.0, 100.0, 200.0, 200.0);
        let expanded = expander.expand(rect.clone(), 0, 800, 800);

        assert!(approx(expanded.visual.xmin, 70.0));
        assert!(approx(expanded.visual.xmax, 230.0));
        assert!(approx(expanded.visual.ymin, 70.0));
        assert!(approx(expanded.visual.ymax, 230.0));
        assert_eq!(expanded.original, rect);
    }

    #[test]
    fn test_expand_contains_original() {
        let expander = RectExpander::new();
        let rects = [
            Rect::new(0.0, 0.0, 1000.0, 1000.0),
            Rect::new(10.0, 990.0, 20.0, 1000.0),
            Rect::new(400.0, 100.0, 600.0, 900.0),
        ];

        for rect in rects {
            let expanded = expander.expand_rect(&rect, 1200, 900);
            assert!(expanded.contains(&rect), "{:?} !⊇ {:?}", expanded, rect);
        }
    }

    #[test]
    fn test_expand_clamps_at_edges() {
        let expander = RectExpander::new();
        let rect = Rect::new(0.0, 0.0, 100.0, 1000.0);
        let expanded = expander.expand_rect(&rect, 1000, 1000);

        assert_eq!(expanded.ymin, 0.0);
        assert_eq!(expanded.xmin, 0.0);
        assert_eq!(expanded.xmax, 1000.0);
        // 100 px tall, margin clamps to 24 px
        assert!(approx(expanded.ymax, 124.0));
    }

    #[test]
    fn test_large_rect_margin_capped() {
        // 4000 px wide image, rect spans 2000 px: 10% = 200, capped at 120
        let expander = RectExpander::new();
        let rect = Rect::new(250.0, 250.0, 750.0, 750.0);
        let expanded = expander.expand_rect(&rect, 4000, 4000);
        assert!(approx(expanded.xmin, 250.0 - 30.0));
        assert!(approx(expanded.xmax, 750.0 + 30.0));
    }

    #[test]
    fn test_crop_box() {
        let expander = RectExpander::new();
        let rect = Rect::new(100.0, 100.0, 300.0, 300.0);
        let crop = expander.crop_box(&rect, 1000, 1000).unwrap();
        assert_eq!(
            crop,
            PixelBox {
                x: 76,
                y: 76,
                width: 248,
                height: 248,
            }
        );
    }

    #[test]
    fn test_crop_box_empty_image() {
        let expander = RectExpander::new();
        let rect = Rect::new(100.0, 100.0, 300.0, 300.0);
        assert_eq!(expander.crop_box(&rect, 0, 100), None);
    }

    #[test]
    fn test_custom_margins() {
        let expander = RectExpander::new()
            .with_margin_ratio(0.0)
            .with_margin_bounds(0.0, 0.0);
        let rect = Rect::new(100.0, 100.0, 300.0, 300.0);
        assert_eq!(expander.expand_rect(&rect, 500, 500), rect);
    }
}
