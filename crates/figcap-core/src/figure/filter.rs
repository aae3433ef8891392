//! Minimum-size floors for figure clusters.

use crate::geometry::Rect;
use crate::models::config::FilterConfig;

use super::cluster::Cluster;

/// Drops clusters too small to be real figures.
#[derive(Debug, Clone)]
pub struct SizeFilter {
    min_side_px: f64,
    min_area_px: f64,
}

impl SizeFilter {
    /// Create a filter with the default 48 px floors.
    pub fn new() -> Self {
        Self::from_config(&FilterConfig::default())
    }

    /// Create a filter from configuration.
    pub fn from_config(config: &FilterConfig) -> Self {
        Self {
            min_side_px: config.min_side_px,
            min_area_px: config.min_area_px,
        }
    }

    /// Set the minimum side length in pixels.
    pub fn with_min_side(mut self, px: f64) -> Self {
        self.min_side_px = px;
        self
    }

    /// Set the minimum area in square pixels.
    pub fn with_min_area(mut self, px: f64) -> Self {
        self.min_area_px = px;
        self
    }

    /// Whether `rect` meets every floor on an image of the given size.
    ///
    /// Inverted rectangles have negative pixel sizes and always fail.
    pub fn passes_floors(&self, rect: &Rect, image_width: u32, image_height: u32) -> bool {
        let (width, height) = rect.pixel_size(image_width, image_height);
        width >= self.min_side_px && height >= self.min_side_px && width * height >= self.min_area_px
    }

    /// Split clusters into (passed, dropped) by their original union.
    pub fn partition(
        &self,
        clusters: Vec<Cluster>,
        image_width: u32,
        image_height: u32,
    ) -> (Vec<Cluster>, Vec<Cluster>) {
        clusters
            .into_iter()
            .partition(|c| self.passes_floors(c.union(), image_width, image_height))
    }
}

impl Default for SizeFilter {
    fn default() -> Self {
        Self::new()
    }
}
