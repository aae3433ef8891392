//! Configuration structures for the figure post-processing pipeline.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main configuration for the figcap pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FigcapConfig {
    /// Scale-aware margin applied around tagged rectangles.
    pub expansion: ExpansionConfig,

    /// Proximity rules for grouping rectangles into figures.
    pub clustering: ClusteringConfig,

    /// Minimum crop size floors.
    pub filter: FilterConfig,

    /// Non-maximum suppression thresholds.
    pub nms: NmsConfig,

    /// Perceptual hash deduplication.
    pub hashing: HashingConfig,

    /// Output text rewriting.
    pub rewrite: RewriteConfig,

    /// Where accepted crops are written.
    pub storage: StorageConfig,
}

/// Margin configuration for [`crate::geometry::RectExpander`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpansionConfig {
    /// Margin as a fraction of the rectangle's pixel size on each axis.
    pub margin_ratio: f64,

    /// Lower clamp for the per-axis margin, in pixels.
    pub min_margin_px: f64,

    /// Upper clamp for the per-axis margin, in pixels.
    pub max_margin_px: f64,
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            margin_ratio: 0.10,
            min_margin_px: 24.0,
            max_margin_px: 120.0,
        }
    }
}

/// Clustering configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringConfig {
    /// Minimum IoU with a member for a rectangle to join a cluster.
    pub min_iou: f64,

    /// Maximum edge gap (normalized units, exclusive) to join a cluster.
    pub max_gap: f64,
}

impl Default for ClusteringConfig {
    fn default() -> Self {
        Self {
            min_iou: 0.05,
            max_gap: 50.0,
        }
    }
}

/// Size floors applied to each cluster's original union.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Minimum width and height, in pixels.
    pub min_side_px: f64,

    /// Minimum area, in square pixels.
    pub min_area_px: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            min_side_px: 48.0,
            min_area_px: 48.0 * 48.0,
        }
    }
}

/// Non-maximum suppression configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NmsConfig {
    /// IoU at or above which a candidate duplicates a kept cluster.
    pub iou_threshold: f64,

    /// Center distance (normalized units) at or below which a candidate duplicates a kept cluster.
    pub center_distance: f64,
}

impl Default for NmsConfig {
    fn default() -> Self {
        Self {
            iou_threshold: 0.85,
            center_distance: 30.0,
        }
    }
}

/// Perceptual hash configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HashingConfig {
    /// Run hash-based deduplication at all.
    pub enabled: bool,

    /// Side length of the downscaled luminance grid.
    pub grid_size: u32,
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            grid_size: 16,
        }
    }
}

/// Text rewriting configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewriteConfig {
    /// Caption used when a tag carries none.
    pub default_caption: String,
}

impl Default for RewriteConfig {
    fn default() -> Self {
        Self {
            default_caption: "Figure".to_string(),
        }
    }
}

/// Blob storage configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory for stored crops (CLI only).
    pub output_dir: PathBuf,

    /// Prefix for generated image keys.
    pub key_prefix: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("figures"),
            key_prefix: "fig".to_string(),
        }
    }
}

impl FigcapConfig {
    /// Load configuration from a JSON file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, std::io::Error> {
        let content = std::fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &std::path::Path) -> Result<(), std::io::Error> {
        let content = serde_json::to_string_pretty(self).map_err(|e| {
            std::io::Error::new(std::io::ErrorKind::InvalidData, e.to_string())
        })?;
        std::fs::write(path, content)
    }
}
