//! Greedy largest-first non-maximum suppression over clusters.

use crate::geometry::{center_distance, intersection_over_union};
use crate::models::config::NmsConfig;

use super::cluster::Cluster;

/// Outcome of suppression.
#[derive(Debug, Clone, Default)]
pub struct Suppression {
    /// Canonical clusters, largest visual union first.
    pub kept: Vec<Cluster>,
    /// Near-duplicates of a kept cluster, in the order they were rejected.
    pub removed: Vec<Cluster>,
}

/// Removes clusters that duplicate a larger kept cluster.
#[derive(Debug, Clone)]
pub struct Deduplicator {
    iou_threshold: f64,
    center_distance: f64,
}

impl Deduplicator {
    /// Create a deduplicator with default thresholds (IoU 0.85, center 30).
    pub fn new() -> Self {
        Self::from_config(&NmsConfig::default())
    }

    /// Create a deduplicator from configuration.
    pub fn from_config(config: &NmsConfig) -> Self {
        Self {
            iou_threshold: config.iou_threshold,
            center_distance: config.center_distance,
        }
    }

    /// Set the IoU threshold.
    pub fn with_iou_threshold(mut self, threshold: f64) -> Self {
        self.iou_threshold = threshold;
        self
    }

    /// Set the center distance threshold.
    pub fn with_center_distance(mut self, distance: f64) -> Self {
        self.center_distance = distance;
        self
    }

    /// Whether `candidate` duplicates `kept`.
    pub fn is_duplicate(&self, candidate: &Cluster, kept: &Cluster) -> bool {
        let a = candidate.visual_union();
        let b = kept.visual_union();
        intersection_over_union(a, b) >= self.iou_threshold
            || center_distance(a, b) <= self.center_distance
    }

    /// Partition clusters into kept and removed.
    ///
    /// Clusters are visited by visual-union area, descending. The sort is
    /// stable, so equal areas keep their input order.
    pub fn suppress(&self, mut clusters: Vec<Cluster>) -> Suppression {
        clusters.sort_by(|a, b| {
            b.visual_union()
                .area()
                .partial_cmp(&a.visual_union().area())
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut result = Suppression::default();

        for candidate in clusters {
            let duplicate = result
                .kept
                .iter()
                .any(|kept| self.is_duplicate(&candidate, kept));

            if duplicate {
                result.removed.push(candidate);
            } else {
                result.kept.push(candidate);
            }
        }

        result
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new()
    }
}
