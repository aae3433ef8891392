//! Grouping of expanded rectangles into figure clusters.

use serde::Serialize;

use crate::geometry::{enclose, gap_distance, intersection_over_union, ExpandedRect, Rect};
use crate::models::config::ClusteringConfig;

/// A non-empty group of rectangles believed to depict one figure.
#[derive(Debug, Clone, Serialize)]
pub struct Cluster {
    members: Vec<ExpandedRect>,
    /// Position in `members` of the earliest tag.
    primary: usize,
    visual_union: Rect,
    union: Rect,
}

impl Cluster {
    /// Start a cluster from a single rectangle.
    pub fn new(seed: ExpandedRect) -> Self {
        Self {
            visual_union: seed.visual.clone(),
            union: seed.original.clone(),
            primary: 0,
            members: vec![seed],
        }
    }

    /// Add a rectangle and grow both unions.
    pub fn push(&mut self, member: ExpandedRect) {
        self.visual_union = enclose(&self.visual_union, &member.visual);
        self.union = enclose(&self.union, &member.original);
        if member.tag_index < self.members[self.primary].tag_index {
            self.primary = self.members.len();
        }
        self.members.push(member);
    }

    /// Members in join order.
    pub fn members(&self) -> &[ExpandedRect] {
        &self.members
    }

    /// Number of member rectangles.
    pub fn len(&self) -> usize {
        self.members.len()
    }

    /// Always false; clusters are never empty.
    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Union of the expanded footprints.
    pub fn visual_union(&self) -> &Rect {
        &self.visual_union
    }

    /// Union of the original rectangles, used for cropping.
    pub fn union(&self) -> &Rect {
        &self.union
    }

    /// Original rectangles in source order.
    pub fn original_tags(&self) -> Vec<&Rect> {
        let mut members: Vec<&ExpandedRect> = self.members.iter().collect();
        members.sort_by_key(|m| m.tag_index);
        members.into_iter().map(|m| &m.original).collect()
    }

    /// Tag indices in source order.
    pub fn tag_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = self.members.iter().map(|m| m.tag_index).collect();
        indices.sort_unstable();
        indices
    }

    /// The member appearing first in the source text.
    pub fn primary(&self) -> &ExpandedRect {
        &self.members[self.primary]
    }

    /// Caption of the primary tag.
    pub fn caption(&self) -> &str {
        &self.primary().original.desc
    }
}

/// Connected-component clustering over expanded footprints.
#[derive(Debug, Clone)]
pub struct Clusterer {
    min_iou: f64,
    max_gap: f64,
}

impl Clusterer {
    /// Create a clusterer with default thresholds (IoU 0.05, gap 50).
    pub fn new() -> Self {
        Self::from_config(&ClusteringConfig::default())
    }

    /// Create a clusterer from configuration.
    pub fn from_config(config: &ClusteringConfig) -> Self {
        Self {
            min_iou: config.min_iou,
            max_gap: config.max_gap,
        }
    }

    /// Set the minimum IoU for joining.
    pub fn with_min_iou(mut self, min_iou: f64) -> Self {
        self.min_iou = min_iou;
        self
    }

    /// Set the maximum edge gap for joining.
    pub fn with_max_gap(mut self, max_gap: f64) -> Self {
        self.max_gap = max_gap;
        self
    }

    /// Whether two expanded footprints belong together.
    pub fn joins(&self, a: &Rect, b: &Rect) -> bool {
        intersection_over_union(a, b) >= self.min_iou || gap_distance(a, b) < self.max_gap
    }

    /// Partition `rects` into clusters.
    ///
    /// Each cluster is seeded with the first unassigned rectangle and grown to
    /// a fixed point: a rectangle joins when it touches any current member, so
    /// chains of neighbours end up together regardless of input order.
    /// Clusters are returned in the order of their seeds.
    pub fn cluster(&self, rects: Vec<ExpandedRect>) -> Vec<Cluster> {
        let mut pending: Vec<Option<ExpandedRect>> = rects.into_iter().map(Some).collect();
        let mut clusters = Vec::new();

        for i in 0..pending.len() {
            let Some(seed) = pending[i].take() else {
                continue;
            };
            let mut cluster = Cluster::new(seed);

            loop {
                let mut grew = false;

                for slot in pending.iter_mut().skip(i + 1) {
                    let joins = match slot {
                        Some(candidate) => cluster
                            .members()
                            .iter()
                            .any(|m| self.joins(&candidate.visual, &m.visual)),
                        None => false,
                    };

                    if joins {
                        if let Some(candidate) = slot.take() {
                            cluster.push(candidate);
                            grew = true;
                        }
                    }
                }

                if !grew {
                    break;
                }
            }

            clusters.push(cluster);
        }

        clusters
    }
}

impl Default for Clusterer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::RectExpander;
    use pretty_assertions::assert_eq;

    fn raw(index: usize, ymin: f64, xmin: f64, ymax: f64, xmax: f64) -> ExpandedRect {
        let rect = Rect::new(ymin, xmin, ymax, xmax).with_label(format!("tag{}", index), "Fig");
        ExpandedRect {
            visual: rect.clone(),
            original: rect,
            tag_index: index,
        }
    }

    #[test]
    fn test_overlapping_merge() {
        let clusters = Clusterer::new().cluster(vec![
            raw(0, 0.0, 0.0, 100.0, 100.0),
            raw(1, 50.0, 50.0, 150.0, 150.0),
        ]);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].tag_indices(), vec![0, 1]);
    }

    #[test]
    fn test_gap_threshold_is_exclusive() {
        let near = Clusterer::new().cluster(vec![
            raw(0, 0.0, 0.0, 100.0, 100.0),
            raw(1, 0.0, 149.0, 100.0, 200.0),
        ]);
        assert_eq!(near.len(), 1);

        let far = Clusterer::new().cluster(vec![
            raw(0, 0.0, 0.0, 100.0, 100.0),
            raw(1, 0.0, 150.0, 100.0, 200.0),
        ]);
        assert_eq!(far.len(), 2);
    }

    #[test]
    fn test_chain_needs_fixed_point() {
        // 2 only reaches 0 through 1, and 1 comes after 2 in the input
        let clusters = Clusterer::new().cluster(vec![
            raw(0, 0.0, 0.0, 100.0, 100.0),
            raw(1, 0.0, 280.0, 100.0, 380.0),
            raw(2, 0.0, 140.0, 100.0, 240.0),
        ]);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].tag_indices(), vec![0, 1, 2]);
    }

    #[test]
    fn test_partition_property() {
        let rects = vec![
            raw(0, 0.0, 0.0, 100.0, 100.0),
            raw(1, 500.0, 500.0, 600.0, 600.0),
            raw(2, 20.0, 20.0, 80.0, 120.0),
            raw(3, 900.0, 0.0, 1000.0, 50.0),
            raw(4, 550.0, 610.0, 650.0, 700.0),
        ];
        let n = rects.len();
        let clusters = Clusterer::new().cluster(rects);

        let total: usize = clusters.iter().map(Cluster::len).sum();
        assert_eq!(total, n);

        let mut seen: Vec<usize> = clusters.iter().flat_map(|c| c.tag_indices()).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert_eq!(clusters.len(), 3);
    }

    #[test]
    fn test_unions() {
        let expander = RectExpander::new();
        let a = expander.expand(Rect::new(100.0, 100.0, 200.0, 200.0).with_label("a", "Circuit A"), 0, 800, 800);
        let b = expander.expand(Rect::new(105.0, 210.0, 205.0, 310.0).with_label("b", "Circuit A"), 1, 800, 800);

        let clusters = Clusterer::new().cluster(vec![a, b]);
        assert_eq!(clusters.len(), 1);

        let cluster = &clusters[0];
        let u = cluster.union();
        assert_eq!((u.ymin, u.xmin, u.ymax, u.xmax), (100.0, 100.0, 205.0, 310.0));
        assert!(cluster.visual_union().contains(u));
        assert_eq!(cluster.caption(), "Circuit A");
        assert_eq!(cluster.original_tags()[1].full_tag, "b");
    }

    #[test]
    fn test_primary_is_earliest_tag() {
        let mut cluster = Cluster::new(raw(3, 0.0, 0.0, 100.0, 100.0));
        cluster.push(raw(5, 10.0, 10.0, 110.0, 110.0));
        assert_eq!(cluster.primary().tag_index, 3);

        cluster.push(raw(1, 20.0, 20.0, 120.0, 120.0));
        assert_eq!(cluster.primary().tag_index, 1);
        assert_eq!(cluster.caption(), "Fig");
        assert_eq!(cluster.tag_indices(), vec![1, 3, 5]);
    }

    #[test]
    fn test_empty_input() {
        assert!(Clusterer::new().cluster(Vec::new()).is_empty());
    }
}
