//! Per-image orchestration of the figure post-processing stages.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{FigcapError, FigureError};
use crate::geometry::{Rect, RectExpander};
use crate::models::config::FigcapConfig;

use super::cluster::{Cluster, Clusterer};
use super::filter::SizeFilter;
use super::hash::{PerceptualHasher, SeenHashes};
use super::nms::Deduplicator;
use super::raster::RasterSource;
use super::rewrite::{fallback_caption, rewrite, TagDecision};
use super::store::{BlobStore, KeyGenerator};
use super::tags::{CropTag, CropTagParser};

/// Terminal state of one parsed tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagFate {
    /// Replaced with the figure reference.
    KeptPrimary,
    /// Deleted; its cluster is referenced by another tag.
    KeptSecondary,
    /// Cluster below the size floors.
    SizeFiltered,
    /// Cluster suppressed by a larger overlapping cluster.
    NmsRemoved,
    /// Crop matched an already stored figure.
    HashDuplicate,
    /// Crop or store failed; a caption placeholder was written instead.
    CropFailed,
}

/// Per-tag report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagReport {
    pub index: usize,
    pub full_tag: String,
    pub caption: String,
    pub fate: TagFate,
}

/// A crop that was stored and referenced from the output text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFigure {
    pub image_id: String,
    pub caption: String,
    /// Original union the crop was cut from.
    pub rect: Rect,
    /// Perceptual hash, absent if hashing failed or is disabled.
    pub hash: Option<String>,
}

/// Result of processing one image's OCR text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageOutcome {
    /// Rewritten text.
    pub text: String,
    /// Stored figures, largest first.
    pub figures: Vec<StoredFigure>,
    /// Fate of every parsed tag, in source order.
    pub tags: Vec<TagReport>,
}

impl PageOutcome {
    /// Number of tags that ended without a figure reference.
    pub fn discarded(&self) -> usize {
        self.tags
            .iter()
            .filter(|t| !matches!(t.fate, TagFate::KeptPrimary | TagFate::KeptSecondary))
            .count()
    }
}

/// Crop bytes plus their hash (if hashing succeeded).
type CropResult = Result<(Vec<u8>, Option<String>), FigureError>;

/// Figure extraction pipeline for annotated OCR output.
#[derive(Debug, Clone)]
pub struct FigurePipeline {
    parser: CropTagParser,
    expander: RectExpander,
    clusterer: Clusterer,
    size_filter: SizeFilter,
    deduplicator: Deduplicator,
    hasher: Option<PerceptualHasher>,
}

impl FigurePipeline {
    /// Create a pipeline with default settings.
    pub fn new() -> Self {
        Self::from_config(&FigcapConfig::default())
    }

    /// Create a pipeline from configuration.
    pub fn from_config(config: &FigcapConfig) -> Self {
        Self {
            parser: CropTagParser::new().with_default_caption(&config.rewrite.default_caption),
            expander: RectExpander::from_config(&config.expansion),
            clusterer: Clusterer::from_config(&config.clustering),
            size_filter: SizeFilter::from_config(&config.filter),
            deduplicator: Deduplicator::from_config(&config.nms),
            hasher: config
                .hashing
                .enabled
                .then(|| PerceptualHasher::from_config(&config.hashing)),
        }
    }

    /// Replace the expander.
    pub fn with_expander(mut self, expander: RectExpander) -> Self {
        self.expander = expander;
        self
    }

    /// Replace the clusterer.
    pub fn with_clusterer(mut self, clusterer: Clusterer) -> Self {
        self.clusterer = clusterer;
        self
    }

    /// Replace the size filter.
    pub fn with_size_filter(mut self, size_filter: SizeFilter) -> Self {
        self.size_filter = size_filter;
        self
    }

    /// Replace the deduplicator.
    pub fn with_deduplicator(mut self, deduplicator: Deduplicator) -> Self {
        self.deduplicator = deduplicator;
        self
    }

    /// Replace or disable the perceptual hasher.
    pub fn with_hasher(mut self, hasher: Option<PerceptualHasher>) -> Self {
        self.hasher = hasher;
        self
    }

    /// Parse crop tags with this pipeline's default caption.
    pub fn parse_tags(&self, text: &str) -> Vec<CropTag> {
        self.parser.parse(text)
    }

    /// Process one image's annotated OCR text.
    ///
    /// Accepted crops are written to `store` under keys from `keys`. Crop,
    /// hash and store failures are contained to their cluster. The hash set
    /// is local to this call.
    pub fn process<S, B, K>(
        &self,
        text: &str,
        raster: &S,
        store: &mut B,
        keys: &mut K,
    ) -> Result<PageOutcome, FigcapError>
    where
        S: RasterSource + ?Sized,
        B: BlobStore + ?Sized,
        K: KeyGenerator + ?Sized,
    {
        let tags = self.parser.parse(text);
        if tags.is_empty() {
            return Ok(PageOutcome {
                text: text.to_string(),
                figures: Vec::new(),
                tags: Vec::new(),
            });
        }

        let (width, height) = raster.dimensions();
        if width == 0 || height == 0 {
            return Err(FigureError::InvalidDimensions { width, height }.into());
        }

        debug!("Parsed {} crop tags on {}x{} image", tags.len(), width, height);

        let expanded = tags
            .iter()
            .map(|t| self.expander.expand(t.rect.clone(), t.index, width, height))
            .collect();
        let clusters = self.clusterer.cluster(expanded);
        debug!("Formed {} clusters", clusters.len());

        let mut fates: BTreeMap<usize, TagFate> = BTreeMap::new();
        let mut decisions: BTreeMap<usize, TagDecision> = BTreeMap::new();

        let (passed, too_small) = self.size_filter.partition(clusters, width, height);
        for cluster in &too_small {
            discard(cluster, TagFate::SizeFiltered, &mut fates, &mut decisions);
        }

        let suppression = self.deduplicator.suppress(passed);
        for cluster in &suppression.removed {
            discard(cluster, TagFate::NmsRemoved, &mut fates, &mut decisions);
        }

        debug!(
            "{} size-filtered, {} suppressed, {} kept",
            too_small.len(),
            suppression.removed.len(),
            suppression.kept.len()
        );

        let crops = self.crop_all(&suppression.kept, raster);

        let mut seen = SeenHashes::new();
        let mut figures = Vec::new();

        for (cluster, crop) in suppression.kept.iter().zip(crops) {
            let caption = cluster.caption().to_string();

            let (bytes, hash) = match crop {
                Ok(crop) => crop,
                Err(e) => {
                    warn!("Crop failed for '{}': {}", caption, e);
                    fall_back(cluster, &caption, &mut fates, &mut decisions);
                    continue;
                }
            };

            if let Some(hash) = &hash {
                if seen.contains(hash) {
                    debug!("Dropping '{}' as duplicate of an earlier figure", caption);
                    discard(cluster, TagFate::HashDuplicate, &mut fates, &mut decisions);
                    continue;
                }
            }

            let image_id = keys.next_key();
            if let Err(e) = store.put(&image_id, &bytes) {
                warn!("Failed to store '{}': {}", caption, e);
                fall_back(cluster, &caption, &mut fates, &mut decisions);
                continue;
            }

            if let Some(hash) = &hash {
                seen.insert(hash.clone());
            }

            let primary = cluster.primary().tag_index;
            for index in cluster.tag_indices() {
                if index == primary {
                    fates.insert(index, TagFate::KeptPrimary);
                    decisions.insert(
                        index,
                        TagDecision::KeptPrimary {
                            image_id: image_id.clone(),
                            caption: caption.clone(),
                        },
                    );
                } else {
                    fates.insert(index, TagFate::KeptSecondary);
                    decisions.insert(index, TagDecision::KeptSecondary);
                }
            }

            figures.push(StoredFigure {
                image_id,
                caption,
                rect: cluster.union().clone(),
                hash,
            });
        }

        let rewritten = rewrite(text, &tags, &decisions);

        let reports = tags
            .iter()
            .filter_map(|t| {
                fates.get(&t.index).map(|&fate| TagReport {
                    index: t.index,
                    full_tag: t.rect.full_tag.clone(),
                    caption: t.rect.desc.clone(),
                    fate,
                })
            })
            .collect();

        info!(
            "Extracted {} figure(s) from {} tag(s)",
            figures.len(),
            tags.len()
        );

        Ok(PageOutcome {
            text: rewritten,
            figures,
            tags: reports,
        })
    }

    /// Crop and hash every kept cluster, preserving order.
    fn crop_all<S>(&self, clusters: &[Cluster], raster: &S) -> Vec<CropResult>
    where
        S: RasterSource + ?Sized,
    {
        #[cfg(feature = "native")]
        let crops = {
            use rayon::prelude::*;
            clusters
                .par_iter()
                .map(|c| self.crop_and_hash(c, raster))
                .collect()
        };

        #[cfg(not(feature = "native"))]
        let crops = clusters
            .iter()
            .map(|c| self.crop_and_hash(c, raster))
            .collect();

        crops
    }

    fn crop_and_hash<S>(&self, cluster: &Cluster, raster: &S) -> CropResult
    where
        S: RasterSource + ?Sized,
    {
        let bytes = raster.crop(cluster.union(), &self.expander)?;

        let hash = self.hasher.as_ref().and_then(|hasher| match hasher.hash(&bytes) {
            Ok(hash) => Some(hash),
            Err(e) => {
                warn!("Hashing '{}' failed, treating as unique: {}", cluster.caption(), e);
                None
            }
        });

        Ok((bytes, hash))
    }
}

impl Default for FigurePipeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Mark every tag of `cluster` as removed without replacement.
fn discard(
    cluster: &Cluster,
    fate: TagFate,
    fates: &mut BTreeMap<usize, TagFate>,
    decisions: &mut BTreeMap<usize, TagDecision>,
) {
    for index in cluster.tag_indices() {
        fates.insert(index, fate);
        decisions.insert(index, TagDecision::Discarded { fallback: None });
    }
}

/// Replace the primary tag with a caption placeholder and delete the rest.
fn fall_back(
    cluster: &Cluster,
    caption: &str,
    fates: &mut BTreeMap<usize, TagFate>,
    decisions: &mut BTreeMap<usize, TagDecision>,
) {
    let primary = cluster.primary().tag_index;
    for index in cluster.tag_indices() {
        let fallback = (index == primary).then(|| fallback_caption(caption));
        fates.insert(index, TagFate::CropFailed);
        decisions.insert(index, TagDecision::Discarded { fallback });
    }
}
