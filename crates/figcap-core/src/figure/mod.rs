//! Figure extraction from annotated OCR text.
//!
//! Tags are parsed, expanded, clustered, size-filtered, suppressed and
//! hash-deduplicated before the text is rewritten with figure references.

pub mod cluster;
pub mod filter;
pub mod hash;
pub mod nms;
pub mod pipeline;
pub mod raster;
pub mod rewrite;
pub mod store;
pub mod tags;

pub use cluster::{Cluster, Clusterer};
pub use filter::SizeFilter;
pub use hash::{PerceptualHasher, SeenHashes};
pub use nms::{Deduplicator, Suppression};
pub use pipeline::{FigurePipeline, PageOutcome, StoredFigure, TagFate, TagReport};
pub use raster::{probe_dimensions, DecodedImage, RasterSource};
pub use rewrite::{fallback_caption, rewrite, strip_crop_tags, TagDecision};
pub use store::{BlobStore, DirBlobStore, KeyGenerator, MemoryBlobStore, SequentialKeys};
#[cfg(feature = "native")]
pub use store::TimestampKeys;
pub use tags::{figure_reference, figure_references, parse_crop_tags, CropTag, CropTagParser, FigureRef};
