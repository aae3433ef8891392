//! Core library for figure extraction from annotated OCR output.
//!
//! This crate provides:
//! - Tolerant parsing of `[CROP: ymin, xmin, ymax, xmax | Caption]` tags
//! - Scale-aware rectangle expansion and proximity clustering
//! - Size filtering, non-maximum suppression and perceptual-hash deduplication
//! - Rewriting of OCR text with `[FIG_CAPTURE: id | Caption]` references
//! - Multi-page ingestion into a single note

pub mod error;
pub mod figure;
pub mod geometry;
pub mod ingest;
pub mod models;

pub use error::{FigcapError, FigureError, GeometryError, IngestError, Result, StoreError};
pub use figure::{
    BlobStore, DecodedImage, DirBlobStore, FigurePipeline, KeyGenerator, MemoryBlobStore,
    PageOutcome, RasterSource, SequentialKeys, StoredFigure, TagFate, TagReport,
};
#[cfg(feature = "native")]
pub use figure::TimestampKeys;
pub use geometry::{Rect, RectExpander};
pub use ingest::{FigureAnnotator, NoteDocument, NoteIngestor, PageReport, PageStatus};
pub use models::config::FigcapConfig;
