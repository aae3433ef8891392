//! Error types for the figcap-core library.

use thiserror::Error;

/// Main error type for the figcap library.
#[derive(Error, Debug)]
pub enum FigcapError {
    /// Geometry contract violation.
    #[error("geometry error: {0}")]
    Geometry(#[from] GeometryError),

    /// Figure cropping, hashing or decoding error.
    #[error("figure error: {0}")]
    Figure(#[from] FigureError),

    /// Blob store error.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Multi-page ingestion error.
    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    /// Image processing error.
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Errors raised by the geometry primitives.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    /// Attempted to compute the union of zero rectangles.
    #[error("cannot compute the union of an empty rectangle set")]
    EmptyInput,
}

/// Errors related to a single figure crop.
#[derive(Error, Debug)]
pub enum FigureError {
    /// Cropping the source raster failed.
    #[error("crop failed: {0}")]
    Crop(String),

    /// Perceptual hashing of a crop failed.
    #[error("hash failed: {0}")]
    Hash(String),

    /// The source image could not be decoded.
    #[error("failed to decode image: {0}")]
    Decode(String),

    /// The image reports a zero width or height.
    #[error("invalid image dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },
}

/// Errors returned by blob stores.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Writing the blob failed.
    #[error("failed to write blob {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// The store refused the key or payload.
    #[error("blob {key} rejected: {reason}")]
    Rejected { key: String, reason: String },
}

/// Errors raised while ingesting a sequence of pages.
#[derive(Error, Debug)]
pub enum IngestError {
    /// The annotating OCR collaborator failed.
    #[error("annotation failed: {0}")]
    Annotation(String),

    /// A page could not be processed.
    #[error("page {index} failed: {reason}")]
    Page { index: usize, reason: String },
}

/// Result type for the figcap library.
pub type Result<T> = std::result::Result<T, FigcapError>;
