//! Multi-page ingestion into a single note.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{FigcapError, IngestError, Result};
use crate::figure::{
    probe_dimensions, BlobStore, DecodedImage, FigurePipeline, KeyGenerator, PageOutcome,
};

/// Produces annotated OCR text (with crop tags) for a page image.
pub trait FigureAnnotator {
    /// Annotate page `page` (zero-based) from its encoded image.
    fn annotate(&self, page: usize, image: &[u8]) -> std::result::Result<String, IngestError>;
}

impl<F> FigureAnnotator for F
where
    F: Fn(usize, &[u8]) -> std::result::Result<String, IngestError>,
{
    fn annotate(&self, page: usize, image: &[u8]) -> std::result::Result<String, IngestError> {
        self(page, image)
    }
}

/// How a page ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PageStatus {
    /// Rewritten text was appended.
    Processed { figures: usize, discarded: usize },
    /// Skipped; nothing was appended.
    Failed { reason: String },
}

/// Per-page summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageReport {
    pub index: usize,
    pub status: PageStatus,
}

/// Combined result of ingesting several pages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteDocument {
    /// Rewritten page texts joined by blank lines.
    pub text: String,
    /// One report per input page.
    pub pages: Vec<PageReport>,
}

impl NoteDocument {
    /// Total figures stored across pages.
    pub fn figure_count(&self) -> usize {
        self.pages
            .iter()
            .map(|p| match p.status {
                PageStatus::Processed { figures, .. } => figures,
                PageStatus::Failed { .. } => 0,
            })
            .sum()
    }

    /// Number of failed pages.
    pub fn failed_count(&self) -> usize {
        self.pages
            .iter()
            .filter(|p| matches!(p.status, PageStatus::Failed { .. }))
            .count()
    }
}

/// Runs the figure pipeline over pages in order.
#[derive(Debug, Clone, Default)]
pub struct NoteIngestor {
    pipeline: FigurePipeline,
    continue_on_error: bool,
}

const PAGE_SEPARATOR: &str = "\n\n";

impl NoteIngestor {
    /// Create an ingestor that stops at the first failing page.
    pub fn new(pipeline: FigurePipeline) -> Self {
        Self {
            pipeline,
            continue_on_error: false,
        }
    }

    /// Skip failing pages instead of aborting.
    pub fn with_continue_on_error(mut self, enabled: bool) -> Self {
        self.continue_on_error = enabled;
        self
    }

    /// The pipeline used for each page.
    pub fn pipeline(&self) -> &FigurePipeline {
        &self.pipeline
    }

    /// Ingest `pages` sequentially.
    ///
    /// Each page gets its own duplicate-hash scope. Figures from every page
    /// share `store` and `keys`.
    pub fn ingest<I, A, B, K>(
        &self,
        pages: I,
        annotator: &A,
        store: &mut B,
        keys: &mut K,
    ) -> Result<NoteDocument>
    where
        I: IntoIterator,
        I::Item: AsRef<[u8]>,
        A: FigureAnnotator + ?Sized,
        B: BlobStore + ?Sized,
        K: KeyGenerator + ?Sized,
    {
        let mut document = NoteDocument::default();

        for (index, page) in pages.into_iter().enumerate() {
            debug!("Processing page {}", index + 1);

            match self.ingest_page(index, page.as_ref(), annotator, store, keys) {
                Ok(outcome) => {
                    if !document.text.is_empty() {
                        document.text.push_str(PAGE_SEPARATOR);
                    }
                    document.text.push_str(&outcome.text);
                    document.pages.push(PageReport {
                        index,
                        status: PageStatus::Processed {
                            figures: outcome.figures.len(),
                            discarded: outcome.discarded(),
                        },
                    });
                }
                Err(e) => {
                    let reason = e.to_string();
                    if !self.continue_on_error {
                        return Err(IngestError::Page { index, reason }.into());
                    }
                    warn!("Skipping page {}: {}", index + 1, reason);
                    document.pages.push(PageReport {
                        index,
                        status: PageStatus::Failed { reason },
                    });
                }
            }
        }

        info!(
            "Ingested {} page(s), {} figure(s), {} failed",
            document.pages.len(),
            document.figure_count(),
            document.failed_count()
        );

        Ok(document)
    }

    fn ingest_page<A, B, K>(
        &self,
        index: usize,
        image: &[u8],
        annotator: &A,
        store: &mut B,
        keys: &mut K,
    ) -> std::result::Result<PageOutcome, FigcapError>
    where
        A: FigureAnnotator + ?Sized,
        B: BlobStore + ?Sized,
        K: KeyGenerator + ?Sized,
    {
        let (width, height) = probe_dimensions(image)?;
        debug!("Page {} is {}x{}", index + 1, width, height);

        let text = annotator.annotate(index, image)?;
        let raster = DecodedImage::from_bytes(image)?;

        self.pipeline.process(&text, &raster, store, keys)
    }
}
