//! Batch command - combine many page images into one note.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;

use figcap_core::{
    DirBlobStore, FigureAnnotator, FigurePipeline, IngestError, NoteIngestor, PageStatus,
    TimestampKeys,
};

use super::config::load_config;

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern matching page images
    #[arg(required = true)]
    input: String,

    /// Directory for cropped figures (default: storage.output_dir)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Output file for the combined note (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// Reads each page's annotated OCR text from `<image stem>.txt` next to it.
pub struct SidecarAnnotator {
    sidecars: Vec<PathBuf>,
}

impl SidecarAnnotator {
    /// Sidecar paths for `images`, in the same order.
    pub fn for_images(images: &[PathBuf]) -> Self {
        Self {
            sidecars: images.iter().map(|p| p.with_extension("txt")).collect(),
        }
    }
}

impl FigureAnnotator for SidecarAnnotator {
    fn annotate(&self, page: usize, _image: &[u8]) -> Result<String, IngestError> {
        let path = self
            .sidecars
            .get(page)
            .ok_or_else(|| IngestError::Annotation(format!("no sidecar for page {}", page + 1)))?;

        fs::read_to_string(path)
            .map_err(|e| IngestError::Annotation(format!("{}: {}", path.display(), e)))
    }
}

fn is_image(path: &Path) -> bool {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    matches!(
        ext.to_lowercase().as_str(),
        "png" | "jpg" | "jpeg" | "webp" | "tiff" | "tif" | "bmp"
    )
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    let mut files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| is_image(p))
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No matching images found for pattern: {}", args.input);
    }

    eprintln!(
        "{} Found {} pages to process",
        style("ℹ").blue(),
        files.len()
    );

    let out_dir = args
        .out_dir
        .clone()
        .unwrap_or_else(|| config.storage.output_dir.clone());
    let mut store = DirBlobStore::new(&out_dir)?;
    let mut keys = TimestampKeys::new(&config.storage.key_prefix);

    let pb = ProgressBar::new(files.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pages {msg}")
            .unwrap()
            .progress_chars("=>-"),
    );

    let mut pages = Vec::with_capacity(files.len());
    for path in &files {
        pages.push(fs::read(path)?);
    }

    let annotator = SidecarAnnotator::for_images(&files);
    let ingestor = NoteIngestor::new(FigurePipeline::from_config(&config))
        .with_continue_on_error(args.continue_on_error);

    let ticked = pages.iter().zip(&files).map(|(bytes, path)| {
        pb.set_message(
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        );
        pb.inc(1);
        bytes
    });

    let document = ingestor.ingest(ticked, &annotator, &mut store, &mut keys)?;

    pb.finish_with_message("Complete");

    if let Some(output_path) = &args.output {
        fs::write(output_path, &document.text)?;
        debug!("Wrote note to {}", output_path.display());
    } else {
        println!("{}", document.text);
    }

    eprintln!();
    eprintln!(
        "{} Processed {} pages in {:?}",
        style("✓").green(),
        document.pages.len(),
        start.elapsed()
    );
    eprintln!(
        "   {} figures saved to {}, {} pages failed",
        style(document.figure_count()).green(),
        store.dir().display(),
        style(document.failed_count()).red()
    );

    let failed: Vec<_> = document
        .pages
        .iter()
        .filter_map(|p| match &p.status {
            PageStatus::Failed { reason } => Some((p.index, reason)),
            PageStatus::Processed { .. } => None,
        })
        .collect();

    if !failed.is_empty() {
        eprintln!();
        eprintln!("{}", style("Failed pages:").red());
        for (index, reason) in failed {
            eprintln!("  - {}: {}", files[index].display(), reason);
        }
    }

    Ok(())
}
