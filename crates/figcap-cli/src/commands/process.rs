//! Process command - extract figures from a single page.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use figcap_core::{
    DecodedImage, DirBlobStore, FigcapConfig, FigurePipeline, PageOutcome, TagFate,
    TimestampKeys,
};

use super::config::load_config;

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Page image (PNG, JPEG, ...)
    #[arg(required = true)]
    image: PathBuf,

    /// Annotated OCR text for the page
    #[arg(short, long)]
    text: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Directory for cropped figures (default: storage.output_dir)
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// Rewritten text only
    Text,
    /// Rewritten text, stored figures and per-tag fates
    Json,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let config = load_config(config_path)?;

    if !args.image.exists() {
        anyhow::bail!("Image file not found: {}", args.image.display());
    }
    if !args.text.exists() {
        anyhow::bail!("Text file not found: {}", args.text.display());
    }

    info!("Processing page: {}", args.image.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap(),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Extracting figures...");

    let text = fs::read_to_string(&args.text)?;
    let bytes = fs::read(&args.image)?;
    let raster = DecodedImage::from_bytes(&bytes)?;

    let out_dir = args
        .out_dir
        .clone()
        .unwrap_or_else(|| config.storage.output_dir.clone());
    let mut store = DirBlobStore::new(&out_dir)?;
    let mut keys = TimestampKeys::new(&config.storage.key_prefix);

    let outcome = FigurePipeline::from_config(&config).process(&text, &raster, &mut store, &mut keys)?;

    pb.finish_and_clear();

    let output = format_outcome(&outcome, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        eprintln!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    print_summary(&outcome, &store, &config);

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

fn format_outcome(outcome: &PageOutcome, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Text => Ok(outcome.text.clone()),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(outcome)?),
    }
}

fn print_summary(outcome: &PageOutcome, store: &DirBlobStore, config: &FigcapConfig) {
    if outcome.tags.is_empty() {
        eprintln!("{} No crop tags found", style("ℹ").blue());
        return;
    }

    let count = |fate: TagFate| outcome.tags.iter().filter(|t| t.fate == fate).count();

    eprintln!(
        "{} {} figure(s) saved to {}",
        style("✓").green(),
        outcome.figures.len(),
        store.dir().display()
    );

    let dropped = [
        ("too small", count(TagFate::SizeFiltered)),
        ("overlapping", count(TagFate::NmsRemoved)),
        ("duplicate", count(TagFate::HashDuplicate)),
        ("crop failed", count(TagFate::CropFailed)),
    ];

    for (label, n) in dropped.iter().filter(|(_, n)| *n > 0) {
        eprintln!("   {} {} tag(s) {}", style("-").yellow(), n, label);
    }

    if !config.hashing.enabled {
        eprintln!("   {} hash deduplication disabled", style("ℹ").blue());
    }
}
