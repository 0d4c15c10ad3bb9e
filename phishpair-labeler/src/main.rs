//! phishpair-labeler - Main entry point
//!
//! Classifies the PDFs in a folder and renames them with their tags.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use phishpair_common::config::load_toml_config;
use phishpair_labeler::{process_folder, OpenAiClassifier, PdfTextExtractor};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for phishpair-labeler
#[derive(Parser, Debug)]
#[command(name = "phishpair-labeler")]
#[command(about = "Tag PDF emails with persuasion categories")]
#[command(version)]
struct Args {
    /// Folder containing the PDF files
    folder: PathBuf,

    /// Analyze files without renaming them
    #[arg(long)]
    dry_run: bool,

    /// Chat completion model
    #[arg(long, env = "PHISHPAIR_LABELER_MODEL")]
    model: Option<String>,

    /// OpenAI API key (falls back to openai_api_key in the config file)
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Path to the TOML config file
    #[arg(short, long, env = "PHISHPAIR_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_toml_config(args.config.as_deref()).context("Failed to load config")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("phishpair_labeler={}", config.logging.level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting phishpair-labeler v{}", env!("CARGO_PKG_VERSION"));

    let api_key = args
        .api_key
        .or(config.openai_api_key)
        .filter(|k| !k.trim().is_empty())
        .context("OpenAI API key not found. Set OPENAI_API_KEY or openai_api_key in the config file")?;

    let classifier = OpenAiClassifier::new(api_key, args.model)?;
    info!("Using model {}", classifier.model());
    if args.dry_run {
        info!("Dry run: files will not be renamed");
    }

    let summary = process_folder(&args.folder, &PdfTextExtractor, &classifier, args.dry_run)
        .await
        .with_context(|| format!("Failed to process {}", args.folder.display()))?;

    summary.log();
    Ok(())
}
