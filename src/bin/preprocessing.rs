use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::warn;

use coauthor_network::{cleaning, init_logging, PipelineConfig};

/// Clean a publications export and an abstracts export and merge them by title
#[derive(Parser)]
#[command(name = "preprocessing")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// TOML file with stage paths
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Derive file names from this identifier: "<name>.xlsx",
    /// "<name> - Abstract.xlsx" and "<name>(Processed).xlsx"
    #[arg(short, long, conflicts_with = "config")]
    name: Option<String>,

    /// Publications table
    #[arg(long)]
    publications: Option<PathBuf>,

    /// Abstracts table
    #[arg(long)]
    abstracts: Option<PathBuf>,

    /// Merged workbook; ".xlsx" is appended when missing
    #[arg(short, long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let mut config = match (&cli.config, &cli.name) {
        (Some(path), _) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        (None, Some(name)) => PipelineConfig::for_name(name),
        (None, None) => PipelineConfig::default(),
    };

    if let Some(publications) = cli.publications {
        config.clean.publications = publications;
    }
    if let Some(abstracts) = cli.abstracts {
        config.clean.abstracts = abstracts;
    }
    if let Some(output) = cli.output {
        config.clean.output = output;
    }

    let cleaned = cleaning::run(&config.clean).context("Cleaning failed")?;

    let unparsed = &cleaned.unparsed_dates;
    if !unparsed.publications.is_empty() || !unparsed.abstracts.is_empty() {
        warn!(
            publications = ?unparsed.publications,
            abstracts = ?unparsed.abstracts,
            "Rows whose publication date was kept as written"
        );
    }

    Ok(())
}
