use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use coauthor_network::{coauthorship, init_logging, visualization, PipelineConfig};

/// Build and draw the co-authorship network from a merged publications table
#[derive(Parser)]
#[command(name = "coauthor-network")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// TOML file with stage paths
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Derive file names from this identifier instead of a config file
    #[arg(short, long, global = true, conflicts_with = "config")]
    name: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write node and edge tables from the merged workbook
    Extract {
        /// Merged workbook
        #[arg(long)]
        input: Option<PathBuf>,

        /// Node table output
        #[arg(long)]
        nodes: Option<PathBuf>,

        /// Edge table output
        #[arg(long)]
        edges: Option<PathBuf>,
    },

    /// Render the node and edge tables as an interactive HTML graph
    Visualize {
        /// Node table input
        #[arg(long)]
        nodes: Option<PathBuf>,

        /// Edge table input
        #[arg(long)]
        edges: Option<PathBuf>,

        /// HTML output
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Seed for a reproducible layout
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Extract, then visualize (default)
    All,
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    match (&cli.config, &cli.name) {
        (Some(path), _) => PipelineConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        (None, Some(name)) => Ok(PipelineConfig::for_name(name)),
        (None, None) => Ok(PipelineConfig::default()),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let mut config = load_config(&cli)?;

    match cli.command.unwrap_or(Commands::All) {
        Commands::Extract {
            input,
            nodes,
            edges,
        } => {
            if let Some(input) = input {
                config.extract.input = input;
            }
            if let Some(nodes) = nodes {
                config.extract.nodes = nodes;
            }
            if let Some(edges) = edges {
                config.extract.edges = edges;
            }
            coauthorship::run(&config.extract).context("Extraction failed")?;
        }
        Commands::Visualize {
            nodes,
            edges,
            output,
            seed,
        } => {
            if let Some(nodes) = nodes {
                config.visualize.nodes = nodes;
            }
            if let Some(edges) = edges {
                config.visualize.edges = edges;
            }
            if let Some(output) = output {
                config.visualize.output = output;
            }
            if seed.is_some() {
                config.visualize.seed = seed;
            }
            visualization::run(&config.visualize).context("Visualization failed")?;
        }
        Commands::All => {
            coauthorship::run(&config.extract).context("Extraction failed")?;
            visualization::run(&config.visualize).context("Visualization failed")?;
        }
    }

    Ok(())
}
