//! Co-authorship network pipeline.
//!
//! 1. [`cleaning`] merges a publications export with an abstracts export.
//! 2. [`coauthorship`] turns the merged table into node and edge lists.
//! 3. [`visualization`] scores, lays out and renders the network as HTML.
//!
//! Each stage has an in-memory entry point and a `run` function that reads
//! and writes the files named in its section of [`config::PipelineConfig`].

pub mod cleaning;
pub mod coauthorship;
pub mod config;
pub mod error;
pub mod layout;
pub mod network;
pub mod table;
pub mod visualization;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};

use tracing_subscriber::{fmt, EnvFilter};

/// Install the log subscriber used by both binaries. `RUST_LOG` wins over
/// the default level.
pub fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt().with_env_filter(filter).with_target(false).init();
}
