use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PipelineError, Result};

/// Input and output locations for all three stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub clean: CleanConfig,

    #[serde(default)]
    pub extract: ExtractConfig,

    #[serde(default)]
    pub visualize: VisualizeConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CleanConfig {
    #[serde(default = "default_publications")]
    pub publications: PathBuf,

    #[serde(default = "default_abstracts")]
    pub abstracts: PathBuf,

    #[serde(default = "default_processed")]
    pub output: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractConfig {
    #[serde(default = "default_processed")]
    pub input: PathBuf,

    #[serde(default = "default_nodes")]
    pub nodes: PathBuf,

    #[serde(default = "default_edges")]
    pub edges: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VisualizeConfig {
    #[serde(default = "default_nodes")]
    pub nodes: PathBuf,

    #[serde(default = "default_edges")]
    pub edges: PathBuf,

    #[serde(default = "default_html")]
    pub output: PathBuf,

    /// Fixes the spring layout; unseeded runs differ between invocations.
    #[serde(default)]
    pub seed: Option<u64>,

    #[serde(default = "default_iterations")]
    pub iterations: usize,
}

fn default_publications() -> PathBuf {
    PathBuf::from(".xlsx")
}
fn default_abstracts() -> PathBuf {
    PathBuf::from(" - Abstract.xlsx")
}
fn default_processed() -> PathBuf {
    PathBuf::from("(Processed).xlsx")
}
fn default_nodes() -> PathBuf {
    PathBuf::from("nodes_data.csv")
}
fn default_edges() -> PathBuf {
    PathBuf::from("edges_data.csv")
}
fn default_html() -> PathBuf {
    PathBuf::from("network_graph.html")
}
fn default_iterations() -> usize {
    50
}

impl Default for CleanConfig {
    fn default() -> Self {
        Self {
            publications: default_publications(),
            abstracts: default_abstracts(),
            output: default_processed(),
        }
    }
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            input: default_processed(),
            nodes: default_nodes(),
            edges: default_edges(),
        }
    }
}

impl Default for VisualizeConfig {
    fn default() -> Self {
        Self {
            nodes: default_nodes(),
            edges: default_edges(),
            output: default_html(),
            seed: None,
            iterations: default_iterations(),
        }
    }
}

impl CleanConfig {
    /// Conventional file names for one researcher's exports.
    pub fn for_name(name: &str) -> Self {
        Self {
            publications: PathBuf::from(format!("{name}.xlsx")),
            abstracts: PathBuf::from(format!("{name} - Abstract.xlsx")),
            output: processed_path(name),
        }
    }
}

fn processed_path(name: &str) -> PathBuf {
    PathBuf::from(format!("{name}(Processed).xlsx"))
}

impl PipelineConfig {
    /// Derive every stage's paths from one identifier, chaining each stage's
    /// output into the next stage's input.
    pub fn for_name(name: &str) -> Self {
        Self {
            clean: CleanConfig::for_name(name),
            extract: ExtractConfig {
                input: processed_path(name),
                ..ExtractConfig::default()
            },
            visualize: VisualizeConfig::default(),
        }
    }

    /// Load a TOML config file. Absent sections and fields take their defaults.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("Failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
