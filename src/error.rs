//! Error types shared by every pipeline stage.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while cleaning, extracting or visualizing.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A required column is absent from an input table
    #[error("The {table} table is missing the '{column}' column")]
    MissingColumn {
        /// Which table was inspected
        table: &'static str,
        /// Column that was expected
        column: String,
    },

    /// No `Author <n>` columns were found in the merged table
    #[error("The {0} table has no numbered 'Author' columns")]
    NoAuthorColumns(&'static str),

    /// Input file extension is not a table format we read
    #[error("Unsupported table format: {}", .0.display())]
    UnsupportedFormat(PathBuf),

    /// Workbook contains no worksheet
    #[error("Workbook has no worksheets: {}", .0.display())]
    EmptyWorkbook(PathBuf),

    /// Table does not fit the output format
    #[error("Table error: {0}")]
    Table(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::prelude::PolarsError),

    #[error("Spreadsheet read error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    #[error("Spreadsheet write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Failed to parse config: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("Failed to serialize config: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    pub(crate) fn missing(table: &'static str, column: impl Into<String>) -> Self {
        PipelineError::MissingColumn {
            table,
            column: column.into(),
        }
    }
}

/// Result type alias using `PipelineError`
pub type Result<T> = std::result::Result<T, PipelineError>;
