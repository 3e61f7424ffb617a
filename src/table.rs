//! Reading and writing the tabular interchange files.
//!
//! Every table is held as a polars `DataFrame` whose columns are nullable
//! UTF-8 strings. Spreadsheets go through calamine on the way in and
//! rust_xlsxwriter on the way out; CSV goes through polars directly.

use calamine::{open_workbook_auto, Data, Reader};
use polars::prelude::*;
use rust_xlsxwriter::Workbook;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{PipelineError, Result};

pub const XLSX_EXTENSION: &str = "xlsx";

/// Read a table, choosing the reader from the file extension.
pub fn read_table(path: &Path) -> Result<DataFrame> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let df = match extension.as_deref() {
        Some("csv") => read_csv(path)?,
        Some("xlsx" | "xlsm" | "xls" | "xlsb" | "ods") => read_spreadsheet(path)?,
        _ => return Err(PipelineError::UnsupportedFormat(path.to_path_buf())),
    };

    debug!(
        path = %path.display(),
        rows = df.height(),
        columns = df.width(),
        "Loaded table"
    );
    Ok(df)
}

fn read_csv(path: &Path) -> Result<DataFrame> {
    // A zero-row inference window keeps every column as Utf8.
    let df = CsvReader::from_path(path)?
        .has_header(true)
        .infer_schema(Some(0))
        .finish()?;
    Ok(df)
}

fn read_spreadsheet(path: &Path) -> Result<DataFrame> {
    let mut workbook = open_workbook_auto(path)?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PipelineError::EmptyWorkbook(path.to_path_buf()))??;

    let mut rows = range.rows();
    let header: Vec<String> = match rows.next() {
        Some(cells) => unique_headers(cells.iter().map(cell_to_string)),
        None => return Ok(DataFrame::empty()),
    };

    let mut columns: Vec<Vec<Option<String>>> = vec![Vec::new(); header.len()];
    for cells in rows {
        for (i, column) in columns.iter_mut().enumerate() {
            column.push(cells.get(i).and_then(cell_to_string));
        }
    }

    let series = header
        .iter()
        .zip(columns)
        .map(|(name, values)| Series::new(name, values))
        .collect::<Vec<_>>();
    Ok(DataFrame::new(series)?)
}

/// Blank header cells get a positional name and repeats get a numeric suffix,
/// since a `DataFrame` needs distinct column names.
fn unique_headers(names: impl Iterator<Item = Option<String>>) -> Vec<String> {
    let mut seen = HashSet::new();
    names
        .enumerate()
        .map(|(i, name)| {
            let base = name.unwrap_or_else(|| format!("column_{}", i + 1));
            let mut candidate = base.clone();
            let mut suffix = 1;
            while !seen.insert(candidate.clone()) {
                candidate = format!("{base}.{suffix}");
                suffix += 1;
            }
            candidate
        })
        .collect()
}

fn cell_to_string(cell: &Data) -> Option<String> {
    let text = match cell {
        Data::Empty => return None,
        Data::String(s) => s.trim_end().to_string(),
        Data::Float(f) => format_number(*f),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(datetime) => datetime.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => format_number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.clone(),
        Data::Error(e) => e.to_string(),
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Whole floats print without a fractional part so `12.0` downloads read as `12`.
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        value.to_string()
    }
}

/// Append `.<extension>` unless the path already ends with it.
pub fn ensure_extension(path: &Path, extension: &str) -> PathBuf {
    let has_extension = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension));
    if has_extension {
        path.to_path_buf()
    } else {
        let mut raw = path.as_os_str().to_os_string();
        raw.push(".");
        raw.push(extension);
        PathBuf::from(raw)
    }
}

/// Write a table to the first sheet of a new `.xlsx` workbook.
///
/// Cells of `numeric_columns` that parse as finite numbers are stored as
/// numbers. Every other cell is stored as text, byte for byte; nulls are left
/// blank.
pub fn write_xlsx(df: &DataFrame, path: &Path, numeric_columns: &[&str]) -> Result<()> {
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();

    for (col, series) in df.get_columns().iter().enumerate() {
        let col = u16::try_from(col)
            .map_err(|_| PipelineError::Table(format!("too many columns: {}", df.width())))?;
        worksheet.write_string(0, col, series.name())?;
        let numeric = numeric_columns.contains(&series.name());

        let values = series.cast(&DataType::Utf8)?;
        for (row, value) in values.utf8()?.into_iter().enumerate() {
            let Some(text) = value else { continue };
            let row = u32::try_from(row + 1)
                .map_err(|_| PipelineError::Table(format!("too many rows: {}", df.height())))?;
            match text.parse::<f64>() {
                Ok(number) if numeric && number.is_finite() && looks_numeric(text) => {
                    worksheet.write_number(row, col, number)?;
                }
                _ => {
                    worksheet.write_string(row, col, text)?;
                }
            }
        }
    }

    workbook.save(path)?;
    Ok(())
}

// Rust's float parser accepts "inf", "NaN" and "1e5"; only plain decimals
// should become spreadsheet numbers.
fn looks_numeric(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    let leading_zero = digits.len() > 1 && digits.starts_with('0') && !digits.starts_with("0.");
    !digits.is_empty()
        && !leading_zero
        && digits.chars().all(|c| c.is_ascii_digit() || c == '.')
        && digits.chars().filter(|&c| c == '.').count() <= 1
        && digits.chars().any(|c| c.is_ascii_digit())
}

/// Names of all columns, owned so the frame can be mutated afterwards.
pub fn column_names(df: &DataFrame) -> Vec<String> {
    df.get_column_names()
        .into_iter()
        .map(str::to_string)
        .collect()
}

pub fn has_column(df: &DataFrame, name: &str) -> bool {
    df.get_column_names().contains(&name)
}

/// A column viewed as nullable text, casting frames built with other dtypes.
pub fn text_column(df: &DataFrame, name: &str) -> Result<Utf8Chunked> {
    let series = df.column(name)?.cast(&DataType::Utf8)?;
    Ok(series.utf8()?.clone())
}
