//! Stage 1: clean the publication and abstract exports and merge them.
//!
//! Delimited author and keyword fields are widened into `Author n` /
//! `Keyword n` columns, publication dates lose their time of day, duplicate
//! rows are dropped and the abstracts are left-joined onto the publications
//! by title.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use polars::prelude::*;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn};

use crate::config::CleanConfig;
use crate::error::{PipelineError, Result};
use crate::table::{
    ensure_extension, has_column, read_table, text_column, write_xlsx, XLSX_EXTENSION,
};

pub const TITLE: &str = "Title";
pub const JOURNAL: &str = "Journal";
pub const PUBLICATION_DATE: &str = "Publication Date";
pub const DOWNLOADS: &str = "Downloads";
pub const AUTHORS: &str = "Authors";
pub const AUTHOR_PREFIX: &str = "Author";
pub const ABSTRACT: &str = "Abstract";
pub const KEYWORDS: &str = "Keywords";
pub const KEYWORD_PREFIX: &str = "Keyword";

/// Columns whose combined values identify a duplicate row.
pub const DEDUP_KEY: [&str; 4] = [TITLE, JOURNAL, PUBLICATION_DATE, DOWNLOADS];

const AUTHOR_SEPARATORS: [char; 2] = [';', ','];
const KEYWORDS_LABEL: &str = "Keywords:";

/// Split an author field into name tokens.
///
/// Separators become spaces and the result is tokenized on whitespace, so
/// `"A; B, C"` yields `["A", "B", "C"]`.
pub fn split_authors(value: Option<&str>) -> Vec<String> {
    let Some(value) = value else {
        return Vec::new();
    };
    let mut joined = value.to_string();
    for sep in AUTHOR_SEPARATORS {
        joined = joined.replace(sep, " ");
    }
    joined.split_whitespace().map(str::to_string).collect()
}

/// Split a keyword field on `;` after removing its `Keywords:` label.
///
/// Pieces are trimmed but not tokenized further, so multi-word keywords
/// survive intact.
pub fn split_keywords(value: Option<&str>) -> Vec<String> {
    let Some(value) = value else {
        return Vec::new();
    };
    let trimmed = value.trim_start();
    let body = trimmed.strip_prefix(KEYWORDS_LABEL).unwrap_or(trimmed);
    if body.trim().is_empty() {
        return Vec::new();
    }
    body.split(';').map(|k| k.trim().to_string()).collect()
}

/// Replace a delimited column with `<prefix> 1..=width` columns, where width
/// is the longest list produced by `split` over all rows. Returns the width.
pub fn widen_list_column<F>(
    df: &mut DataFrame,
    source: &str,
    prefix: &str,
    split: F,
) -> Result<usize>
where
    F: Fn(Option<&str>) -> Vec<String>,
{
    let lists: Vec<Vec<String>> = text_column(df, source)?
        .into_iter()
        .map(|value| split(value))
        .collect();
    let width = lists.iter().map(Vec::len).max().unwrap_or(0);

    let _ = df.drop_in_place(source)?;
    for i in 0..width {
        let values: Vec<Option<String>> = lists.iter().map(|list| list.get(i).cloned()).collect();
        df.with_column(Series::new(&format!("{prefix} {}", i + 1), values))?;
    }

    debug!(source, width, "Widened list column");
    Ok(width)
}

/// Outcome of parsing one date cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DateValue {
    /// Parsed; time of day discarded.
    Normalized(NaiveDate),
    /// Could not be parsed; the original text is kept.
    Unparsed(String),
}

impl DateValue {
    pub fn is_normalized(&self) -> bool {
        matches!(self, DateValue::Normalized(_))
    }

    /// Text written back into the table.
    pub fn to_cell(&self) -> String {
        match self {
            DateValue::Normalized(date) => date.format("%Y-%m-%d").to_string(),
            DateValue::Unparsed(raw) => raw.clone(),
        }
    }
}

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M:%S",
    "%Y/%m/%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%Y.%m.%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%Y%m%d",
];

// Day-less formats; parsed against "<value> 1" so they land on the 1st.
const MONTH_FORMATS: &[&str] = &["%Y-%m %d", "%Y/%m %d", "%B %Y %d", "%b %Y %d"];

/// Parse a date or date-time, keeping only the calendar date.
pub fn normalize_date(raw: &str) -> DateValue {
    match parse_calendar_date(raw) {
        Some(date) => DateValue::Normalized(date),
        None => DateValue::Unparsed(raw.to_string()),
    }
}

fn parse_calendar_date(raw: &str) -> Option<NaiveDate> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Some(dt) = DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
    {
        return Some(dt.date());
    }
    if let Some(date) = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
    {
        return Some(date);
    }
    let padded = format!("{s} 1");
    if let Some(date) = MONTH_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(&padded, fmt).ok())
    {
        return Some(date);
    }
    if s.len() == 4 && s.chars().all(|c| c.is_ascii_digit()) {
        return s
            .parse::<i32>()
            .ok()
            .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1));
    }
    None
}

/// Normalize a date column in place. Returns the row indices that could not
/// be parsed and were left as-is; a missing column yields no rows.
pub fn normalize_date_column(df: &mut DataFrame, column: &str) -> Result<Vec<usize>> {
    if !has_column(df, column) {
        return Ok(Vec::new());
    }

    let mut unparsed = Vec::new();
    let raw = text_column(df, column)?;
    let values: Vec<Option<String>> = raw
        .into_iter()
        .enumerate()
        .map(|(row, value)| {
            value.map(|text| {
                let parsed = normalize_date(text);
                if !parsed.is_normalized() {
                    unparsed.push(row);
                }
                parsed.to_cell()
            })
        })
        .collect();
    df.with_column(Series::new(column, values))?;

    if !unparsed.is_empty() {
        warn!(
            column,
            rows = unparsed.len(),
            "Some dates could not be parsed and were kept unchanged"
        );
    }
    Ok(unparsed)
}

/// Drop rows repeating an earlier row's (Title, Journal, Publication Date,
/// Downloads) values. The first occurrence is kept and nulls compare equal.
/// Key columns the table lacks are left out of the key.
pub fn deduplicate(df: &DataFrame) -> Result<DataFrame> {
    let key_columns = DEDUP_KEY
        .iter()
        .filter(|name| has_column(df, name))
        .map(|name| text_column(df, name))
        .collect::<Result<Vec<_>>>()?;

    let mut seen: HashSet<Vec<Option<&str>>> = HashSet::new();
    let keep: Vec<bool> = (0..df.height())
        .map(|row| seen.insert(key_columns.iter().map(|col| col.get(row)).collect()))
        .collect();

    let mask = BooleanChunked::from_slice("keep", &keep);
    let deduped = df.filter(&mask)?;
    debug!(
        before = df.height(),
        after = deduped.height(),
        "Removed duplicate rows"
    );
    Ok(deduped)
}

/// Left join `Abstract` and `Keyword 1..=keyword_width` onto the publications
/// by title.
///
/// Each publication takes the first abstracts row with the same title, so
/// the merged table has exactly as many rows as `publications`. Abstract rows
/// without a title never match.
pub fn left_join_abstracts(
    publications: &DataFrame,
    abstracts: &DataFrame,
    keyword_width: usize,
) -> Result<DataFrame> {
    if !has_column(publications, TITLE) {
        return Err(PipelineError::missing("publications", TITLE));
    }
    if !has_column(abstracts, TITLE) {
        return Err(PipelineError::missing("abstracts", TITLE));
    }

    let abstract_titles = text_column(abstracts, TITLE)?;
    let mut first_row: HashMap<&str, usize> = HashMap::new();
    for (row, title) in abstract_titles.into_iter().enumerate() {
        if let Some(title) = title {
            first_row.entry(title).or_insert(row);
        }
    }

    let matches: Vec<Option<usize>> = text_column(publications, TITLE)?
        .into_iter()
        .map(|title| title.and_then(|t| first_row.get(t).copied()))
        .collect();

    let mut joined_columns = vec![ABSTRACT.to_string()];
    joined_columns.extend((1..=keyword_width).map(|i| format!("{KEYWORD_PREFIX} {i}")));

    let mut merged = publications.clone();
    for name in &joined_columns {
        let values: Vec<Option<String>> = if has_column(abstracts, name) {
            let source = text_column(abstracts, name)?;
            matches
                .iter()
                .map(|m| m.and_then(|row| source.get(row)).map(str::to_string))
                .collect()
        } else {
            warn!(column = %name, "Abstracts table has no such column; filling with nulls");
            vec![None; matches.len()]
        };
        merged.with_column(Series::new(name, values))?;
    }

    let matched = matches.iter().filter(|m| m.is_some()).count();
    debug!(
        rows = merged.height(),
        matched,
        "Joined abstracts onto publications"
    );
    Ok(merged)
}

/// Rows of each source table whose publication date was kept unparsed,
/// indexed before deduplication.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnparsedDates {
    pub publications: Vec<usize>,
    pub abstracts: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct CleanedTables {
    pub merged: DataFrame,
    /// Number of `Author n` columns.
    pub author_width: usize,
    /// Number of `Keyword n` columns.
    pub keyword_width: usize,
    pub unparsed_dates: UnparsedDates,
}

/// Clean both tables and merge them, entirely in memory.
pub fn clean_and_merge(
    mut publications: DataFrame,
    mut abstracts: DataFrame,
) -> Result<CleanedTables> {
    if !has_column(&publications, TITLE) {
        return Err(PipelineError::missing("publications", TITLE));
    }
    if !has_column(&abstracts, TITLE) {
        return Err(PipelineError::missing("abstracts", TITLE));
    }

    let author_width = if has_column(&publications, AUTHORS) {
        widen_list_column(&mut publications, AUTHORS, AUTHOR_PREFIX, split_authors)?
    } else {
        warn!("Publications table has no '{AUTHORS}' column");
        0
    };

    let keyword_width = if has_column(&abstracts, KEYWORDS) {
        widen_list_column(&mut abstracts, KEYWORDS, KEYWORD_PREFIX, split_keywords)?
    } else {
        warn!("Abstracts table has no '{KEYWORDS}' column");
        0
    };

    let unparsed_dates = UnparsedDates {
        publications: normalize_date_column(&mut publications, PUBLICATION_DATE)?,
        abstracts: normalize_date_column(&mut abstracts, PUBLICATION_DATE)?,
    };

    let publications = deduplicate(&publications)?;
    let abstracts = deduplicate(&abstracts)?;
    let merged = left_join_abstracts(&publications, &abstracts, keyword_width)?;

    Ok(CleanedTables {
        merged,
        author_width,
        keyword_width,
        unparsed_dates,
    })
}

/// Read both exports, clean and merge them, and write the merged workbook.
pub fn run(config: &CleanConfig) -> Result<CleanedTables> {
    let publications = read_table(&config.publications)?;
    let abstracts = read_table(&config.abstracts)?;

    let cleaned = clean_and_merge(publications, abstracts)?;

    let output = ensure_extension(&config.output, XLSX_EXTENSION);
    write_xlsx(&cleaned.merged, &output, &[DOWNLOADS])?;
    info!("Processed file has been saved to: {}", output.display());

    Ok(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn column(df: &DataFrame, name: &str) -> Vec<Option<String>> {
        text_column(df, name)
            .unwrap()
            .into_iter()
            .map(|v| v.map(str::to_string))
            .collect()
    }

    #[test]
    fn test_split_authors() {
        assert_eq!(split_authors(Some("A; B, C")), strings(&["A", "B", "C"]));
        assert_eq!(split_authors(Some("  A;;B  ")), strings(&["A", "B"]));
        assert!(split_authors(Some("")).is_empty());
        assert!(split_authors(None).is_empty());
    }

    #[test]
    fn test_split_keywords() {
        assert_eq!(
            split_keywords(Some("Keywords: x; y ; z")),
            strings(&["x", "y", "z"])
        );
        assert_eq!(
            split_keywords(Some("graph theory; social networks")),
            strings(&["graph theory", "social networks"])
        );
        assert!(split_keywords(Some("   ")).is_empty());
        assert!(split_keywords(Some("Keywords:  ")).is_empty());
        assert!(split_keywords(None).is_empty());
    }

    #[test]
    fn test_split_keywords_keeps_empty_pieces() {
        assert_eq!(split_keywords(Some("a;;b")), strings(&["a", "", "b"]));
    }

    #[test]
    fn test_widen_list_column() {
        let mut df = df!(
            "Title" => &["p1", "p2", "p3"],
            "Authors" => &[Some("A; B, C"), Some("D"), None]
        )
        .unwrap();

        let width = widen_list_column(&mut df, "Authors", "Author", split_authors).unwrap();

        assert_eq!(width, 3);
        assert!(!has_column(&df, "Authors"));
        assert_eq!(df.width(), 4);
        assert_eq!(
            column(&df, "Author 1"),
            vec![Some("A".into()), Some("D".into()), None]
        );
        assert_eq!(column(&df, "Author 3"), vec![Some("C".into()), None, None]);
    }

    #[test]
    fn test_widen_all_empty_creates_no_columns() {
        let mut df = df!(
            "Title" => &["p1"],
            "Keywords" => &[Some("Keywords: ")]
        )
        .unwrap();
        let width = widen_list_column(&mut df, "Keywords", "Keyword", split_keywords).unwrap();
        assert_eq!(width, 0);
        assert_eq!(df.width(), 1);
    }

    #[test]
    fn test_normalize_date() {
        let expected = NaiveDate::from_ymd_opt(2021, 3, 4).unwrap();
        assert_eq!(
            normalize_date("2021-03-04 13:45:00"),
            DateValue::Normalized(expected)
        );
        assert_eq!(normalize_date("2021-03-04"), DateValue::Normalized(expected));
        assert_eq!(
            normalize_date("2021-03-04T08:00:00+02:00"),
            DateValue::Normalized(expected)
        );
        assert_eq!(normalize_date("March 4, 2021"), DateValue::Normalized(expected));
        assert_eq!(
            normalize_date("March 2021"),
            DateValue::Normalized(NaiveDate::from_ymd_opt(2021, 3, 1).unwrap())
        );
        assert_eq!(
            normalize_date("2019"),
            DateValue::Normalized(NaiveDate::from_ymd_opt(2019, 1, 1).unwrap())
        );
        assert_eq!(
            normalize_date("Spring issue"),
            DateValue::Unparsed("Spring issue".to_string())
        );
    }

    #[test]
    fn test_normalize_date_column_reports_fallbacks() {
        let mut df = df!(
            "Publication Date" => &[Some("2020-01-02 10:00:00"), Some("n/a"), None]
        )
        .unwrap();

        let unparsed = normalize_date_column(&mut df, "Publication Date").unwrap();

        assert_eq!(unparsed, vec![1]);
        assert_eq!(
            column(&df, "Publication Date"),
            vec![Some("2020-01-02".into()), Some("n/a".into()), None]
        );
    }

    #[test]
    fn test_deduplicate_keeps_first() {
        let df = df!(
            "Title" => &["p1", "p1", "p1", "p2"],
            "Journal" => &["J", "J", "K", "J"],
            "Publication Date" => &["2020-01-01", "2020-01-01", "2020-01-01", "2020-01-01"],
            "Downloads" => &["5", "5", "5", "5"],
            "Note" => &["first", "second", "third", "fourth"]
        )
        .unwrap();

        let deduped = deduplicate(&df).unwrap();

        assert_eq!(deduped.height(), 3);
        assert_eq!(
            column(&deduped, "Note"),
            vec![Some("first".into()), Some("third".into()), Some("fourth".into())]
        );
    }

    #[test]
    fn test_deduplicate_treats_nulls_as_equal() {
        let df = df!(
            "Title" => &[Some("p1"), Some("p1")],
            "Journal" => &[None::<&str>, None]
        )
        .unwrap();
        assert_eq!(deduplicate(&df).unwrap().height(), 1);
    }

    #[test]
    fn test_left_join_keeps_unmatched_rows() {
        let publications = df!(
            "Title" => &["p1", "p2", "p3"],
            "Author 1" => &["A", "B", "C"]
        )
        .unwrap();
        let abstracts = df!(
            "Title" => &[Some("p1"), None, Some("p1"), Some("p3")],
            "Abstract" => &["first p1", "orphan", "second p1", "about p3"],
            "Keyword 1" => &[Some("k"), Some("x"), Some("k2"), None]
        )
        .unwrap();

        let merged = left_join_abstracts(&publications, &abstracts, 1).unwrap();

        assert_eq!(merged.height(), 3);
        assert_eq!(
            column(&merged, "Abstract"),
            vec![Some("first p1".into()), None, Some("about p3".into())]
        );
        assert_eq!(column(&merged, "Keyword 1"), vec![Some("k".into()), None, None]);
    }

    #[test]
    fn test_clean_and_merge_end_to_end() {
        let publications = df!(
            "Title" => &["p1", "p1", "p2"],
            "Journal" => &["J", "J", "J"],
            "Publication Date" => &["2020-05-06 12:00:00", "2020-05-06 12:00:00", "someday"],
            "Downloads" => &["10", "10", "3"],
            "Authors" => &["A; B, C", "A; B, C", "A, D"]
        )
        .unwrap();
        let abstracts = df!(
            "Title" => &["p1"],
            "Journal" => &["J"],
            "Publication Date" => &["2020-05-06"],
            "Downloads" => &["10"],
            "Abstract" => &["text"],
            "Keywords" => &["Keywords: graphs; networks"]
        )
        .unwrap();

        let cleaned = clean_and_merge(publications, abstracts).unwrap();

        assert_eq!(cleaned.author_width, 3);
        assert_eq!(cleaned.keyword_width, 2);
        assert_eq!(cleaned.unparsed_dates.publications, vec![2]);
        assert_eq!(cleaned.merged.height(), 2);
        assert_eq!(
            column(&cleaned.merged, "Publication Date"),
            vec![Some("2020-05-06".into()), Some("someday".into())]
        );
        assert_eq!(
            column(&cleaned.merged, "Author 3"),
            vec![Some("C".into()), None]
        );
        assert_eq!(
            column(&cleaned.merged, "Keyword 2"),
            vec![Some("networks".into()), None]
        );
        assert_eq!(column(&cleaned.merged, "Abstract"), vec![Some("text".into()), None]);
    }

    #[test]
    fn test_missing_title_fails() {
        let publications = df!("Name" => &["p1"], "Authors" => &["A"]).unwrap();
        let abstracts = df!("Title" => &["p1"]).unwrap();
        let err = clean_and_merge(publications, abstracts).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MissingColumn { table: "publications", .. }
        ));

        let publications = df!("Title" => &["p1"]).unwrap();
        let abstracts = df!("Heading" => &["p1"]).unwrap();
        let err = clean_and_merge(publications, abstracts).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::MissingColumn { table: "abstracts", .. }
        ));
    }

    #[test]
    fn test_run_missing_title_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let publications = dir.path().join("pubs.csv");
        let abstracts = dir.path().join("abstracts.csv");
        std::fs::write(&publications, "Name,Authors\np1,A\n").unwrap();
        std::fs::write(&abstracts, "Title,Abstract\np1,text\n").unwrap();
        let output = dir.path().join("merged");

        let config = CleanConfig {
            publications,
            abstracts,
            output: output.clone(),
        };
        assert!(run(&config).is_err());
        assert!(!output.exists());
        assert!(!dir.path().join("merged.xlsx").exists());
    }
}
