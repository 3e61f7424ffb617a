//! Stage 2: turn the merged table into co-authorship node and edge lists.

use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::{debug, info};

use crate::cleaning::{AUTHOR_PREFIX, TITLE};
use crate::config::ExtractConfig;
use crate::error::{PipelineError, Result};
use crate::table::{column_names, has_column, read_table, text_column};

/// Row of the node table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    #[serde(rename = "Id")]
    pub id: String,
    #[serde(rename = "Label", default)]
    pub label: Option<String>,
}

/// Row of the edge table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    #[serde(rename = "Source")]
    pub source: String,
    #[serde(rename = "Target")]
    pub target: String,
}

/// Width of the `Author 1..=width` run in a merged table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthorSchema {
    pub width: usize,
}

impl AuthorSchema {
    /// Find the highest `Author <n>` suffix among the column names.
    ///
    /// Every column from `Author 1` up to that suffix must exist.
    pub fn discover(df: &DataFrame) -> Result<Self> {
        let width = column_names(df)
            .iter()
            .filter_map(|name| author_index(name))
            .max()
            .ok_or(PipelineError::NoAuthorColumns("merged"))?;

        let schema = AuthorSchema { width };
        for column in schema.column_names() {
            if !has_column(df, &column) {
                return Err(PipelineError::missing("merged", column));
            }
        }
        Ok(schema)
    }

    pub fn column_names(&self) -> Vec<String> {
        (1..=self.width)
            .map(|i| format!("{AUTHOR_PREFIX} {i}"))
            .collect()
    }
}

fn author_index(column: &str) -> Option<usize> {
    column
        .strip_prefix(AUTHOR_PREFIX)?
        .strip_prefix(' ')?
        .parse::<usize>()
        .ok()
        .filter(|&i| i > 0)
}

/// Per-row author lists: the non-null `Author n` values in column order.
pub fn author_lists(df: &DataFrame, schema: AuthorSchema) -> Result<Vec<Vec<String>>> {
    let columns = schema
        .column_names()
        .iter()
        .map(|name| text_column(df, name))
        .collect::<Result<Vec<_>>>()?;

    let lists = (0..df.height())
        .map(|row| {
            columns
                .iter()
                .filter_map(|col| col.get(row))
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect()
        })
        .collect();
    Ok(lists)
}

/// Node and edge lists of the co-authorship network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CoauthorLists {
    /// Every author, in order of first appearance.
    pub nodes: Vec<String>,
    /// One entry per co-authored pair per publication; repeats are kept.
    pub edges: Vec<(String, String)>,
}

impl CoauthorLists {
    pub fn node_records(&self) -> Vec<NodeRecord> {
        self.nodes
            .iter()
            .map(|id| NodeRecord {
                id: id.clone(),
                label: Some(id.clone()),
            })
            .collect()
    }

    pub fn edge_records(&self) -> Vec<EdgeRecord> {
        self.edges
            .iter()
            .map(|(source, target)| EdgeRecord {
                source: source.clone(),
                target: target.clone(),
            })
            .collect()
    }
}

/// Pair up every two authors of each publication.
pub fn coauthorship_pairs(lists: &[Vec<String>]) -> CoauthorLists {
    let mut seen = HashSet::new();
    let mut result = CoauthorLists::default();

    for authors in lists {
        for i in 0..authors.len() {
            for j in i + 1..authors.len() {
                if authors[i] == authors[j] {
                    continue;
                }
                result.edges.push((authors[i].clone(), authors[j].clone()));
            }
        }

        for author in authors {
            if seen.insert(author.clone()) {
                result.nodes.push(author.clone());
            }
        }
    }

    result
}

/// Extract the co-authorship lists from a merged table, in memory.
pub fn extract(df: &DataFrame) -> Result<CoauthorLists> {
    if !has_column(df, TITLE) {
        return Err(PipelineError::missing("merged", TITLE));
    }
    let schema = AuthorSchema::discover(df)?;
    let lists = author_lists(df, schema)?;
    let result = coauthorship_pairs(&lists);

    debug!(
        author_columns = schema.width,
        nodes = result.nodes.len(),
        edges = result.edges.len(),
        "Extracted co-authorship network"
    );
    Ok(result)
}

fn write_records<T: Serialize>(path: &Path, records: &[T]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

/// Write the `Id,Label` node table.
pub fn write_nodes(path: &Path, lists: &CoauthorLists) -> Result<()> {
    if lists.nodes.is_empty() {
        write_header(path, &["Id", "Label"])
    } else {
        write_records(path, &lists.node_records())
    }
}

/// Write the `Source,Target` edge table.
pub fn write_edges(path: &Path, lists: &CoauthorLists) -> Result<()> {
    if lists.edges.is_empty() {
        write_header(path, &["Source", "Target"])
    } else {
        write_records(path, &lists.edge_records())
    }
}

// csv only emits serde headers alongside the first record.
fn write_header(path: &Path, header: &[&str]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(header)?;
    writer.flush()?;
    Ok(())
}

/// Read the merged workbook and write the node and edge tables.
pub fn run(config: &ExtractConfig) -> Result<CoauthorLists> {
    let df = read_table(&config.input)?;
    let lists = extract(&df)?;

    write_nodes(&config.nodes, &lists)?;
    info!("Node data has been saved to: {}", config.nodes.display());
    write_edges(&config.edges, &lists)?;
    info!("Edge data has been saved to: {}", config.edges.display());

    Ok(lists)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair(a: &str, b: &str) -> (String, String) {
        (a.to_string(), b.to_string())
    }

    fn list(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_three_authors_give_three_edges() {
        let result = coauthorship_pairs(&[list(&["A", "B", "C"])]);
        assert_eq!(
            result.edges,
            vec![pair("A", "B"), pair("A", "C"), pair("B", "C")]
        );
        assert_eq!(result.nodes, list(&["A", "B", "C"]));
    }

    #[test]
    fn test_single_author_is_a_node_without_edges() {
        let result = coauthorship_pairs(&[list(&["Solo"])]);
        assert!(result.edges.is_empty());
        assert_eq!(result.nodes, list(&["Solo"]));
    }

    #[test]
    fn test_repeated_pairs_are_kept() {
        let result = coauthorship_pairs(&[list(&["A", "B"]), list(&["B", "A"])]);
        assert_eq!(result.edges, vec![pair("A", "B"), pair("B", "A")]);
        assert_eq!(result.nodes.len(), 2);
    }

    #[test]
    fn test_same_name_twice_is_not_paired() {
        let result = coauthorship_pairs(&[list(&["A", "A", "B"])]);
        assert_eq!(result.edges, vec![pair("A", "B"), pair("A", "B")]);
    }

    #[test]
    fn test_extract_from_merged_table() {
        let df = df!(
            "Title" => &["p1", "p2"],
            "Author 1" => &[Some("A"), Some("A")],
            "Author 2" => &[Some("B"), Some("D")],
            "Author 3" => &[Some("C"), None],
            "Abstract" => &[None::<&str>, None]
        )
        .unwrap();

        let result = extract(&df).unwrap();

        assert_eq!(result.nodes, list(&["A", "B", "C", "D"]));
        assert_eq!(
            result.edges,
            vec![pair("A", "B"), pair("A", "C"), pair("B", "C"), pair("A", "D")]
        );
    }

    #[test]
    fn test_schema_takes_highest_suffix() {
        let df = df!(
            "Author 2" => &["B"],
            "Title" => &["p"],
            "Author 1" => &["A"],
            "Authorship" => &["x"]
        )
        .unwrap();
        assert_eq!(AuthorSchema::discover(&df).unwrap().width, 2);
    }

    #[test]
    fn test_schema_gap_is_fatal() {
        let df = df!("Title" => &["p"], "Author 1" => &["A"], "Author 3" => &["C"]).unwrap();
        let err = AuthorSchema::discover(&df).unwrap_err();
        assert!(matches!(err, PipelineError::MissingColumn { ref column, .. } if column == "Author 2"));
    }

    #[test]
    fn test_missing_columns_are_fatal() {
        let no_authors = df!("Title" => &["p"]).unwrap();
        assert!(matches!(
            extract(&no_authors).unwrap_err(),
            PipelineError::NoAuthorColumns(_)
        ));

        let no_title = df!("Author 1" => &["A"]).unwrap();
        assert!(matches!(
            extract(&no_title).unwrap_err(),
            PipelineError::MissingColumn { .. }
        ));
    }

    #[test]
    fn test_write_tables() {
        let dir = tempfile::tempdir().unwrap();
        let nodes = dir.path().join("nodes.csv");
        let edges = dir.path().join("edges.csv");
        let result = coauthorship_pairs(&[list(&["A", "B"])]);

        write_nodes(&nodes, &result).unwrap();
        write_edges(&edges, &result).unwrap();

        assert_eq!(
            std::fs::read_to_string(&nodes).unwrap(),
            "Id,Label\nA,A\nB,B\n"
        );
        assert_eq!(
            std::fs::read_to_string(&edges).unwrap(),
            "Source,Target\nA,B\n"
        );
    }

    #[test]
    fn test_write_empty_edges_keeps_header() {
        let dir = tempfile::tempdir().unwrap();
        let edges = dir.path().join("edges.csv");
        write_edges(&edges, &coauthorship_pairs(&[list(&["Solo"])])).unwrap();
        assert_eq!(std::fs::read_to_string(&edges).unwrap(), "Source,Target\n");
    }
}
