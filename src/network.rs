use petgraph::graph::{NodeIndex, UnGraph};
use serde::de::DeserializeOwned;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use tracing::debug;

use crate::coauthorship::{EdgeRecord, NodeRecord};
use crate::error::{PipelineError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    pub id: String,
    pub label: String,
}

/// Simple undirected graph; edge weights count co-authored publications.
pub type AuthorGraph = UnGraph<Author, u32>;

#[derive(Debug, Clone, Default)]
pub struct CoauthorNetwork {
    pub graph: AuthorGraph,
    index: HashMap<String, NodeIndex>,
}

impl CoauthorNetwork {
    /// Collapse the edge multiset into a simple graph and attach labels.
    ///
    /// Repeated pairs (in either direction) become one edge whose weight is
    /// the number of repeats. Self-pairs are dropped. Nodes appear in
    /// edge order, followed by node-table entries with no edges; only
    /// node-table entries carry a label.
    pub fn from_records(nodes: &[NodeRecord], edges: &[EdgeRecord]) -> Self {
        let mut network = CoauthorNetwork::default();

        for edge in edges {
            let source = edge.source.trim();
            let target = edge.target.trim();
            if source.is_empty() || target.is_empty() || source == target {
                debug!(source, target, "Skipping degenerate edge");
                continue;
            }

            let a = network.add_author(source);
            let b = network.add_author(target);
            match network.graph.find_edge(a, b) {
                Some(existing) => network.graph[existing] += 1,
                None => {
                    network.graph.add_edge(a, b, 1);
                }
            }
        }

        for node in nodes {
            let id = node.id.trim();
            if id.is_empty() {
                continue;
            }
            let idx = network.add_author(id);
            network.graph[idx].label = node.label.clone().unwrap_or_default();
        }

        debug!(
            nodes = network.graph.node_count(),
            edges = network.graph.edge_count(),
            "Built co-authorship graph"
        );
        network
    }

    fn add_author(&mut self, id: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(id) {
            return idx;
        }
        let idx = self.graph.add_node(Author {
            id: id.to_string(),
            label: String::new(),
        });
        self.index.insert(id.to_string(), idx);
        idx
    }

    pub fn node(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    /// Number of publications two authors share, if they share any.
    pub fn weight(&self, a: &str, b: &str) -> Option<u32> {
        let edge = self.graph.find_edge(self.node(a)?, self.node(b)?)?;
        self.graph.edge_weight(edge).copied()
    }

    pub fn degree(&self, node: NodeIndex) -> usize {
        self.graph.neighbors(node).count()
    }
}

fn read_records<T: DeserializeOwned>(
    path: &Path,
    table: &'static str,
    required: &[&str],
) -> Result<Vec<T>> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::Headers)
        .from_path(path)?;

    let headers = reader.headers()?.clone();
    for column in required {
        if !headers.iter().any(|h| h == *column) {
            return Err(PipelineError::missing(table, *column));
        }
    }

    let records = reader.deserialize().collect::<std::result::Result<Vec<T>, _>>()?;
    Ok(records)
}

/// Read an `Id[,Label]` node table.
pub fn read_nodes(path: &Path) -> Result<Vec<NodeRecord>> {
    read_records(path, "nodes", &["Id"])
}

/// Read a `Source,Target` edge table.
pub fn read_edges(path: &Path) -> Result<Vec<EdgeRecord>> {
    read_records(path, "edges", &["Source", "Target"])
}

/// Centrality scores of one author, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Centrality {
    pub degree: f64,
    pub closeness: f64,
    pub betweenness: f64,
}

/// All three centralities, indexed by `NodeIndex::index()`.
pub fn centralities<N, E>(graph: &UnGraph<N, E>) -> Vec<Centrality> {
    let degree = degree_centrality(graph);
    let closeness = closeness_centrality(graph);
    let betweenness = betweenness_centrality(graph);

    (0..graph.node_count())
        .map(|i| Centrality {
            degree: degree[i],
            closeness: closeness[i],
            betweenness: betweenness[i],
        })
        .collect()
}

/// Fraction of the other nodes each node is adjacent to. A lone node scores 1.
pub fn degree_centrality<N, E>(graph: &UnGraph<N, E>) -> Vec<f64> {
    let n = graph.node_count();
    if n <= 1 {
        return vec![1.0; n];
    }
    let scale = 1.0 / (n - 1) as f64;
    graph
        .node_indices()
        .map(|node| graph.neighbors(node).count() as f64 * scale)
        .collect()
}

/// Inverse mean distance to the reachable nodes, scaled by the share of the
/// graph that is reachable (Wasserman–Faust), so isolated authors score 0.
pub fn closeness_centrality<N, E>(graph: &UnGraph<N, E>) -> Vec<f64> {
    let n = graph.node_count();
    graph
        .node_indices()
        .map(|node| {
            let distances = bfs_distances(graph, node);
            let reached: Vec<usize> = distances.into_iter().flatten().collect();
            let total: usize = reached.iter().sum();
            let others = reached.len().saturating_sub(1);
            if total == 0 || n <= 1 {
                return 0.0;
            }
            let closeness = others as f64 / total as f64;
            closeness * others as f64 / (n - 1) as f64
        })
        .collect()
}

/// Share of shortest paths between other pairs that run through each node,
/// computed with Brandes' algorithm.
pub fn betweenness_centrality<N, E>(graph: &UnGraph<N, E>) -> Vec<f64> {
    let n = graph.node_count();
    let mut betweenness = vec![0.0; n];
    if n <= 2 {
        return betweenness;
    }

    for s in graph.node_indices() {
        let mut stack: Vec<NodeIndex> = Vec::with_capacity(n);
        let mut pred: Vec<Vec<NodeIndex>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0_f64; n];
        let mut dist: Vec<Option<usize>> = vec![None; n];
        sigma[s.index()] = 1.0;
        dist[s.index()] = Some(0);

        let mut queue = VecDeque::from([s]);
        while let Some(v) = queue.pop_front() {
            stack.push(v);
            let next = dist[v.index()].map(|d| d + 1);
            for w in graph.neighbors(v) {
                if dist[w.index()].is_none() {
                    dist[w.index()] = next;
                    queue.push_back(w);
                }
                if dist[w.index()] == next {
                    sigma[w.index()] += sigma[v.index()];
                    pred[w.index()].push(v);
                }
            }
        }

        let mut delta = vec![0.0_f64; n];
        while let Some(w) = stack.pop() {
            for &v in &pred[w.index()] {
                delta[v.index()] += sigma[v.index()] / sigma[w.index()] * (1.0 + delta[w.index()]);
            }
            if w != s {
                betweenness[w.index()] += delta[w.index()];
            }
        }
    }

    // Each unordered pair was counted from both ends.
    let scale = 1.0 / ((n - 1) * (n - 2)) as f64;
    for value in &mut betweenness {
        *value *= scale;
    }
    betweenness
}

fn bfs_distances<N, E>(graph: &UnGraph<N, E>, source: NodeIndex) -> Vec<Option<usize>> {
    let mut dist = vec![None; graph.node_count()];
    dist[source.index()] = Some(0);

    let mut queue = VecDeque::from([(source, 0)]);
    while let Some((current, d)) = queue.pop_front() {
        for neighbor in graph.neighbors(current) {
            if dist[neighbor.index()].is_none() {
                dist[neighbor.index()] = Some(d + 1);
                queue.push_back((neighbor, d + 1));
            }
        }
    }

    dist
}
