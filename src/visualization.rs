//! Stage 3: render the co-authorship graph as an interactive Plotly page.

use petgraph::visit::EdgeRef;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::config::VisualizeConfig;
use crate::error::Result;
use crate::layout::{spring_layout, LayoutConfig, Position};
use crate::network::{centralities, read_edges, read_nodes, Centrality, CoauthorNetwork};

const PLOTLY_CDN: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";
const DIV_ID: &str = "network_graph";
const TITLE: &str = "Interactive Social Network Analysis Graph";
const FONT_FAMILY: &str = "SimHei";

const COLORSCALE: [(f64, &str); 3] = [
    (0.0, "rgb(255, 160, 169)"),
    (0.5, "rgb(255, 69, 0)"),
    (1.0, "rgb(139, 0, 0)"),
];

const LEGEND: &str = "<b>Social Network Analysis Centrality Measures:</b><br>\
- Degree Centrality: Represents the number of other nodes connected to this node.<br>\
- Closeness Centrality: Represents the inverse of the average shortest path length from this node to all other nodes.<br>\
- Betweenness Centrality: Represents the importance of this node as a bridge between other nodes in the network.";

/// One author as drawn.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeView {
    pub label: String,
    pub position: Position,
    pub centrality: Centrality,
    /// Number of distinct co-authors
    pub degree: usize,
}

impl NodeView {
    fn metrics(&self) -> String {
        format!(
            "Degree Centrality: {:.3}<br>Closeness Centrality: {:.3}<br>Betweenness Centrality: {:.3}",
            self.centrality.degree, self.centrality.closeness, self.centrality.betweenness
        )
    }

    /// Tooltip shown while the whole graph is in view.
    pub fn hover_text(&self) -> String {
        format!("Node: {}<br>{}", self.label, self.metrics())
    }

    /// Label drawn next to the marker once zoomed in.
    pub fn info_text(&self) -> String {
        format!("{}<br>{}", self.label, self.metrics())
    }

    pub fn marker_size(&self) -> f64 {
        10.0 + 30.0 * self.centrality.degree
    }
}

/// Nodes with their scores, ordered by ascending degree centrality.
pub fn node_views(
    network: &CoauthorNetwork,
    positions: &[Position],
    scores: &[Centrality],
) -> Vec<NodeView> {
    let mut views: Vec<NodeView> = network
        .graph
        .node_indices()
        .map(|idx| NodeView {
            label: network.graph[idx].label.clone(),
            position: positions[idx.index()],
            centrality: scores[idx.index()],
            degree: network.degree(idx),
        })
        .collect();
    views.sort_by(|a, b| a.centrality.degree.total_cmp(&b.centrality.degree));
    views
}

/// Plotly `data` and `layout` for the edge and node traces.
pub fn build_figure(network: &CoauthorNetwork, positions: &[Position], views: &[NodeView]) -> Value {
    let mut edge_x: Vec<Option<f64>> = Vec::with_capacity(network.graph.edge_count() * 3);
    let mut edge_y: Vec<Option<f64>> = Vec::with_capacity(network.graph.edge_count() * 3);
    for edge in network.graph.edge_references() {
        let from = positions[edge.source().index()];
        let to = positions[edge.target().index()];
        edge_x.extend([Some(from.x), Some(to.x), None]);
        edge_y.extend([Some(from.y), Some(to.y), None]);
    }

    let edge_trace = json!({
        "type": "scatter",
        "x": edge_x,
        "y": edge_y,
        "line": { "width": 0.5, "color": "#888" },
        "hoverinfo": "none",
        "mode": "lines"
    });

    let colorscale: Vec<Value> = COLORSCALE
        .iter()
        .map(|(stop, color)| json!([stop, color]))
        .collect();

    let node_trace = json!({
        "type": "scatter",
        "x": views.iter().map(|v| v.position.x).collect::<Vec<_>>(),
        "y": views.iter().map(|v| v.position.y).collect::<Vec<_>>(),
        "mode": "markers+text",
        "text": [],
        "textposition": "top center",
        "hoverinfo": "text",
        "hovertext": views.iter().map(NodeView::hover_text).collect::<Vec<_>>(),
        "marker": {
            "showscale": true,
            "colorscale": colorscale,
            "reversescale": false,
            "color": views.iter().map(|v| v.degree).collect::<Vec<_>>(),
            "size": views.iter().map(NodeView::marker_size).collect::<Vec<_>>(),
            "colorbar": {
                "thickness": 15,
                "title": { "text": "Node Degree", "side": "right" },
                "xanchor": "left"
            },
            "line": { "width": 2 }
        },
        "textfont": { "size": 10, "family": FONT_FAMILY }
    });

    let hidden_axis = json!({ "showgrid": false, "zeroline": false, "showticklabels": false });

    json!({
        "data": [edge_trace, node_trace],
        "layout": {
            "title": { "text": format!("<br>{TITLE}"), "font": { "size": 16 } },
            "showlegend": false,
            "hovermode": "closest",
            "margin": { "b": 20, "l": 5, "r": 5, "t": 40 },
            "annotations": [{
                "text": LEGEND,
                "showarrow": false,
                "xref": "paper",
                "yref": "paper",
                "x": 0.01,
                "y": 0.01,
                "align": "left",
                "bordercolor": "#c7c7c7",
                "borderwidth": 1,
                "borderpad": 4,
                "bgcolor": "rgba(255,255,255,0.8)",
                "font": { "family": FONT_FAMILY, "size": 10, "color": "#000000" }
            }],
            "xaxis": hidden_axis,
            "yaxis": hidden_axis,
            "font": { "family": FONT_FAMILY, "size": 10 },
            "paper_bgcolor": "white",
            "plot_bgcolor": "white"
        }
    })
}

const PAGE_HEAD: &str = r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8" />
<title>@TITLE@</title>
<script src="@PLOTLY@" charset="utf-8"></script>
</head>
<body>
<div id="@DIV@" style="width:100%;height:100vh;"></div>
<script type="text/javascript">
var figure = "#;

const PAGE_MIDDLE: &str = ";\nvar nodeInfo = ";

const PAGE_TAIL: &str = r#";
Plotly.newPlot('@DIV@', figure.data, figure.layout, {"scrollZoom": true, "responsive": true});
var fig = document.getElementById('@DIV@');
fig.on('plotly_relayout', function(eventData) {
    var zoomed = eventData['xaxis.range[0]'] !== undefined && eventData['xaxis.range[1]'] !== undefined;
    // Zoomed in: print each node's details beside it. Full view: tooltips only.
    var text = zoomed ? nodeInfo : Array(nodeInfo.length).fill('');
    var hoverinfo = zoomed ? 'skip' : 'text';
    Plotly.restyle(fig, {'text': [text], 'hoverinfo': [hoverinfo]}, [1]);
});
</script>
</body>
</html>
"#;

/// JSON safe to inline in a `<script>` element.
fn script_json<T: serde::Serialize + ?Sized>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?.replace("</", "<\\/"))
}

fn fill_static(template: &str) -> String {
    template
        .replace("@TITLE@", TITLE)
        .replace("@PLOTLY@", PLOTLY_CDN)
        .replace("@DIV@", DIV_ID)
}

/// A standalone HTML page drawing `figure`, with zoom-dependent node labels.
///
/// Only the fixed template is searched for placeholders; the figure and node
/// info are appended verbatim.
pub fn render_html(figure: &Value, views: &[NodeView]) -> Result<String> {
    let info: Vec<String> = views.iter().map(NodeView::info_text).collect();
    let figure = script_json(figure)?;
    let info = script_json(&info)?;

    let head = fill_static(PAGE_HEAD);
    let tail = fill_static(PAGE_TAIL);
    let mut page = String::with_capacity(
        head.len() + figure.len() + PAGE_MIDDLE.len() + info.len() + tail.len(),
    );
    page.push_str(&head);
    page.push_str(&figure);
    page.push_str(PAGE_MIDDLE);
    page.push_str(&info);
    page.push_str(&tail);
    Ok(page)
}

/// Score, lay out and render a network, in memory.
pub fn render_network(network: &CoauthorNetwork, layout: &LayoutConfig) -> Result<String> {
    let scores = centralities(&network.graph);
    let positions = spring_layout(&network.graph, layout);
    let views = node_views(network, &positions, &scores);
    let figure = build_figure(network, &positions, &views);

    debug!(
        nodes = views.len(),
        edges = network.graph.edge_count(),
        "Rendered network figure"
    );
    render_html(&figure, &views)
}

/// Read the node and edge tables and write the HTML page.
pub fn run(config: &VisualizeConfig) -> Result<CoauthorNetwork> {
    let nodes = read_nodes(&config.nodes)?;
    let edges = read_edges(&config.edges)?;
    let network = CoauthorNetwork::from_records(&nodes, &edges);

    let layout = LayoutConfig {
        iterations: config.iterations,
        seed: config.seed,
        ..LayoutConfig::default()
    };
    let html = render_network(&network, &layout)?;

    std::fs::write(&config.output, html)?;
    info!("The graph has been saved as {}", config.output.display());
    Ok(network)
}
