//! Layered graph builder: turn an aggregated flow table into the node/edge
//! lists a Sankey renderer consumes.
//!
//! Layer 1 holds start-side nodes, layer 2 the taxonomy labels, layer 3 the
//! end-side nodes. Ordering and coordinates depend only on the table, so the
//! same table always yields the same graph.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::aggregate::{FlowTable, NodeTotals};
use crate::error::{FlowError, Result};
use crate::key::{NodeKey, Side};
use crate::record::Dimension;
use crate::taxonomy::{TaxonomyLabel, with_opacity};

/// Horizontal position of each layer.
pub const LAYER_X: [f64; 3] = [0.15, 0.5, 0.85];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LayoutConfig {
    /// Vertical margin kept free at the top and bottom of every layer
    pub padding: f64,
    /// Opacity of layer-1/3 node colors
    pub node_opacity: f64,
    /// Opacity of edge colors
    pub link_opacity: f64,
    /// Case-insensitive substring of a category key (or `other:start`/`other:end`);
    /// matching nodes get `highlight_color`
    pub highlight: Option<String>,
    pub highlight_color: String,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            padding: 0.05,
            node_opacity: 0.6,
            link_opacity: 0.4,
            highlight: None,
            highlight_color: "#D62728".to_string(),
        }
    }
}

impl LayoutConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..0.5).contains(&self.padding) {
            return Err(FlowError::Configuration(format!(
                "layout padding must be in [0, 0.5), got {}",
                self.padding
            )));
        }
        for (name, v) in [("node_opacity", self.node_opacity), ("link_opacity", self.link_opacity)] {
            if !(0.0..=1.0).contains(&v) {
                return Err(FlowError::Configuration(format!("{name} must be in [0, 1], got {v}")));
            }
        }
        Ok(())
    }

    fn highlight_matcher(&self) -> Result<Option<Regex>> {
        let Some(keyword) = self.highlight.as_deref().map(str::trim).filter(|k| !k.is_empty()) else {
            return Ok(None);
        };
        RegexBuilder::new(&regex::escape(keyword))
            .case_insensitive(true)
            .build()
            .map(Some)
            .map_err(|e| FlowError::Configuration(format!("invalid highlight keyword: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique node id
    pub key: String,
    pub display_label: String,
    pub layer: u8,
    /// Position within the layer, 0 = top
    pub rank: usize,
    pub color: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source_index: usize,
    pub target_index: usize,
    pub amount: f64,
    pub label: TaxonomyLabel,
    pub color: String,
}

/// The finished three-layer graph.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSpec {
    pub nodes: Vec<Node>,
    pub edges: Vec<GraphEdge>,
}

impl GraphSpec {
    pub fn node(&self, key: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.key == key)
    }

    pub fn layer(&self, layer: u8) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(move |n| n.layer == layer)
    }

    /// Sum of edge amounts leaving `layer`.
    pub fn mass_leaving(&self, layer: u8) -> f64 {
        self.edges
            .iter()
            .filter(|e| self.nodes[e.source_index].layer == layer)
            .map(|e| e.amount)
            .sum()
    }
}

/// Build the graph for an aggregated (optionally reduced) table.
pub fn build_graph(table: &FlowTable, dimension: Dimension, cfg: &LayoutConfig) -> Result<GraphSpec> {
    cfg.validate()?;
    let highlight = cfg.highlight_matcher()?;

    let totals = table.node_totals();
    let dominant = dominant_labels(table);
    let total_mass = table.total_mass();

    let mut layers: [Vec<(&NodeKey, &NodeTotals)>; 3] = Default::default();
    for (key, t) in &totals {
        layers[usize::from(key.layer() - 1)].push((key, t));
    }
    for side in [0, 2] {
        layers[side].sort_by(|a, b| {
            a.0.is_other()
                .cmp(&b.0.is_other())
                .then_with(|| b.1.throughput().total_cmp(&a.1.throughput()))
                .then_with(|| a.0.cmp(b.0))
        });
    }
    // layer 2 is already in taxonomy order: BTreeMap order over `NodeKey::Label`

    let mut nodes = Vec::with_capacity(totals.len());
    let mut index: BTreeMap<&NodeKey, usize> = BTreeMap::new();
    for (li, layer) in layers.iter().enumerate() {
        let count = layer.len();
        for (rank, (key, t)) in layer.iter().enumerate() {
            let display = key.display(dimension);
            let (display_label, color) = match key {
                NodeKey::Label(label) => {
                    let pct = if total_mass > 0.0 { t.inflow / total_mass * 100.0 } else { 0.0 };
                    (format!("{display} ({pct:.1}%)"), label.color().to_string())
                }
                _ => {
                    let highlighted = match (&highlight, highlight_text(key)) {
                        (Some(re), Some(text)) => re.is_match(text),
                        _ => false,
                    };
                    let color = if highlighted {
                        cfg.highlight_color.clone()
                    } else {
                        let label = dominant.get(*key).copied().unwrap_or(TaxonomyLabel::NotApplicable);
                        with_opacity(label.color(), cfg.node_opacity)
                    };
                    (display, color)
                }
            };

            index.insert(*key, nodes.len());
            nodes.push(Node {
                key: key.to_string(),
                display_label,
                layer: key.layer(),
                rank,
                color,
                x: LAYER_X[li],
                y: spread(rank, count, cfg.padding),
            });
        }
    }

    let mut edges: Vec<GraphEdge> = table
        .edges()
        .iter()
        .filter_map(|e| {
            Some(GraphEdge {
                source_index: *index.get(&e.from)?,
                target_index: *index.get(&e.to)?,
                amount: e.total_amount,
                label: e.label,
                color: with_opacity(e.label.color(), cfg.link_opacity),
            })
        })
        .collect();
    edges.sort_by(|a, b| {
        (a.source_index, a.target_index, a.label).cmp(&(b.source_index, b.target_index, b.label))
    });

    tracing::debug!(nodes = nodes.len(), edges = edges.len(), "graph built");
    Ok(GraphSpec { nodes, edges })
}

/// Text a highlight keyword is matched against. Sentinels never match.
fn highlight_text(key: &NodeKey) -> Option<&str> {
    match key {
        NodeKey::Start(id) | NodeKey::End(id) => Some(id),
        NodeKey::Other(Side::Start) => Some("other:start"),
        NodeKey::Other(Side::End) => Some("other:end"),
        NodeKey::Sentinel(_) | NodeKey::Label(_) => None,
    }
}

/// Evenly spaced y in [padding, 1 - padding]; a lone node sits at 0.5.
fn spread(rank: usize, count: usize, padding: f64) -> f64 {
    if count <= 1 {
        return 0.5;
    }
    padding + rank as f64 * (1.0 - 2.0 * padding) / (count - 1) as f64
}

/// Label carrying the most mass through each layer-1/3 node.
/// Ties go to the label earlier in taxonomy order.
fn dominant_labels(table: &FlowTable) -> BTreeMap<NodeKey, TaxonomyLabel> {
    let mut per_node: BTreeMap<&NodeKey, BTreeMap<TaxonomyLabel, f64>> = BTreeMap::new();
    for e in table.edges() {
        let outer = if matches!(e.to, NodeKey::Label(_)) { &e.from } else { &e.to };
        *per_node.entry(outer).or_default().entry(e.label).or_insert(0.0) += e.total_amount;
    }

    per_node
        .into_iter()
        .filter_map(|(key, labels)| {
            let mut best: Option<(TaxonomyLabel, f64)> = None;
            for (label, amount) in labels {
                match best {
                    Some((_, top)) if amount <= top => {}
                    _ => best = Some((label, amount)),
                }
            }
            best.map(|(label, _)| (key.clone(), label))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{BrandLookup, Classifier};
    use crate::key::Sentinel;
    use crate::matcher::MatchedFlow;

    fn table() -> FlowTable {
        let brands = BrandLookup::from_pairs([("P1", "Acme"), ("P2", "Acme"), ("P3", "Globex")]);
        let c = Classifier::new("P1", &brands);
        FlowTable::aggregate(c.split_all([
            MatchedFlow::new(NodeKey::start("P1"), NodeKey::end("P1"), 4.0),
            MatchedFlow::new(NodeKey::start("P1"), NodeKey::end("P2"), 6.0),
            MatchedFlow::new(NodeKey::start("P3"), NodeKey::end("P1"), 2.0),
            MatchedFlow::new(NodeKey::Sentinel(Sentinel::NewEntity), NodeKey::end("P1"), 3.0),
        ]))
    }

    #[test]
    fn test_layers_and_coordinates() {
        let g = build_graph(&table(), Dimension::Product, &LayoutConfig::default()).unwrap();

        let l1: Vec<_> = g.layer(1).map(|n| n.key.as_str()).collect();
        assert_eq!(l1, vec!["start:P1", "sentinel:new_entity", "start:P3"]);
        let l2: Vec<_> = g.layer(2).map(|n| n.key.as_str()).collect();
        assert_eq!(
            l2,
            vec!["label:retained", "label:start_diff_brand", "label:start_new", "label:end_same_brand"]
        );

        let first = g.node("start:P1").unwrap();
        assert_eq!(first.x, 0.15);
        assert!((first.y - 0.05).abs() < 1e-12);
        let last = g.node("start:P3").unwrap();
        assert!((last.y - 0.95).abs() < 1e-12);
        assert!(g.layer(2).all(|n| n.x == 0.5));
        assert!(g.layer(3).all(|n| n.x == 0.85));
    }

    #[test]
    fn test_single_node_layer_is_centered() {
        let brands = BrandLookup::new();
        let c = Classifier::new("P1", &brands);
        let t = FlowTable::aggregate(c.split_all([MatchedFlow::new(
            NodeKey::start("P1"),
            NodeKey::end("P1"),
            1.0,
        )]));
        let g = build_graph(&t, Dimension::Product, &LayoutConfig::default()).unwrap();
        assert_eq!(g.nodes.len(), 3);
        assert!(g.nodes.iter().all(|n| n.y == 0.5));
    }

    #[test]
    fn test_label_percentages_and_mass_balance() {
        let g = build_graph(&table(), Dimension::Product, &LayoutConfig::default()).unwrap();
        assert_eq!(g.node("label:retained").unwrap().display_label, "Retained (26.7%)");
        assert_eq!(g.node("label:end_same_brand").unwrap().display_label, "Switched out (same brand) (40.0%)");
        assert!((g.mass_leaving(1) - g.mass_leaving(2)).abs() < 1e-9);
    }

    #[test]
    fn test_colors_and_highlight() {
        let cfg = LayoutConfig {
            highlight: Some("p3".to_string()),
            ..LayoutConfig::default()
        };
        let g = build_graph(&table(), Dimension::Product, &cfg).unwrap();
        assert_eq!(g.node("start:P3").unwrap().color, "#D62728");
        assert_eq!(g.node("label:retained").unwrap().color, TaxonomyLabel::Retained.color());
        // P1 on the start side carries 6 end-same-brand vs 4 retained
        assert_eq!(
            g.node("start:P1").unwrap().color,
            with_opacity(TaxonomyLabel::EndSameBrand.color(), 0.6)
        );
    }

    #[test]
    fn test_other_bucket_pinned_last() {
        let mut t = table();
        t = t.remap(|k| match k {
            NodeKey::Start(id) if id == "P1" => NodeKey::Other(Side::Start),
            other => other.clone(),
        });
        let g = build_graph(&t, Dimension::Product, &LayoutConfig::default()).unwrap();
        assert_eq!(g.layer(1).last().unwrap().key, "other:start");
    }

    #[test]
    fn test_edges_sorted_and_indexed() {
        let g = build_graph(&table(), Dimension::Product, &LayoutConfig::default()).unwrap();
        for w in g.edges.windows(2) {
            assert!((w[0].source_index, w[0].target_index) <= (w[1].source_index, w[1].target_index));
        }
        assert!(g.edges.iter().all(|e| e.source_index < g.nodes.len() && e.target_index < g.nodes.len()));
    }

    #[test]
    fn test_bad_padding_rejected() {
        let cfg = LayoutConfig {
            padding: 0.7,
            ..LayoutConfig::default()
        };
        assert!(build_graph(&table(), Dimension::Product, &cfg).is_err());
    }

    #[test]
    fn test_highlight_ignores_sentinel_wording() {
        let cfg = LayoutConfig {
            highlight: Some("new".to_string()),
            ..LayoutConfig::default()
        };
        let g = build_graph(&table(), Dimension::Product, &cfg).unwrap();
        let sentinel = g.node("sentinel:new_entity").unwrap();
        assert_eq!(sentinel.display_label, "New account");
        assert_ne!(sentinel.color, cfg.highlight_color);
        assert!(g.nodes.iter().all(|n| n.color != cfg.highlight_color));
    }

    #[test]
    fn test_highlight_matches_other_bucket() {
        let t = table().remap(|k| match k {
            NodeKey::Start(id) if id == "P3" => NodeKey::Other(Side::Start),
            other => other.clone(),
        });
        let cfg = LayoutConfig {
            highlight: Some("OTHER".to_string()),
            ..LayoutConfig::default()
        };
        let g = build_graph(&t, Dimension::Product, &cfg).unwrap();
        assert_eq!(g.node("other:start").unwrap().color, "#D62728");
        assert_ne!(g.node("start:P1").unwrap().color, "#D62728");
    }
}
