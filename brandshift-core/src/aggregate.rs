//! Flow aggregation: sum split flow edges from every account into one table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::classify::FlowEdge;
use crate::key::NodeKey;
use crate::taxonomy::{FlowType, TaxonomyLabel};

/// Summed amount of every edge sharing (from, to, flow type, label).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregatedEdge {
    pub from: NodeKey,
    pub to: NodeKey,
    pub flow_type: FlowType,
    pub label: TaxonomyLabel,
    pub total_amount: f64,
}

impl From<AggregatedEdge> for FlowEdge {
    fn from(e: AggregatedEdge) -> Self {
        FlowEdge {
            from: e.from,
            to: e.to,
            amount: e.total_amount,
            label: e.label,
            flow_type: e.flow_type,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NodeTotals {
    pub inflow: f64,
    pub outflow: f64,
}

impl NodeTotals {
    pub fn total(&self) -> f64 {
        self.inflow + self.outflow
    }

    /// Larger of the two sides; for layer-1/3 nodes only one side is non-zero.
    pub fn throughput(&self) -> f64 {
        self.inflow.max(self.outflow)
    }
}

type EdgeKey = (NodeKey, NodeKey, FlowType, TaxonomyLabel);

/// Aggregated edge table, sorted by (from, to, flow type, label).
/// Every stored amount is strictly positive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowTable {
    edges: Vec<AggregatedEdge>,
}

impl FlowTable {
    /// Sum edges by key. Summation follows input order, so a fixed input order
    /// gives bit-identical totals.
    pub fn aggregate(edges: impl IntoIterator<Item = FlowEdge>) -> Self {
        let mut sums: BTreeMap<EdgeKey, f64> = BTreeMap::new();
        for e in edges {
            *sums.entry((e.from, e.to, e.flow_type, e.label)).or_insert(0.0) += e.amount;
        }

        let edges = sums
            .into_iter()
            .filter(|(_, amount)| *amount > 0.0)
            .map(|((from, to, flow_type, label), total_amount)| AggregatedEdge {
                from,
                to,
                flow_type,
                label,
                total_amount,
            })
            .collect();
        Self { edges }
    }

    pub fn edges(&self) -> &[AggregatedEdge] {
        &self.edges
    }

    pub fn len(&self) -> usize {
        self.edges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// The table as plain flow edges, e.g. for re-aggregation.
    pub fn flow_edges(&self) -> impl Iterator<Item = FlowEdge> + '_ {
        self.edges.iter().cloned().map(FlowEdge::from)
    }

    /// Rename nodes and merge edges that collide afterwards.
    pub fn remap(&self, f: impl Fn(&NodeKey) -> NodeKey) -> Self {
        Self::aggregate(self.flow_edges().map(|mut e| {
            e.from = f(&e.from);
            e.to = f(&e.to);
            e
        }))
    }

    /// Inflow and outflow for every node.
    pub fn node_totals(&self) -> BTreeMap<NodeKey, NodeTotals> {
        let mut totals: BTreeMap<NodeKey, NodeTotals> = BTreeMap::new();
        for e in &self.edges {
            totals.entry(e.from.clone()).or_default().outflow += e.total_amount;
            totals.entry(e.to.clone()).or_default().inflow += e.total_amount;
        }
        totals
    }

    /// Total mass entering the taxonomy layer.
    pub fn total_mass(&self) -> f64 {
        self.edges
            .iter()
            .filter(|e| e.flow_type == FlowType::StartToLabel)
            .map(|e| e.total_amount)
            .sum()
    }

    /// Total mass per label, in taxonomy order.
    pub fn label_totals(&self) -> BTreeMap<TaxonomyLabel, f64> {
        let mut out = BTreeMap::new();
        for e in self.edges.iter().filter(|e| e.flow_type == FlowType::StartToLabel) {
            *out.entry(e.label).or_insert(0.0) += e.total_amount;
        }
        out
    }
}
