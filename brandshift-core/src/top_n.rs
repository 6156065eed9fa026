//! Top-N reduction: keep the N busiest category keys per side and fold the
//! rest into an "other" bucket.
//!
//! The focal key, sentinels and taxonomy labels are never collapsed.
//! Ties at the cutoff go to the lexicographically smaller key.

use std::collections::BTreeSet;

use crate::aggregate::FlowTable;
use crate::key::{NodeKey, Side};

/// Collapse all but the top `n` start keys and top `n` end keys.
pub fn reduce_top_n(table: &FlowTable, n: usize, focal: &str) -> FlowTable {
    let totals = table.node_totals();

    let mut kept: BTreeSet<NodeKey> = BTreeSet::new();
    let mut collapsed = 0usize;
    for side in [Side::Start, Side::End] {
        let mut ranked: Vec<(&NodeKey, f64)> = totals
            .iter()
            .filter(|(k, _)| on_side(k, side) && k.identifier() != Some(focal))
            .map(|(k, t)| (k, t.total()))
            .collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));

        collapsed += ranked.len().saturating_sub(n);
        kept.extend(ranked.into_iter().take(n).map(|(k, _)| k.clone()));
    }

    tracing::debug!(n, collapsed, "top-n reduction");
    if collapsed == 0 {
        return table.clone();
    }

    table.remap(|key| match key {
        NodeKey::Start(id) if id != focal && !kept.contains(key) => NodeKey::Other(Side::Start),
        NodeKey::End(id) if id != focal && !kept.contains(key) => NodeKey::Other(Side::End),
        other => other.clone(),
    })
}

fn on_side(key: &NodeKey, side: Side) -> bool {
    matches!(
        (key, side),
        (NodeKey::Start(_), Side::Start) | (NodeKey::End(_), Side::End)
    )
}
