//! Node identities for the three-layer flow graph.
//!
//! A key carries its side explicitly, so a product seen in both periods is two
//! distinct nodes (`Start("P1")` and `End("P1")`) without any string tagging.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::record::Dimension;
use crate::taxonomy::TaxonomyLabel;

/// Period side of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Start,
    End,
}

/// Synthetic endpoints standing in for a missing counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentinel {
    /// Account has no start-period records at all
    NewEntity,
    /// Account has no end-period records at all
    ChurnedEntity,
    /// End-period amount left over after matching
    NewCategory,
    /// Start-period amount left over after matching
    ChurnedCategory,
}

impl Sentinel {
    pub fn side(&self) -> Side {
        match self {
            Sentinel::NewEntity | Sentinel::NewCategory => Side::Start,
            Sentinel::ChurnedEntity | Sentinel::ChurnedCategory => Side::End,
        }
    }

    fn id(&self) -> &'static str {
        match self {
            Sentinel::NewEntity => "new_entity",
            Sentinel::ChurnedEntity => "churned_entity",
            Sentinel::NewCategory => "new_category",
            Sentinel::ChurnedCategory => "churned_category",
        }
    }

    pub fn display(&self, dimension: Dimension) -> String {
        match self {
            Sentinel::NewEntity => "New account".to_string(),
            Sentinel::ChurnedEntity => "Lost account".to_string(),
            Sentinel::NewCategory => format!("New {}", dimension.noun()),
            Sentinel::ChurnedCategory => format!("{} churned", dimension.title()),
        }
    }
}

/// A node of the flow graph.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum NodeKey {
    Start(String),
    End(String),
    Sentinel(Sentinel),
    Label(TaxonomyLabel),
    Other(Side),
}

impl NodeKey {
    pub fn start(id: impl Into<String>) -> Self {
        NodeKey::Start(id.into())
    }

    pub fn end(id: impl Into<String>) -> Self {
        NodeKey::End(id.into())
    }

    /// Graph layer: 1 = start, 2 = taxonomy, 3 = end
    pub fn layer(&self) -> u8 {
        match self {
            NodeKey::Label(_) => 2,
            NodeKey::Start(_) | NodeKey::Other(Side::Start) => 1,
            NodeKey::End(_) | NodeKey::Other(Side::End) => 3,
            NodeKey::Sentinel(s) => match s.side() {
                Side::Start => 1,
                Side::End => 3,
            },
        }
    }

    /// Category key for `Start`/`End` nodes
    pub fn identifier(&self) -> Option<&str> {
        match self {
            NodeKey::Start(id) | NodeKey::End(id) => Some(id),
            _ => None,
        }
    }

    pub fn is_new_sentinel(&self) -> bool {
        matches!(
            self,
            NodeKey::Sentinel(Sentinel::NewEntity | Sentinel::NewCategory)
        )
    }

    pub fn is_churn_sentinel(&self) -> bool {
        matches!(
            self,
            NodeKey::Sentinel(Sentinel::ChurnedEntity | Sentinel::ChurnedCategory)
        )
    }

    pub fn is_other(&self) -> bool {
        matches!(self, NodeKey::Other(_))
    }

    /// Human-readable label for the renderer
    pub fn display(&self, dimension: Dimension) -> String {
        match self {
            NodeKey::Start(id) | NodeKey::End(id) => id.clone(),
            NodeKey::Sentinel(s) => s.display(dimension),
            NodeKey::Label(l) => l.display_name().to_string(),
            NodeKey::Other(Side::Start) => "Other (start)".to_string(),
            NodeKey::Other(Side::End) => "Other (end)".to_string(),
        }
    }
}

/// Stable, unique node id used in serialized graphs. Never parsed back.
impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeKey::Start(id) => write!(f, "start:{id}"),
            NodeKey::End(id) => write!(f, "end:{id}"),
            NodeKey::Sentinel(s) => write!(f, "sentinel:{}", s.id()),
            NodeKey::Label(l) => write!(f, "label:{}", l.slug()),
            NodeKey::Other(Side::Start) => write!(f, "other:start"),
            NodeKey::Other(Side::End) => write!(f, "other:end"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layers() {
        assert_eq!(NodeKey::start("P1").layer(), 1);
        assert_eq!(NodeKey::end("P1").layer(), 3);
        assert_eq!(NodeKey::Sentinel(Sentinel::NewEntity).layer(), 1);
        assert_eq!(NodeKey::Sentinel(Sentinel::ChurnedCategory).layer(), 3);
        assert_eq!(NodeKey::Label(TaxonomyLabel::Retained).layer(), 2);
        assert_eq!(NodeKey::Other(Side::End).layer(), 3);
    }

    #[test]
    fn test_same_identifier_distinct_ids() {
        let a = NodeKey::start("P1");
        let b = NodeKey::end("P1");
        assert_ne!(a.to_string(), b.to_string());
        assert_eq!(a.display(Dimension::Product), b.display(Dimension::Product));
    }

    #[test]
    fn test_sentinel_wording_follows_dimension() {
        let k = NodeKey::Sentinel(Sentinel::ChurnedCategory);
        assert_eq!(k.display(Dimension::Product), "Product churned");
        assert_eq!(k.display(Dimension::Store), "Store churned");
        let n = NodeKey::Sentinel(Sentinel::NewCategory);
        assert_eq!(n.display(Dimension::Brand), "New brand");
    }
}
