//! Label classifier: place each matched flow into the fixed taxonomy relative
//! to a focal key, then split it into its two graph halves.
//!
//! Rules are checked in order, first match wins:
//! new sentinel into focal > focal into churn sentinel > into focal > out of focal.
//! Anything else does not touch the focal key and is dropped.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::key::NodeKey;
use crate::matcher::MatchedFlow;
use crate::taxonomy::{FlowType, TaxonomyLabel};

/// Category key -> brand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BrandLookup {
    table: HashMap<String, String>,
    /// Keys are brands themselves (brand-level analysis)
    identity: bool,
}

impl BrandLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every key is its own brand.
    pub fn identity() -> Self {
        Self {
            table: HashMap::new(),
            identity: true,
        }
    }

    pub fn from_pairs<I, K, B>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, B)>,
        K: Into<String>,
        B: Into<String>,
    {
        Self {
            table: pairs.into_iter().map(|(k, b)| (k.into(), b.into())).collect(),
            identity: false,
        }
    }

    /// Record a key's brand. The first brand seen for a key wins; returns
    /// the conflicting brand when a different one was already stored.
    pub fn insert(&mut self, key: impl Into<String>, brand: impl Into<String>) -> Option<String> {
        let brand = brand.into();
        match self.table.entry(key.into()) {
            std::collections::hash_map::Entry::Occupied(e) if e.get() != &brand => Some(brand),
            std::collections::hash_map::Entry::Occupied(_) => None,
            std::collections::hash_map::Entry::Vacant(e) => {
                e.insert(brand);
                None
            }
        }
    }

    pub fn brand_of<'a>(&'a self, key: &'a str) -> Option<&'a str> {
        if self.identity {
            return Some(key);
        }
        self.table.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// A matched flow with its taxonomy label.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedFlow {
    pub flow: MatchedFlow,
    pub label: TaxonomyLabel,
}

impl ClassifiedFlow {
    /// `(from -> label)` and `(label -> to)`, both carrying the full amount.
    pub fn split(&self) -> [FlowEdge; 2] {
        let middle = NodeKey::Label(self.label);
        [
            FlowEdge {
                from: self.flow.from.clone(),
                to: middle.clone(),
                amount: self.flow.amount,
                label: self.label,
                flow_type: FlowType::StartToLabel,
            },
            FlowEdge {
                from: middle,
                to: self.flow.to.clone(),
                amount: self.flow.amount,
                label: self.label,
                flow_type: FlowType::LabelToEnd,
            },
        ]
    }
}

/// One half of a classified flow, ready for aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowEdge {
    pub from: NodeKey,
    pub to: NodeKey,
    pub amount: f64,
    pub label: TaxonomyLabel,
    pub flow_type: FlowType,
}

/// Classifies flows relative to one focal key.
#[derive(Debug, Clone)]
pub struct Classifier<'a> {
    focal: &'a str,
    focal_brand: Option<&'a str>,
    brands: &'a BrandLookup,
}

impl<'a> Classifier<'a> {
    pub fn new(focal: &'a str, brands: &'a BrandLookup) -> Self {
        Self {
            focal,
            focal_brand: brands.brand_of(focal),
            brands,
        }
    }

    /// Whether the focal key has a known brand
    pub fn focal_brand(&self) -> Option<&str> {
        self.focal_brand
    }

    pub fn label(&self, flow: &MatchedFlow) -> TaxonomyLabel {
        let from_focal = matches!(&flow.from, NodeKey::Start(k) if k == self.focal);
        let to_focal = matches!(&flow.to, NodeKey::End(k) if k == self.focal);

        if flow.from.is_new_sentinel() {
            return if to_focal {
                TaxonomyLabel::StartNew
            } else {
                TaxonomyLabel::NotApplicable
            };
        }
        if flow.to.is_churn_sentinel() {
            return if from_focal {
                TaxonomyLabel::EndChurn
            } else {
                TaxonomyLabel::NotApplicable
            };
        }

        if to_focal {
            // same key is retained even when the focal brand is unknown
            if from_focal {
                TaxonomyLabel::Retained
            } else if self.shares_focal_brand(&flow.from) {
                TaxonomyLabel::StartSameBrand
            } else {
                TaxonomyLabel::StartDiffBrand
            }
        } else if from_focal {
            if self.shares_focal_brand(&flow.to) {
                TaxonomyLabel::EndSameBrand
            } else {
                TaxonomyLabel::EndDiffBrand
            }
        } else {
            TaxonomyLabel::NotApplicable
        }
    }

    /// Unknown brands on either side never compare equal.
    fn shares_focal_brand(&self, other: &NodeKey) -> bool {
        let other_brand = other.identifier().and_then(|k| self.brands.brand_of(k));
        matches!((self.focal_brand, other_brand), (Some(a), Some(b)) if a == b)
    }

    /// Label a flow; `None` when it does not touch the focal key.
    pub fn classify(&self, flow: MatchedFlow) -> Option<ClassifiedFlow> {
        let label = self.label(&flow);
        label
            .is_categorizable()
            .then_some(ClassifiedFlow { flow, label })
    }

    /// Classify and split a whole batch, dropping non-applicable flows.
    pub fn split_all(&self, flows: impl IntoIterator<Item = MatchedFlow>) -> Vec<FlowEdge> {
        flows
            .into_iter()
            .filter_map(|f| self.classify(f))
            .flat_map(|c| c.split())
            .collect()
    }
}
