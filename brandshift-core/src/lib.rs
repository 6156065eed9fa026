//! brandshift-core: flow decomposition and categorization engine.
//!
//! Splits each account's start/end period amounts into conserved flows,
//! labels them relative to a focal product or brand, and lays the result out
//! as a three-layer Sankey graph with percentage reports.

pub mod aggregate;
pub mod classify;
pub mod config;
pub mod error;
pub mod key;
pub mod layout;
pub mod matcher;
pub mod period;
pub mod pipeline;
pub mod record;
pub mod report;
pub mod taxonomy;
pub mod top_n;

/// Amounts at or below this are treated as exhausted.
pub const AMOUNT_EPSILON: f64 = 1e-9;

pub use aggregate::{AggregatedEdge, FlowTable, NodeTotals};
pub use classify::{BrandLookup, ClassifiedFlow, Classifier, FlowEdge};
pub use config::AnalysisConfig;
pub use error::{FlowError, Result};
pub use key::{NodeKey, Sentinel, Side};
pub use layout::{GraphEdge, GraphSpec, LayoutConfig, Node, build_graph};
pub use matcher::{MatchedFlow, match_account};
pub use period::{AccountAmounts, AmountMap, aggregate_account, group_by_account};
pub use pipeline::{Analysis, flow_table, run};
pub use record::{Dimension, PeriodPair, PeriodRecord};
pub use report::{FocalReport, FocalView, LabelShare, Section, label_shares};
pub use taxonomy::{FlowType, TaxonomyLabel};
pub use top_n::reduce_top_n;
