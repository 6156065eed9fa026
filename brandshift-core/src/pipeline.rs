//! End-to-end run: records -> per-account flows -> table -> graph + reports.

use rayon::prelude::*;
use serde::Serialize;

use crate::aggregate::FlowTable;
use crate::classify::{BrandLookup, Classifier, FlowEdge};
use crate::config::AnalysisConfig;
use crate::error::Result;
use crate::layout::{GraphSpec, build_graph};
use crate::matcher::match_account;
use crate::period::group_by_account;
use crate::record::{Dimension, PeriodPair, PeriodRecord};
use crate::report::{FocalReport, LabelShare, label_shares};
use crate::top_n::reduce_top_n;

/// Everything produced by one run.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub periods: PeriodPair,
    /// Accounts with an amount in at least one of the two periods
    pub accounts: usize,
    /// Aggregated table before top-N reduction
    pub table: FlowTable,
    pub graph: GraphSpec,
    pub label_shares: Vec<LabelShare>,
    pub report: FocalReport,
}

/// Decompose and classify every account, then aggregate.
///
/// Accounts are processed in parallel; the per-account results are summed in
/// account order so the table does not depend on thread scheduling.
pub fn flow_table(
    records: &[PeriodRecord],
    periods: &PeriodPair,
    classifier: &Classifier<'_>,
) -> Result<(FlowTable, usize)> {
    let accounts = group_by_account(records, periods)?;
    tracing::debug!(accounts = accounts.len(), "grouped records by account");

    let per_account: Vec<Vec<FlowEdge>> = accounts
        .par_iter()
        .map(|a| match_account(a).map(|flows| classifier.split_all(flows)))
        .collect::<Result<_>>()?;

    let table = FlowTable::aggregate(per_account.into_iter().flatten());
    Ok((table, accounts.len()))
}

pub fn run(records: &[PeriodRecord], brands: &BrandLookup, cfg: &AnalysisConfig) -> Result<Analysis> {
    let periods = cfg.validate()?;

    let identity = BrandLookup::identity();
    let brands = match cfg.dimension {
        Dimension::Brand => &identity,
        Dimension::Product | Dimension::Store => brands,
    };
    let classifier = Classifier::new(&cfg.focal, brands);
    if classifier.focal_brand().is_none() && !brands.is_empty() {
        tracing::warn!(focal = %cfg.focal, "focal entity has no brand; every transfer counts as cross-brand");
    }

    let (table, accounts) = flow_table(records, &periods, &classifier)?;
    if table.is_empty() {
        tracing::warn!(focal = %cfg.focal, "no flows touch the focal entity");
    }

    let reduced = match cfg.top_n {
        Some(n) => reduce_top_n(&table, n, &cfg.focal),
        None => table.clone(),
    };
    let graph = build_graph(&reduced, cfg.dimension, &cfg.layout)?;
    let label_shares = label_shares(&table);
    let report = FocalReport::build(&table, &cfg.focal, cfg.dimension);

    tracing::info!(
        accounts,
        edges = table.len(),
        nodes = graph.nodes.len(),
        mass = table.total_mass(),
        "analysis complete"
    );

    Ok(Analysis {
        periods,
        accounts,
        table,
        graph,
        label_shares,
        report,
    })
}
