use anyhow::{Context, Result};
use brandshift_core::{Analysis, AnalysisConfig, FocalReport, GraphSpec, LabelShare, PeriodPair};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::Path;

/// JSON document written by `analyze`.
#[derive(Debug, Serialize)]
pub struct AnalysisOutput<'a> {
    pub generated_at: DateTime<Utc>,
    pub build: &'static str,
    pub config: &'a AnalysisConfig,
    pub periods: &'a PeriodPair,
    pub accounts: usize,
    pub graph: &'a GraphSpec,
    pub label_shares: &'a [LabelShare],
    pub report: &'a FocalReport,
}

impl<'a> AnalysisOutput<'a> {
    pub fn new(analysis: &'a Analysis, config: &'a AnalysisConfig, generated_at: DateTime<Utc>) -> Self {
        Self {
            generated_at,
            build: env!("BRANDSHIFT_BUILD_SHA"),
            config,
            periods: &analysis.periods,
            accounts: analysis.accounts,
            graph: &analysis.graph,
            label_shares: &analysis.label_shares,
            report: &analysis.report,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).context("serialize analysis")
    }

    pub fn write(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?).with_context(|| format!("write {}", path.display()))
    }
}

/// Plain-text summary: label shares followed by the focal report.
pub fn render_text(analysis: &Analysis) -> String {
    TextSummary(analysis).to_string()
}

struct TextSummary<'a>(&'a Analysis);

impl fmt::Display for TextSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let a = self.0;
        writeln!(
            f,
            "Periods: {} -> {} | accounts: {} | nodes: {} | edges: {}\n",
            a.periods.start,
            a.periods.end,
            a.accounts,
            a.graph.nodes.len(),
            a.graph.edges.len()
        )?;
        writeln!(f, "Flow categories:")?;
        if a.label_shares.is_empty() {
            writeln!(f, "  (none)")?;
        }
        for share in &a.label_shares {
            writeln!(
                f,
                "  {:<28} {:>12.2} {:>6.1}%",
                share.label.display_name(),
                share.amount,
                share.percent
            )?;
        }
        writeln!(f)?;
        write!(f, "{}", a.report)
    }
}
