//! Percentage reports over an aggregated flow table.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::aggregate::FlowTable;
use crate::key::NodeKey;
use crate::record::Dimension;
use crate::taxonomy::{FlowType, TaxonomyLabel};

/// How many counterpart keys are listed per transfer type.
pub const TOP_COUNTERPARTS: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelShare {
    pub label: TaxonomyLabel,
    pub amount: f64,
    pub percent: f64,
}

/// Share of every present label in the total mass entering the taxonomy layer.
pub fn label_shares(table: &FlowTable) -> Vec<LabelShare> {
    let total = table.total_mass();
    table
        .label_totals()
        .into_iter()
        .map(|(label, amount)| LabelShare {
            label,
            amount,
            percent: percent(amount, total),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Share {
    pub amount: f64,
    pub percent: f64,
}

impl Share {
    fn of(amount: f64, total: f64) -> Self {
        Self {
            amount,
            percent: percent(amount, total),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyShare {
    pub key: String,
    pub amount: f64,
    pub percent: f64,
}

/// A transfer bucket plus its largest counterparts.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transfer {
    pub amount: f64,
    pub percent: f64,
    pub top: Vec<KeyShare>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Where the focal key's start-period amount went
    Outflow,
    /// Where the focal key's end-period amount came from
    Inflow,
}

/// One direction of the focal report. Percentages are relative to `total`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocalView {
    pub direction: Direction,
    pub total: f64,
    pub retained: Share,
    pub same_brand: Transfer,
    pub diff_brand: Transfer,
    /// Churn for the outflow view, new growth for the inflow view
    pub unmatched: Share,
}

impl FocalView {
    /// Parts of the view; they partition `total`.
    pub fn percent_sum(&self) -> f64 {
        self.retained.percent + self.same_brand.percent + self.diff_brand.percent + self.unmatched.percent
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Section {
    /// Focal key has no amount in the relevant period
    NoData,
    Data(FocalView),
}

impl Section {
    pub fn view(&self) -> Option<&FocalView> {
        match self {
            Section::Data(v) => Some(v),
            Section::NoData => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FocalReport {
    pub focal: String,
    pub outflow: Section,
    pub inflow: Section,
}

impl FocalReport {
    pub fn build(table: &FlowTable, focal: &str, dimension: Dimension) -> Self {
        Self {
            focal: focal.to_string(),
            outflow: section(table, Direction::Outflow, dimension),
            inflow: section(table, Direction::Inflow, dimension),
        }
    }
}

fn section(table: &FlowTable, direction: Direction, dimension: Dimension) -> Section {
    let totals = table.label_totals();
    let amount = |l: TaxonomyLabel| totals.get(&l).copied().unwrap_or(0.0);

    let (same, diff, unmatched) = match direction {
        Direction::Outflow => (
            TaxonomyLabel::EndSameBrand,
            TaxonomyLabel::EndDiffBrand,
            TaxonomyLabel::EndChurn,
        ),
        Direction::Inflow => (
            TaxonomyLabel::StartSameBrand,
            TaxonomyLabel::StartDiffBrand,
            TaxonomyLabel::StartNew,
        ),
    };

    let in_view = |l: &TaxonomyLabel| match direction {
        Direction::Outflow => l.is_outflow(),
        Direction::Inflow => l.is_inflow(),
    };
    let total: f64 = totals.iter().filter(|(l, _)| in_view(l)).map(|(_, v)| v).sum();
    if total <= 0.0 {
        return Section::NoData;
    }

    let transfer = |label: TaxonomyLabel| Transfer {
        amount: amount(label),
        percent: percent(amount(label), total),
        top: counterparts(table, label, direction, dimension, total),
    };

    Section::Data(FocalView {
        direction,
        total,
        retained: Share::of(amount(TaxonomyLabel::Retained), total),
        same_brand: transfer(same),
        diff_brand: transfer(diff),
        unmatched: Share::of(amount(unmatched), total),
    })
}

/// Largest destinations (outflow) or sources (inflow) behind one label.
fn counterparts(
    table: &FlowTable,
    label: TaxonomyLabel,
    direction: Direction,
    dimension: Dimension,
    total: f64,
) -> Vec<KeyShare> {
    let mut by_key: BTreeMap<&NodeKey, f64> = BTreeMap::new();
    for e in table.edges().iter().filter(|e| e.label == label) {
        let key = match (direction, e.flow_type) {
            (Direction::Outflow, FlowType::LabelToEnd) => &e.to,
            (Direction::Inflow, FlowType::StartToLabel) => &e.from,
            _ => continue,
        };
        *by_key.entry(key).or_insert(0.0) += e.total_amount;
    }

    let mut ranked: Vec<_> = by_key.into_iter().collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    ranked
        .into_iter()
        .take(TOP_COUNTERPARTS)
        .map(|(key, amount)| KeyShare {
            key: key.display(dimension),
            amount,
            percent: percent(amount, total),
        })
        .collect()
}

fn percent(amount: f64, total: f64) -> f64 {
    if total > 0.0 { amount / total * 100.0 } else { 0.0 }
}

impl fmt::Display for FocalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Focal: {}", self.focal)?;
        for (title, section) in [("Outflow", &self.outflow), ("Inflow", &self.inflow)] {
            let Some(v) = section.view() else {
                writeln!(f, "{title}: no data")?;
                continue;
            };
            let (same, diff, unmatched) = match v.direction {
                Direction::Outflow => ("Lost to same brand", "Lost to other brands", "Churned"),
                Direction::Inflow => ("Won from same brand", "Won from other brands", "New growth"),
            };
            writeln!(f, "{title} (total {:.2}):", v.total)?;
            writeln!(f, "  Retained: {:.2} ({:.1}%)", v.retained.amount, v.retained.percent)?;
            write_transfer(f, same, &v.same_brand)?;
            write_transfer(f, diff, &v.diff_brand)?;
            writeln!(f, "  {unmatched}: {:.2} ({:.1}%)", v.unmatched.amount, v.unmatched.percent)?;
        }
        Ok(())
    }
}

fn write_transfer(f: &mut fmt::Formatter<'_>, name: &str, t: &Transfer) -> fmt::Result {
    write!(f, "  {name}: {:.2} ({:.1}%)", t.amount, t.percent)?;
    if !t.top.is_empty() {
        let parts: Vec<String> = t
            .top
            .iter()
            .map(|k| format!("{} {:.2} ({:.1}%)", k.key, k.amount, k.percent))
            .collect();
        write!(f, " - top: {}", parts.join(", "))?;
    }
    writeln!(f)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{BrandLookup, Classifier};
    use crate::key::Sentinel;
    use crate::matcher::MatchedFlow;

    fn table() -> FlowTable {
        let brands = BrandLookup::from_pairs([
            ("P1", "Acme"),
            ("P2", "Acme"),
            ("P4", "Acme"),
            ("P3", "Globex"),
        ]);
        let c = Classifier::new("P1", &brands);
        FlowTable::aggregate(c.split_all([
            MatchedFlow::new(NodeKey::start("P1"), NodeKey::end("P1"), 4.0),
            MatchedFlow::new(NodeKey::start("P1"), NodeKey::end("P2"), 3.0),
            MatchedFlow::new(NodeKey::start("P1"), NodeKey::end("P4"), 1.0),
            MatchedFlow::new(NodeKey::start("P1"), NodeKey::end("P3"), 1.0),
            MatchedFlow::new(NodeKey::start("P1"), NodeKey::Sentinel(Sentinel::ChurnedEntity), 1.0),
        ]))
    }

    #[test]
    fn test_outflow_view() {
        let r = FocalReport::build(&table(), "P1", Dimension::Product);
        let v = r.outflow.view().unwrap();
        assert_eq!(v.total, 10.0);
        assert_eq!(v.retained.percent, 40.0);
        assert_eq!(v.same_brand.amount, 4.0);
        assert_eq!(v.same_brand.top.len(), 2);
        assert_eq!(v.same_brand.top[0].key, "P2");
        assert_eq!(v.same_brand.top[0].percent, 30.0);
        assert_eq!(v.diff_brand.top[0].key, "P3");
        assert_eq!(v.unmatched.amount, 1.0);
        assert!((v.percent_sum() - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_inflow_view_only_retained() {
        let r = FocalReport::build(&table(), "P1", Dimension::Product);
        let v = r.inflow.view().unwrap();
        assert_eq!(v.total, 4.0);
        assert_eq!(v.retained.percent, 100.0);
        assert!(v.same_brand.top.is_empty());
    }

    #[test]
    fn test_no_data_when_focal_absent() {
        let r = FocalReport::build(&FlowTable::default(), "P1", Dimension::Product);
        assert_eq!(r.outflow, Section::NoData);
        assert_eq!(r.inflow, Section::NoData);
        assert!(r.to_string().contains("Outflow: no data"));
    }

    #[test]
    fn test_label_shares_sum_to_100() {
        let shares = label_shares(&table());
        let sum: f64 = shares.iter().map(|s| s.percent).sum();
        assert!((sum - 100.0).abs() < 1e-9);
        assert_eq!(shares[0].label, TaxonomyLabel::Retained);
    }

    #[test]
    fn test_text_rendering() {
        let text = FocalReport::build(&table(), "P1", Dimension::Product).to_string();
        assert!(text.contains("Outflow (total 10.00):"));
        assert!(text.contains("Lost to same brand: 4.00 (40.0%) - top: P2 3.00 (30.0%), P4 1.00 (10.0%)"));
        assert!(text.contains("Churned: 1.00 (10.0%)"));
    }
}
