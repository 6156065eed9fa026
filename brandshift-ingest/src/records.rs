//! Parse period-tagged purchase rows from CSV.
//!
//! Expected header (names configurable via `ColumnMapping`, order free):
//! account_id,period,category_key,amount[,brand]

use anyhow::{Context, Result, bail};
use brandshift_core::PeriodRecord;
use std::collections::BTreeMap;
use std::io;
use std::path::Path;

use crate::columns::{ColumnMapping, find, locate};

/// Load every record of a CSV file.
pub fn load_records(path: impl AsRef<Path>, columns: &ColumnMapping) -> Result<Vec<PeriodRecord>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_records(file, columns).with_context(|| format!("reading {}", path.display()))
}

/// Parse records from any CSV source. Fails on the first malformed row;
/// fully blank rows are skipped.
pub fn read_records<R: io::Read>(reader: R, columns: &ColumnMapping) -> Result<Vec<PeriodRecord>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().context("reading header row")?.clone();
    let idx = locate(&headers, &columns.required())?;
    let (account_i, period_i, key_i, amount_i) = (idx[0], idx[1], idx[2], idx[3]);
    let brand_i = find(&headers, &columns.brand);

    let mut out = Vec::new();
    let mut skipped = 0usize;
    for (i, result) in rdr.records().enumerate() {
        // header is line 1
        let line = i + 2;
        let record = result.with_context(|| format!("line {line}"))?;
        if record.iter().all(str::is_empty) {
            skipped += 1;
            continue;
        }

        let field = |col: usize, name: &str| -> Result<String> {
            match record.get(col) {
                Some(v) if !v.is_empty() => Ok(v.to_string()),
                _ => bail!("line {line}: empty {name}"),
            }
        };

        let raw_amount = field(amount_i, &columns.amount)?;
        let amount = parse_amount(&raw_amount).with_context(|| format!("line {line}"))?;

        out.push(PeriodRecord {
            account: field(account_i, &columns.account)?,
            period: field(period_i, &columns.period)?,
            category_key: field(key_i, &columns.category_key)?,
            amount,
            brand: brand_i
                .and_then(|b| record.get(b))
                .filter(|b| !b.is_empty())
                .map(str::to_string),
        });
    }

    if skipped > 0 {
        tracing::warn!(skipped, "skipped blank rows");
    }
    tracing::debug!(records = out.len(), "parsed records");
    Ok(out)
}

/// Accepts thousands separators and a leading currency symbol.
fn parse_amount(raw: &str) -> Result<f64> {
    let cleaned: String = raw
        .trim_start_matches('$')
        .chars()
        .filter(|c| *c != ',')
        .collect();
    let amount: f64 = cleaned
        .trim()
        .parse()
        .with_context(|| format!("invalid amount '{raw}'"))?;
    if !amount.is_finite() {
        bail!("invalid amount '{raw}'");
    }
    if amount < 0.0 {
        bail!("negative amount '{raw}'");
    }
    Ok(amount)
}

/// Row count per distinct period, sorted by period.
pub fn period_counts(records: &[PeriodRecord]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for r in records {
        *counts.entry(r.period.clone()).or_insert(0) += 1;
    }
    counts
}
