//! Key -> brand lookup tables.
//!
//! Either a dedicated two-column CSV (`category_key,brand`) or the optional
//! brand column of the records file. The first brand seen for a key wins.

use anyhow::{Context, Result};
use brandshift_core::{BrandLookup, PeriodRecord};
use std::io;
use std::path::Path;

use crate::columns::{ColumnMapping, locate};

pub fn load_brand_lookup(path: impl AsRef<Path>, columns: &ColumnMapping) -> Result<BrandLookup> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    read_brand_lookup(file, columns).with_context(|| format!("reading {}", path.display()))
}

pub fn read_brand_lookup<R: io::Read>(reader: R, columns: &ColumnMapping) -> Result<BrandLookup> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().context("reading header row")?.clone();
    let idx = locate(&headers, &[columns.category_key.as_str(), columns.brand.as_str()])?;

    let mut lookup = BrandLookup::new();
    for (i, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("line {}", i + 2))?;
        let (Some(key), Some(brand)) = (record.get(idx[0]), record.get(idx[1])) else {
            continue;
        };
        if key.is_empty() || brand.is_empty() {
            continue;
        }
        if let Some(conflict) = lookup.insert(key, brand) {
            tracing::warn!(key, brand = %conflict, "conflicting brand ignored");
        }
    }
    tracing::debug!(keys = lookup.len(), "loaded brand lookup");
    Ok(lookup)
}

/// Build a lookup from records that carry a brand.
pub fn brand_lookup_from_records(records: &[PeriodRecord]) -> BrandLookup {
    let mut lookup = BrandLookup::new();
    for r in records {
        let Some(brand) = r.brand.as_deref() else {
            continue;
        };
        if let Some(conflict) = lookup.insert(r.category_key.as_str(), brand) {
            tracing::warn!(key = %r.category_key, brand = %conflict, "conflicting brand ignored");
        }
    }
    lookup
}
