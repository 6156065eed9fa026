//! brandshift-ingest: CSV ingestion of period-tagged purchase records and
//! key -> brand lookup tables.

pub mod brands;
pub mod columns;
pub mod records;

pub use brands::{brand_lookup_from_records, load_brand_lookup, read_brand_lookup};
pub use columns::ColumnMapping;
pub use records::{load_records, period_counts, read_records};
