//! Input column naming and header lookup.

use brandshift_core::FlowError;
use serde::{Deserialize, Serialize};

/// Header names of the input columns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ColumnMapping {
    pub account: String,
    pub period: String,
    pub category_key: String,
    pub amount: String,
    /// Optional; used to build the brand lookup when present
    pub brand: String,
}

impl Default for ColumnMapping {
    fn default() -> Self {
        Self {
            account: "account_id".to_string(),
            period: "period".to_string(),
            category_key: "category_key".to_string(),
            amount: "amount".to_string(),
            brand: "brand".to_string(),
        }
    }
}

impl ColumnMapping {
    /// Required columns, in schema order
    pub fn required(&self) -> [&str; 4] {
        [
            self.account.as_str(),
            self.period.as_str(),
            self.category_key.as_str(),
            self.amount.as_str(),
        ]
    }
}

/// Position of every requested column; a schema error lists all missing names.
pub(crate) fn locate(headers: &csv::StringRecord, names: &[&str]) -> Result<Vec<usize>, FlowError> {
    let mut found = Vec::with_capacity(names.len());
    let mut missing = Vec::new();
    for name in names {
        match find(headers, name) {
            Some(i) => found.push(i),
            None => missing.push(name.to_string()),
        }
    }
    if missing.is_empty() {
        Ok(found)
    } else {
        Err(FlowError::Schema { missing })
    }
}

/// Header match ignores case and surrounding whitespace.
pub(crate) fn find(headers: &csv::StringRecord, name: &str) -> Option<usize> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name.trim()))
}
