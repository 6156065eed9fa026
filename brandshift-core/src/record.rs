//! Input record types: one purchase amount per account, period and category key.

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};

/// A single period-tagged amount for one account.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeriodRecord {
    /// Customer or store identifier
    pub account: String,
    /// Observation period label (e.g. "2023", "2024-Q1")
    pub period: String,
    /// Product, brand or store the amount was spent on
    pub category_key: String,
    /// Non-negative amount
    pub amount: f64,
    /// Brand of `category_key`, when the source table carries one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
}

impl PeriodRecord {
    /// Create a new PeriodRecord without brand information
    pub fn new(
        account: impl Into<String>,
        period: impl Into<String>,
        category_key: impl Into<String>,
        amount: f64,
    ) -> Self {
        Self {
            account: account.into(),
            period: period.into(),
            category_key: category_key.into(),
            amount,
            brand: None,
        }
    }

    pub fn with_brand(mut self, brand: impl Into<String>) -> Self {
        self.brand = Some(brand.into());
        self
    }
}

/// What category keys denote. Drives sentinel wording and brand lookup.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Dimension {
    #[default]
    Product,
    Brand,
    Store,
}

impl Dimension {
    /// Noun used in sentinel display labels
    pub fn noun(&self) -> &'static str {
        match self {
            Dimension::Product => "product",
            Dimension::Brand => "brand",
            Dimension::Store => "store",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Dimension::Product => "Product",
            Dimension::Brand => "Brand",
            Dimension::Store => "Store",
        }
    }
}

impl std::str::FromStr for Dimension {
    type Err = FlowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "product" => Ok(Dimension::Product),
            "brand" => Ok(Dimension::Brand),
            "store" => Ok(Dimension::Store),
            other => Err(FlowError::Configuration(format!(
                "unknown dimension '{other}' (expected product, brand or store)"
            ))),
        }
    }
}

/// The two periods being compared.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PeriodPair {
    pub start: String,
    pub end: String,
}

impl PeriodPair {
    /// Build a pair, rejecting identical or empty periods.
    pub fn new(start: impl Into<String>, end: impl Into<String>) -> Result<Self> {
        let start = start.into();
        let end = end.into();
        if start.trim().is_empty() || end.trim().is_empty() {
            return Err(FlowError::Configuration(
                "start and end periods must be non-empty".to_string(),
            ));
        }
        if start == end {
            return Err(FlowError::Configuration(format!(
                "start period and end period are both '{start}'"
            )));
        }
        Ok(Self { start, end })
    }
}
