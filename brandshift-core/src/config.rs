//! Analysis parameters.

use serde::{Deserialize, Serialize};

use crate::error::{FlowError, Result};
use crate::layout::LayoutConfig;
use crate::record::{Dimension, PeriodPair};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AnalysisConfig {
    pub dimension: Dimension,
    pub start_period: String,
    pub end_period: String,
    /// Product, brand or store the analysis is centered on
    pub focal: String,
    /// Keep only the N busiest keys per side; `None` keeps everything
    pub top_n: Option<usize>,
    pub layout: LayoutConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            dimension: Dimension::Product,
            start_period: String::new(),
            end_period: String::new(),
            focal: String::new(),
            top_n: None,
            layout: LayoutConfig::default(),
        }
    }
}

impl AnalysisConfig {
    pub fn periods(&self) -> Result<PeriodPair> {
        PeriodPair::new(self.start_period.clone(), self.end_period.clone())
    }

    /// Check everything that can be checked before touching data.
    pub fn validate(&self) -> Result<PeriodPair> {
        let periods = self.periods()?;
        if self.focal.trim().is_empty() {
            return Err(FlowError::Configuration("focal entity must be set".to_string()));
        }
        if self.top_n == Some(0) {
            return Err(FlowError::Configuration("top_n must be at least 1".to_string()));
        }
        self.layout.validate()?;
        Ok(periods)
    }
}
