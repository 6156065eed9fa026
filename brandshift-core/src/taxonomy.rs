//! Fixed flow taxonomy: the middle-layer categories of the graph.
//!
//! Declaration order is the display order; `Ord` follows it.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaxonomyLabel {
    /// Focal key kept by the same account
    Retained,
    /// Focal key gained from another key of the same brand
    StartSameBrand,
    /// Focal key gained from a different brand
    StartDiffBrand,
    /// Focal key gained from accounts or keys with no start-period record
    StartNew,
    /// Focal key lost to another key of the same brand
    EndSameBrand,
    /// Focal key lost to a different brand
    EndDiffBrand,
    /// Focal key lost with no end-period counterpart
    EndChurn,
    /// Flow does not touch the focal key; never aggregated
    NotApplicable,
}

impl TaxonomyLabel {
    /// Categorizable labels in display order
    pub const ORDERED: [TaxonomyLabel; 7] = [
        TaxonomyLabel::Retained,
        TaxonomyLabel::StartSameBrand,
        TaxonomyLabel::StartDiffBrand,
        TaxonomyLabel::StartNew,
        TaxonomyLabel::EndSameBrand,
        TaxonomyLabel::EndDiffBrand,
        TaxonomyLabel::EndChurn,
    ];

    pub fn display_name(&self) -> &'static str {
        match self {
            TaxonomyLabel::Retained => "Retained",
            TaxonomyLabel::StartSameBrand => "Switched in (same brand)",
            TaxonomyLabel::StartDiffBrand => "Switched in (other brand)",
            TaxonomyLabel::StartNew => "New growth",
            TaxonomyLabel::EndSameBrand => "Switched out (same brand)",
            TaxonomyLabel::EndDiffBrand => "Switched out (other brand)",
            TaxonomyLabel::EndChurn => "Churned",
            TaxonomyLabel::NotApplicable => "Not applicable",
        }
    }

    /// Short stable identifier
    pub fn slug(&self) -> &'static str {
        match self {
            TaxonomyLabel::Retained => "retained",
            TaxonomyLabel::StartSameBrand => "start_same_brand",
            TaxonomyLabel::StartDiffBrand => "start_diff_brand",
            TaxonomyLabel::StartNew => "start_new",
            TaxonomyLabel::EndSameBrand => "end_same_brand",
            TaxonomyLabel::EndDiffBrand => "end_diff_brand",
            TaxonomyLabel::EndChurn => "end_churn",
            TaxonomyLabel::NotApplicable => "not_applicable",
        }
    }

    /// Palette color as `#RRGGBB`
    pub fn color(&self) -> &'static str {
        match self {
            TaxonomyLabel::Retained => "#4C9F70",
            TaxonomyLabel::StartSameBrand => "#5B8FF9",
            TaxonomyLabel::StartDiffBrand => "#9270CA",
            TaxonomyLabel::StartNew => "#F6BD16",
            TaxonomyLabel::EndSameBrand => "#6DC8EC",
            TaxonomyLabel::EndDiffBrand => "#FF9D4D",
            TaxonomyLabel::EndChurn => "#E8684A",
            TaxonomyLabel::NotApplicable => "#BFBFBF",
        }
    }

    pub fn is_categorizable(&self) -> bool {
        !matches!(self, TaxonomyLabel::NotApplicable)
    }

    /// Labels whose flows leave the focal key (outflow view)
    pub fn is_outflow(&self) -> bool {
        matches!(
            self,
            TaxonomyLabel::Retained
                | TaxonomyLabel::EndSameBrand
                | TaxonomyLabel::EndDiffBrand
                | TaxonomyLabel::EndChurn
        )
    }

    /// Labels whose flows arrive at the focal key (inflow view)
    pub fn is_inflow(&self) -> bool {
        matches!(
            self,
            TaxonomyLabel::Retained
                | TaxonomyLabel::StartSameBrand
                | TaxonomyLabel::StartDiffBrand
                | TaxonomyLabel::StartNew
        )
    }
}

/// Which half of a split flow an edge represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowType {
    StartToLabel,
    LabelToEnd,
}

/// Convert `#RRGGBB` into an `rgba(...)` string with the given opacity.
/// Unparseable input is returned unchanged.
pub fn with_opacity(hex: &str, opacity: f64) -> String {
    let digits = hex.trim_start_matches('#');
    if digits.len() != 6 || !digits.is_ascii() {
        return hex.to_string();
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    match (channel(0), channel(2), channel(4)) {
        (Some(r), Some(g), Some(b)) => {
            format!("rgba({r},{g},{b},{:.2})", opacity.clamp(0.0, 1.0))
        }
        _ => hex.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_matches_declaration() {
        let mut sorted = TaxonomyLabel::ORDERED;
        sorted.sort();
        assert_eq!(sorted, TaxonomyLabel::ORDERED);
        assert!(!TaxonomyLabel::ORDERED.contains(&TaxonomyLabel::NotApplicable));
    }

    #[test]
    fn test_views_partition_except_retained() {
        for label in TaxonomyLabel::ORDERED {
            let both = label.is_inflow() && label.is_outflow();
            assert_eq!(both, label == TaxonomyLabel::Retained);
            assert!(label.is_inflow() || label.is_outflow());
        }
    }

    #[test]
    fn test_with_opacity() {
        assert_eq!(with_opacity("#4C9F70", 0.5), "rgba(76,159,112,0.50)");
        assert_eq!(with_opacity("teal", 0.5), "teal");
    }
}
