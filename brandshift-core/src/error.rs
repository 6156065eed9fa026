//! Error type shared by every stage of the flow engine.

/// Errors raised while validating input or decomposing flows.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    /// Input table lacks required columns.
    #[error("schema error: missing required column(s): {}", .missing.join(", "))]
    Schema { missing: Vec<String> },

    /// Analysis parameters are inconsistent.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A summed amount overflowed or is otherwise not a finite number.
    #[error("amount for account '{account}', key '{key}' is not finite: {amount}")]
    NonFiniteAmount {
        account: String,
        key: String,
        amount: f64,
    },

    /// Matched amounts do not add up to the account's totals.
    /// Always a defect in the matcher, never bad input.
    #[error(
        "conservation violated for account '{account}' ({side} side): expected {expected}, matched {matched}"
    )]
    Conservation {
        account: String,
        side: &'static str,
        expected: f64,
        matched: f64,
    },
}

pub type Result<T> = std::result::Result<T, FlowError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_error_names_every_column() {
        let err = FlowError::Schema {
            missing: vec!["period".to_string(), "amount".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "schema error: missing required column(s): period, amount"
        );
    }

    #[test]
    fn test_non_finite_amount_message() {
        let err = FlowError::NonFiniteAmount {
            account: "c1".to_string(),
            key: "P1".to_string(),
            amount: f64::INFINITY,
        };
        assert_eq!(err.to_string(), "amount for account 'c1', key 'P1' is not finite: inf");
    }
}
