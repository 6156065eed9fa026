//! Period amount aggregation: collapse raw records into per-account,
//! per-period amount maps.

use std::collections::BTreeMap;

use crate::AMOUNT_EPSILON;
use crate::error::{FlowError, Result};
use crate::record::{PeriodPair, PeriodRecord};

/// Category key -> summed amount. Sorted so iteration order is deterministic.
pub type AmountMap = BTreeMap<String, f64>;

/// Start and end amounts for one account.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AccountAmounts {
    pub account: String,
    pub start: AmountMap,
    pub end: AmountMap,
}

impl AccountAmounts {
    pub fn new(account: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            ..Self::default()
        }
    }

    /// No records in either period; such accounts never reach the matcher.
    pub fn is_empty(&self) -> bool {
        self.start.is_empty() && self.end.is_empty()
    }

    pub fn start_total(&self) -> f64 {
        self.start.values().sum()
    }

    pub fn end_total(&self) -> f64 {
        self.end.values().sum()
    }

    /// Every summed amount must be finite; a sum of huge inputs can overflow.
    pub fn check_finite(&self) -> Result<()> {
        let bad = self.start.iter().chain(self.end.iter()).find(|(_, v)| !v.is_finite());
        match bad {
            Some((key, amount)) => Err(FlowError::NonFiniteAmount {
                account: self.account.clone(),
                key: key.clone(),
                amount: *amount,
            }),
            None => Ok(()),
        }
    }

    fn add(&mut self, record: &PeriodRecord, periods: &PeriodPair) {
        let map = if record.period == periods.start {
            &mut self.start
        } else if record.period == periods.end {
            &mut self.end
        } else {
            return;
        };
        *map.entry(record.category_key.clone()).or_insert(0.0) += record.amount;
    }

    fn prune(&mut self) {
        self.start.retain(|_, v| *v > AMOUNT_EPSILON);
        self.end.retain(|_, v| *v > AMOUNT_EPSILON);
    }
}

/// Build the start/end maps of a single account.
pub fn aggregate_account(
    records: &[PeriodRecord],
    account: &str,
    periods: &PeriodPair,
) -> Result<AccountAmounts> {
    let mut out = AccountAmounts::new(account);
    for r in records.iter().filter(|r| r.account == account) {
        out.add(r, periods);
    }
    out.check_finite()?;
    out.prune();
    Ok(out)
}

/// Group a whole table by account in one pass.
///
/// Accounts are returned in ascending identifier order; accounts with no
/// amount in either period are dropped. Fails on the first account whose
/// sums are not finite.
pub fn group_by_account(records: &[PeriodRecord], periods: &PeriodPair) -> Result<Vec<AccountAmounts>> {
    let mut by_account: BTreeMap<&str, AccountAmounts> = BTreeMap::new();
    for r in records {
        by_account
            .entry(r.account.as_str())
            .or_insert_with(|| AccountAmounts::new(r.account.as_str()))
            .add(r, periods);
    }

    let mut out = Vec::with_capacity(by_account.len());
    for mut a in by_account.into_values() {
        a.check_finite()?;
        a.prune();
        if !a.is_empty() {
            out.push(a);
        }
    }
    Ok(out)
}
