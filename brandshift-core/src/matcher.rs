//! Conservation matcher: decompose one account's start/end amounts into
//! individual flows whose amounts add up to the totals on each side.
//!
//! Matching is greedy and deterministic:
//! 1. self-retention for keys present in both periods
//! 2. remaining start entries paired with remaining end entries, both taken in
//!    descending amount order (ties by key)
//! 3. leftovers routed to the churn/new sentinels

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::AMOUNT_EPSILON;
use crate::error::{FlowError, Result};
use crate::key::{NodeKey, Sentinel};
use crate::period::{AccountAmounts, AmountMap};

/// One unclassified flow between a start-side and an end-side node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchedFlow {
    pub from: NodeKey,
    pub to: NodeKey,
    pub amount: f64,
}

impl MatchedFlow {
    pub fn new(from: NodeKey, to: NodeKey, amount: f64) -> Self {
        Self { from, to, amount }
    }
}

/// Decompose a single account. Returns an empty list for an empty account.
pub fn match_account(amounts: &AccountAmounts) -> Result<Vec<MatchedFlow>> {
    // non-finite amounts never reach the exhaustion test below
    amounts.check_finite()?;

    let flows = if amounts.start.is_empty() {
        amounts
            .end
            .iter()
            .map(|(k, v)| MatchedFlow::new(NodeKey::Sentinel(Sentinel::NewEntity), NodeKey::end(k), *v))
            .collect()
    } else if amounts.end.is_empty() {
        amounts
            .start
            .iter()
            .map(|(k, v)| MatchedFlow::new(NodeKey::start(k), NodeKey::Sentinel(Sentinel::ChurnedEntity), *v))
            .collect()
    } else {
        match_both(&amounts.start, &amounts.end)
    };

    verify_conservation(amounts, &flows)?;
    tracing::trace!(account = %amounts.account, flows = flows.len(), "matched account");
    Ok(flows)
}

fn match_both(start: &AmountMap, end: &AmountMap) -> Vec<MatchedFlow> {
    let mut flows = Vec::new();
    let mut start = start.clone();
    let mut end = end.clone();

    for (key, s) in start.iter_mut() {
        if let Some(e) = end.get_mut(key) {
            let m = s.min(*e);
            if m > AMOUNT_EPSILON {
                flows.push(MatchedFlow::new(NodeKey::start(key), NodeKey::end(key), m));
            }
            *s -= m;
            *e -= m;
        }
    }

    let mut starts = ranked(start);
    let mut ends = ranked(end);

    loop {
        let (Some(s), Some(e)) = (starts.front_mut(), ends.front_mut()) else {
            break;
        };
        let m = s.1.min(e.1);
        flows.push(MatchedFlow::new(NodeKey::start(&s.0), NodeKey::end(&e.0), m));
        s.1 -= m;
        e.1 -= m;
        let start_done = s.1 <= AMOUNT_EPSILON;
        let end_done = e.1 <= AMOUNT_EPSILON;
        if start_done {
            starts.pop_front();
        }
        if end_done {
            ends.pop_front();
        }
    }

    for (key, amount) in starts {
        flows.push(MatchedFlow::new(
            NodeKey::start(key),
            NodeKey::Sentinel(Sentinel::ChurnedCategory),
            amount,
        ));
    }
    for (key, amount) in ends {
        flows.push(MatchedFlow::new(
            NodeKey::Sentinel(Sentinel::NewCategory),
            NodeKey::end(key),
            amount,
        ));
    }

    flows
}

/// Non-exhausted entries, largest first, ties by key.
fn ranked(map: AmountMap) -> VecDeque<(String, f64)> {
    let mut v: Vec<(String, f64)> = map.into_iter().filter(|(_, a)| *a > AMOUNT_EPSILON).collect();
    v.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    v.into()
}

fn verify_conservation(amounts: &AccountAmounts, flows: &[MatchedFlow]) -> Result<()> {
    let outgoing: f64 = flows
        .iter()
        .filter(|f| matches!(f.from, NodeKey::Start(_)))
        .map(|f| f.amount)
        .sum();
    let incoming: f64 = flows
        .iter()
        .filter(|f| matches!(f.to, NodeKey::End(_)))
        .map(|f| f.amount)
        .sum();

    for (side, expected, matched) in [
        ("start", amounts.start_total(), outgoing),
        ("end", amounts.end_total(), incoming),
    ] {
        let tolerance = 1e-6 * expected.abs().max(1.0);
        // NaN fails this comparison too
        if !((expected - matched).abs() <= tolerance) {
            return Err(FlowError::Conservation {
                account: amounts.account.clone(),
                side,
                expected,
                matched,
            });
        }
    }

    if let Some(bad) = flows.iter().find(|f| !(f.amount > 0.0)) {
        return Err(FlowError::Conservation {
            account: amounts.account.clone(),
            side: "edge",
            expected: 0.0,
            matched: bad.amount,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(start: &[(&str, f64)], end: &[(&str, f64)]) -> AccountAmounts {
        let mut a = AccountAmounts::new("acct");
        a.start = start.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        a.end = end.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        a
    }

    fn flow(from: NodeKey, to: NodeKey, amount: f64) -> MatchedFlow {
        MatchedFlow::new(from, to, amount)
    }

    #[test]
    fn test_partial_retention_and_cross_product() {
        let flows = match_account(&account(&[("P1", 10.0)], &[("P1", 4.0), ("P2", 6.0)])).unwrap();
        assert_eq!(
            flows,
            vec![
                flow(NodeKey::start("P1"), NodeKey::end("P1"), 4.0),
                flow(NodeKey::start("P1"), NodeKey::end("P2"), 6.0),
            ]
        );
    }

    #[test]
    fn test_new_only_account() {
        let flows = match_account(&account(&[], &[("P3", 5.0)])).unwrap();
        assert_eq!(
            flows,
            vec![flow(NodeKey::Sentinel(Sentinel::NewEntity), NodeKey::end("P3"), 5.0)]
        );
    }

    #[test]
    fn test_churn_only_account() {
        let flows = match_account(&account(&[("P1", 2.0), ("P2", 1.0)], &[])).unwrap();
        assert_eq!(flows.len(), 2);
        assert!(flows.iter().all(|f| f.to == NodeKey::Sentinel(Sentinel::ChurnedEntity)));
    }

    #[test]
    fn test_leftover_start_goes_to_churn() {
        let flows = match_account(&account(&[("P1", 10.0), ("P2", 5.0)], &[("P1", 8.0)])).unwrap();
        let churn = NodeKey::Sentinel(Sentinel::ChurnedCategory);
        assert_eq!(
            flows,
            vec![
                flow(NodeKey::start("P1"), NodeKey::end("P1"), 8.0),
                flow(NodeKey::start("P2"), churn.clone(), 5.0),
                flow(NodeKey::start("P1"), churn, 2.0),
            ]
        );
    }

    #[test]
    fn test_leftover_end_comes_from_new() {
        let flows = match_account(&account(&[("P1", 3.0)], &[("P2", 2.0), ("P3", 4.0)])).unwrap();
        assert_eq!(
            flows,
            vec![
                flow(NodeKey::start("P1"), NodeKey::end("P3"), 3.0),
                flow(NodeKey::Sentinel(Sentinel::NewCategory), NodeKey::end("P3"), 1.0),
                flow(NodeKey::Sentinel(Sentinel::NewCategory), NodeKey::end("P2"), 2.0),
            ]
        );
    }

    #[test]
    fn test_amount_ties_break_by_key() {
        let a = account(&[("B", 5.0), ("A", 5.0)], &[("D", 5.0), ("C", 5.0)]);
        let flows = match_account(&a).unwrap();
        assert_eq!(flows[0], flow(NodeKey::start("A"), NodeKey::end("C"), 5.0));
        assert_eq!(flows[1], flow(NodeKey::start("B"), NodeKey::end("D"), 5.0));
    }

    #[test]
    fn test_repeat_runs_identical() {
        let a = account(
            &[("P1", 7.5), ("P2", 2.25), ("P9", 11.0)],
            &[("P2", 1.0), ("P3", 9.0), ("P4", 9.0)],
        );
        assert_eq!(match_account(&a).unwrap(), match_account(&a).unwrap());
    }

    #[test]
    fn test_infinite_amount_rejected_before_matching() {
        let a = account(&[("P1", f64::INFINITY)], &[("P2", f64::INFINITY)]);
        assert!(matches!(match_account(&a), Err(FlowError::NonFiniteAmount { .. })));
        let same_key = account(&[("P1", f64::INFINITY)], &[("P1", f64::INFINITY)]);
        assert!(matches!(match_account(&same_key), Err(FlowError::NonFiniteAmount { .. })));
    }

    #[test]
    fn test_conservation_detects_missing_mass() {
        let a = account(&[("P1", 10.0)], &[("P1", 4.0), ("P2", 6.0)]);
        let flows = vec![flow(NodeKey::start("P1"), NodeKey::end("P1"), 4.0)];
        match verify_conservation(&a, &flows) {
            Err(FlowError::Conservation { side, expected, matched, .. }) => {
                assert_eq!(side, "start");
                assert_eq!(expected, 10.0);
                assert_eq!(matched, 4.0);
            }
            other => panic!("expected conservation error, got {other:?}"),
        }
    }

    #[test]
    fn test_conservation_detects_nan_totals() {
        let a = account(&[("P1", f64::NAN)], &[("P1", 1.0)]);
        let flows = vec![flow(NodeKey::start("P1"), NodeKey::end("P1"), 1.0)];
        assert!(matches!(
            verify_conservation(&a, &flows),
            Err(FlowError::Conservation { side: "start", .. })
        ));
    }

    #[test]
    fn test_conservation_rejects_non_positive_edges() {
        let a = account(&[("P1", 5.0)], &[("P1", 5.0)]);
        let flows = vec![
            flow(NodeKey::start("P1"), NodeKey::end("P1"), 5.0),
            flow(NodeKey::start("P2"), NodeKey::Sentinel(Sentinel::ChurnedCategory), 0.0),
        ];
        assert!(matches!(
            verify_conservation(&a, &flows),
            Err(FlowError::Conservation { side: "edge", .. })
        ));
    }
}
