//! Position-sizing and survival metrics derived from a `MetricSummary`.

use super::aggregate::MetricSummary;
use super::error::EngineError;
use super::trade::TradeRecord;

/// Fixed-point iteration bound for the ruin estimate.
const RUIN_MAX_ITERATIONS: usize = 100;
/// Successive-iterate convergence threshold for the ruin estimate.
const RUIN_CONVERGENCE: f64 = 1e-9;

/// Kelly criterion: the optimal fraction of capital to risk per trade,
/// `p - (1 - p) / (avg_win / avg_loss)`.
///
/// Fails with `UndefinedMetric` when the summary has no realized losses
/// (the payoff ratio denominator is zero). The result is clamped to
/// `[0, 1]` — a negative edge surfaces as 0, never as a negative sizing
/// recommendation.
pub fn kelly_criterion(summary: &MetricSummary) -> Result<f64, EngineError> {
    if summary.average_loss == 0.0 {
        return Err(EngineError::undefined(
            "kelly_criterion",
            "average loss is zero, payoff ratio is undefined",
        ));
    }
    if summary.average_win == 0.0 {
        // No winners: the edge is certainly non-positive.
        return Ok(0.0);
    }

    let payoff = summary.average_win / summary.average_loss;
    let kelly = summary.win_rate - (1.0 - summary.win_rate) / payoff;
    Ok(kelly.clamp(0.0, 1.0))
}

/// Gambler's-ruin estimate of the probability of depleting the account,
/// returned as a probability in `[0, 1]`.
///
/// The per-risk-unit extinction probability `r` is the fixed point of
///
/// ```text
/// r = (1 - p) + p * r^(1 + b)
/// ```
///
/// where `p` is the win rate and `b = average_win / average_loss` is the
/// payoff ratio in risk units. Iteration starts from `r = 1 - p` and runs
/// for at most `RUIN_MAX_ITERATIONS` (100) rounds, stopping early once
/// successive iterates differ by less than `RUIN_CONVERGENCE` (1e-9). The
/// account survives `U = account_size / average_risk` unit losses, so ruin
/// is `r^U`.
///
/// Degenerate inputs resolve before iterating: a zero win rate means
/// certain ruin (1.0); a summary with no realized losses cannot ruin
/// (0.0). A summary without risk amounts, or a non-positive account size,
/// is `UndefinedMetric`.
pub fn risk_of_ruin(summary: &MetricSummary, account_size: f64) -> Result<f64, EngineError> {
    if account_size <= 0.0 || !account_size.is_finite() {
        return Err(EngineError::undefined(
            "risk_of_ruin",
            format!("account size must be positive, got {account_size}"),
        ));
    }
    if summary.trade_count == 0 {
        return Err(EngineError::undefined(
            "risk_of_ruin",
            "no trades to estimate from",
        ));
    }
    let average_risk = summary.average_risk.ok_or_else(|| {
        EngineError::undefined("risk_of_ruin", "no trade carries a risk amount")
    })?;

    let p = summary.win_rate;
    if p <= 0.0 {
        return Ok(1.0);
    }
    if summary.average_loss == 0.0 {
        return Ok(0.0);
    }

    // Winners exist (p > 0), so average_win > 0 and the payoff is positive.
    let payoff = summary.average_win / summary.average_loss;
    let q = 1.0 - p;

    let mut r = q;
    for _ in 0..RUIN_MAX_ITERATIONS {
        let next = q + p * r.powf(1.0 + payoff);
        if (next - r).abs() < RUIN_CONVERGENCE {
            r = next;
            break;
        }
        r = next;
    }

    let units = account_size / average_risk;
    Ok(r.powf(units).clamp(0.0, 1.0))
}

/// Position-sizing consistency on a 0-100 display scale.
///
/// Population standard deviation of the realized risk amounts, relative to
/// the configured target risk, inverted: 100 means every trade risked
/// exactly the same amount, 0 means the spread was at least one full
/// target-risk unit. Monotonic in consistency.
pub fn risk_consistency(trades: &[TradeRecord], target_risk: f64) -> Result<f64, EngineError> {
    if target_risk <= 0.0 || !target_risk.is_finite() {
        return Err(EngineError::undefined(
            "risk_consistency",
            format!("target risk must be positive, got {target_risk}"),
        ));
    }

    let risks: Vec<f64> = trades.iter().filter_map(|t| t.risk_amount).collect();
    if risks.is_empty() {
        return Err(EngineError::undefined(
            "risk_consistency",
            "no trade carries a risk amount",
        ));
    }

    let n = risks.len() as f64;
    let mean = risks.iter().sum::<f64>() / n;
    let variance = risks.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();

    Ok(100.0 * (1.0 - (stddev / target_risk).min(1.0)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregate::{aggregate, AggregationPolicy};
    use crate::domain::trade::Direction;
    use chrono::{TimeZone, Utc};

    fn make_trade(id: &str, day: u32, pnl: f64, risk: Option<f64>) -> TradeRecord {
        let exit_price = if pnl > 0.0 {
            110.0
        } else if pnl < 0.0 {
            95.0
        } else {
            100.0
        };
        TradeRecord {
            id: id.into(),
            symbol: "AAPL".into(),
            account: "main".into(),
            direction: Direction::Long,
            entry_price: 100.0,
            exit_price,
            size: 10.0,
            entry_time: Utc.with_ymd_and_hms(2024, 3, day, 14, 0, 0).unwrap(),
            exit_time: Utc.with_ymd_and_hms(2024, 3, day, 16, 0, 0).unwrap(),
            pnl,
            risk_amount: risk,
            tags: vec![],
            checklist: vec![],
        }
    }

    fn summary_of(trades: &[TradeRecord]) -> MetricSummary {
        aggregate(trades, &AggregationPolicy::default()).unwrap()
    }

    #[test]
    fn kelly_positive_edge() {
        // 2/3 win rate, avg win 150, avg loss 50 -> payoff 3.
        // kelly = 2/3 - (1/3)/3 = 5/9.
        let trades = vec![
            make_trade("T1", 1, 100.0, Some(50.0)),
            make_trade("T2", 2, -50.0, Some(50.0)),
            make_trade("T3", 3, 200.0, Some(50.0)),
        ];
        let kelly = kelly_criterion(&summary_of(&trades)).unwrap();
        assert!((kelly - 5.0 / 9.0).abs() < 1e-9);
    }

    #[test]
    fn kelly_negative_edge_clamps_to_zero() {
        // 1/4 win rate with even payoff: edge is negative.
        let trades = vec![
            make_trade("T1", 1, 50.0, None),
            make_trade("T2", 2, -50.0, None),
            make_trade("T3", 3, -50.0, None),
            make_trade("T4", 4, -50.0, None),
        ];
        let kelly = kelly_criterion(&summary_of(&trades)).unwrap();
        assert_eq!(kelly, 0.0);
    }

    #[test]
    fn kelly_undefined_without_losses() {
        let trades = vec![make_trade("T1", 1, 100.0, None)];
        assert!(matches!(
            kelly_criterion(&summary_of(&trades)),
            Err(EngineError::UndefinedMetric { .. })
        ));
    }

    #[test]
    fn kelly_undefined_for_empty_summary() {
        assert!(kelly_criterion(&summary_of(&[])).is_err());
    }

    #[test]
    fn kelly_within_unit_interval() {
        // Very strong edge still caps at 1.0.
        let trades = vec![
            make_trade("T1", 1, 1000.0, None),
            make_trade("T2", 2, 1000.0, None),
            make_trade("T3", 3, 1000.0, None),
            make_trade("T4", 4, -1.0, None),
        ];
        let kelly = kelly_criterion(&summary_of(&trades)).unwrap();
        assert!((0.0..=1.0).contains(&kelly));
    }

    #[test]
    fn ruin_certain_when_never_winning() {
        let trades = vec![
            make_trade("T1", 1, -50.0, Some(50.0)),
            make_trade("T2", 2, -50.0, Some(50.0)),
        ];
        let ruin = risk_of_ruin(&summary_of(&trades), 10_000.0).unwrap();
        assert_eq!(ruin, 1.0);
    }

    #[test]
    fn ruin_zero_without_losses() {
        let trades = vec![make_trade("T1", 1, 100.0, Some(50.0))];
        let ruin = risk_of_ruin(&summary_of(&trades), 10_000.0).unwrap();
        assert_eq!(ruin, 0.0);
    }

    #[test]
    fn ruin_decreases_with_account_size() {
        // Positive edge (p = 0.4, payoff 2) so the per-unit extinction
        // probability settles strictly below 1.
        let trades = vec![
            make_trade("T1", 1, 100.0, Some(50.0)),
            make_trade("T2", 2, -50.0, Some(50.0)),
            make_trade("T3", 3, -50.0, Some(50.0)),
            make_trade("T4", 4, 100.0, Some(50.0)),
            make_trade("T5", 5, -50.0, Some(50.0)),
        ];
        let summary = summary_of(&trades);
        let small = risk_of_ruin(&summary, 500.0).unwrap();
        let large = risk_of_ruin(&summary, 5_000.0).unwrap();
        assert!(small > large);
        assert!((0.0..=1.0).contains(&small));
        assert!((0.0..=1.0).contains(&large));
    }

    #[test]
    fn ruin_high_for_negative_edge() {
        let trades = vec![
            make_trade("T1", 1, 50.0, Some(50.0)),
            make_trade("T2", 2, -50.0, Some(50.0)),
            make_trade("T3", 3, -50.0, Some(50.0)),
            make_trade("T4", 4, -50.0, Some(50.0)),
        ];
        // Even-payoff coin with p = 1/4: extinction is certain per unit.
        let ruin = risk_of_ruin(&summary_of(&trades), 1_000.0).unwrap();
        assert!(ruin > 0.99);
    }

    #[test]
    fn ruin_undefined_without_risk_amounts() {
        let trades = vec![
            make_trade("T1", 1, 100.0, None),
            make_trade("T2", 2, -50.0, None),
        ];
        assert!(risk_of_ruin(&summary_of(&trades), 10_000.0).is_err());
    }

    #[test]
    fn ruin_undefined_for_non_positive_account() {
        let trades = vec![make_trade("T1", 1, 100.0, Some(50.0))];
        assert!(risk_of_ruin(&summary_of(&trades), 0.0).is_err());
        assert!(risk_of_ruin(&summary_of(&trades), -1.0).is_err());
    }

    #[test]
    fn consistency_perfect_when_risk_never_varies() {
        let trades = vec![
            make_trade("T1", 1, 100.0, Some(50.0)),
            make_trade("T2", 2, -50.0, Some(50.0)),
        ];
        let score = risk_consistency(&trades, 50.0).unwrap();
        assert!((score - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn consistency_degrades_with_spread() {
        let tight = vec![
            make_trade("T1", 1, 100.0, Some(48.0)),
            make_trade("T2", 2, -50.0, Some(52.0)),
        ];
        let wild = vec![
            make_trade("T3", 3, 100.0, Some(10.0)),
            make_trade("T4", 4, -50.0, Some(90.0)),
        ];
        let tight_score = risk_consistency(&tight, 50.0).unwrap();
        let wild_score = risk_consistency(&wild, 50.0).unwrap();
        assert!(tight_score > wild_score);
        assert!((0.0..=100.0).contains(&tight_score));
        assert!((0.0..=100.0).contains(&wild_score));
    }

    #[test]
    fn consistency_floors_at_zero() {
        let trades = vec![
            make_trade("T1", 1, 100.0, Some(1.0)),
            make_trade("T2", 2, -50.0, Some(500.0)),
        ];
        let score = risk_consistency(&trades, 50.0).unwrap();
        assert_eq!(score, 0.0);
    }

    #[test]
    fn consistency_undefined_without_inputs() {
        let trades = vec![make_trade("T1", 1, 100.0, None)];
        assert!(risk_consistency(&trades, 50.0).is_err());
        assert!(risk_consistency(&[make_trade("T2", 2, 100.0, Some(50.0))], 0.0).is_err());
    }
}
