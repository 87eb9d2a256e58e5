//! Trade sequence aggregation into a `MetricSummary`.
//!
//! The summary is a pure function of the input records and the policy; it is
//! recomputed on demand and never cached by the engine. Equity-curve
//! construction sorts trades chronologically by exit time (ties broken by
//! entry time, then id) — presenting a curve in any other order is a
//! correctness bug, not a style choice.

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::error::EngineError;
use super::primitives::{classify, Outcome};
use super::trade::{validate_all, TradeRecord};

/// Zero-band and classification policy shared by every summary field.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationPolicy {
    /// Pnl within `[-epsilon, +epsilon]` counts as breakeven.
    pub breakeven_epsilon: f64,
}

impl Default for AggregationPolicy {
    fn default() -> Self {
        AggregationPolicy {
            breakeven_epsilon: 0.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    /// Cumulative realized pnl after this trade, starting from zero.
    pub equity: f64,
}

/// Summary statistics over a (possibly filtered) trade sequence.
///
/// Zero-trade and zero-loss inputs resolve per fixed conventions rather than
/// erroring: `win_rate` and `expectancy` are 0.0 for an empty input;
/// `profit_factor` is 0.0 when both gross sides are zero and `+inf` when
/// only the losses are. `average_r` is `None` when no trade carries a
/// usable risk amount.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSummary {
    pub trade_count: usize,
    pub win_count: usize,
    pub loss_count: usize,
    pub breakeven_count: usize,
    pub win_rate: f64,
    pub gross_profit: f64,
    pub gross_loss: f64,
    pub net_pnl: f64,
    pub profit_factor: f64,
    pub average_win: f64,
    pub average_loss: f64,
    /// Mean pnl per trade, in currency units.
    pub expectancy: f64,
    /// Mean R-multiple over trades with a risk amount; `None` when no trade
    /// has one. Trades without a risk amount are excluded, never counted as
    /// zero R.
    pub average_r: Option<f64>,
    /// Mean of the risk amounts that are present.
    pub average_risk: Option<f64>,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub average_hold_secs: i64,
    pub equity_curve: Vec<EquityPoint>,
    /// Largest peak-to-trough decline of the equity curve, in currency
    /// units. Always >= 0.
    pub max_drawdown: f64,
}

impl MetricSummary {
    pub fn empty() -> Self {
        MetricSummary {
            trade_count: 0,
            win_count: 0,
            loss_count: 0,
            breakeven_count: 0,
            win_rate: 0.0,
            gross_profit: 0.0,
            gross_loss: 0.0,
            net_pnl: 0.0,
            profit_factor: 0.0,
            average_win: 0.0,
            average_loss: 0.0,
            expectancy: 0.0,
            average_r: None,
            average_risk: None,
            largest_win: 0.0,
            largest_loss: 0.0,
            max_consecutive_wins: 0,
            max_consecutive_losses: 0,
            average_hold_secs: 0,
            equity_curve: Vec::new(),
            max_drawdown: 0.0,
        }
    }
}

/// Stable chronological order: exit time, then entry time, then id.
fn chronological(trades: &[TradeRecord]) -> Vec<&TradeRecord> {
    let mut ordered: Vec<&TradeRecord> = trades.iter().collect();
    ordered.sort_by(|a, b| {
        a.exit_time
            .cmp(&b.exit_time)
            .then(a.entry_time.cmp(&b.entry_time))
            .then(a.id.cmp(&b.id))
    });
    ordered
}

/// Fold a trade sequence into a `MetricSummary`.
///
/// Every record is validated first; the first invalid record aborts the
/// whole call so a malformed trade can never silently skew the totals.
/// The empty sequence is not an error.
pub fn aggregate(
    trades: &[TradeRecord],
    policy: &AggregationPolicy,
) -> Result<MetricSummary, EngineError> {
    validate_all(trades)?;

    if trades.is_empty() {
        return Ok(MetricSummary::empty());
    }

    let ordered = chronological(trades);
    let mut summary = MetricSummary::empty();
    summary.trade_count = ordered.len();

    let mut equity = 0.0_f64;
    let mut win_streak = 0usize;
    let mut loss_streak = 0usize;
    let mut r_sum = 0.0_f64;
    let mut r_count = 0usize;
    let mut risk_sum = 0.0_f64;
    let mut risk_count = 0usize;
    let mut hold_secs_total = 0i64;

    for trade in &ordered {
        match classify(trade, policy.breakeven_epsilon) {
            Outcome::Win => {
                summary.win_count += 1;
                summary.gross_profit += trade.pnl;
                if trade.pnl > summary.largest_win {
                    summary.largest_win = trade.pnl;
                }
                win_streak += 1;
                loss_streak = 0;
            }
            Outcome::Loss => {
                summary.loss_count += 1;
                summary.gross_loss += trade.pnl.abs();
                if trade.pnl.abs() > summary.largest_loss {
                    summary.largest_loss = trade.pnl.abs();
                }
                loss_streak += 1;
                win_streak = 0;
            }
            Outcome::Breakeven => {
                summary.breakeven_count += 1;
                win_streak = 0;
                loss_streak = 0;
            }
        }
        summary.max_consecutive_wins = summary.max_consecutive_wins.max(win_streak);
        summary.max_consecutive_losses = summary.max_consecutive_losses.max(loss_streak);

        if let Some(risk) = trade.risk_amount {
            r_sum += trade.pnl / risk;
            r_count += 1;
            risk_sum += risk;
            risk_count += 1;
        }

        hold_secs_total += (trade.exit_time - trade.entry_time).num_seconds();

        equity += trade.pnl;
        summary.equity_curve.push(EquityPoint {
            timestamp: trade.exit_time,
            equity,
        });
    }

    // Raw pnl sum, so the total stays truthful even when an epsilon band
    // keeps small scratches out of the gross columns.
    summary.net_pnl = equity;

    let n = summary.trade_count as f64;
    summary.win_rate = summary.win_count as f64 / n;
    summary.expectancy = summary.net_pnl / n;

    summary.profit_factor = if summary.gross_loss > 0.0 {
        summary.gross_profit / summary.gross_loss
    } else if summary.gross_profit > 0.0 {
        f64::INFINITY
    } else {
        0.0
    };

    if summary.win_count > 0 {
        summary.average_win = summary.gross_profit / summary.win_count as f64;
    }
    if summary.loss_count > 0 {
        summary.average_loss = summary.gross_loss / summary.loss_count as f64;
    }

    if r_count > 0 {
        summary.average_r = Some(r_sum / r_count as f64);
        summary.average_risk = Some(risk_sum / risk_count as f64);
    }

    summary.average_hold_secs = hold_secs_total / summary.trade_count as i64;
    summary.max_drawdown = max_drawdown(&summary.equity_curve);

    Ok(summary)
}

/// Largest peak-to-trough decline in currency units, single forward pass.
/// The curve starts from zero equity, so a losing first trade is already a
/// drawdown.
fn max_drawdown(curve: &[EquityPoint]) -> f64 {
    let mut peak = 0.0_f64;
    let mut max_dd = 0.0_f64;

    for point in curve {
        if point.equity > peak {
            peak = point.equity;
        }
        let dd = peak - point.equity;
        if dd > max_dd {
            max_dd = dd;
        }
    }

    max_dd
}
