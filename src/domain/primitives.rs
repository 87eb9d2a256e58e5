//! Per-trade metric primitives.
//!
//! Pure functions deriving single-trade values; the aggregator and segmenter
//! are built on top of these.

use chrono::Duration;

use super::error::EngineError;
use super::trade::TradeRecord;

/// Win/loss classification of a single trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Loss,
    Breakeven,
}

/// Classify a trade by the sign of its pnl, with an epsilon band around zero
/// treated as breakeven. The default epsilon is 0.0: only exactly zero pnl
/// is breakeven.
pub fn classify(trade: &TradeRecord, epsilon: f64) -> Outcome {
    if trade.pnl > epsilon {
        Outcome::Win
    } else if trade.pnl < -epsilon {
        Outcome::Loss
    } else {
        Outcome::Breakeven
    }
}

pub fn is_win(trade: &TradeRecord, epsilon: f64) -> bool {
    classify(trade, epsilon) == Outcome::Win
}

pub fn is_loss(trade: &TradeRecord, epsilon: f64) -> bool {
    classify(trade, epsilon) == Outcome::Loss
}

pub fn is_breakeven(trade: &TradeRecord, epsilon: f64) -> bool {
    classify(trade, epsilon) == Outcome::Breakeven
}

/// Profit/loss as a multiple of the amount risked.
///
/// Fails with `UndefinedMetric` when the trade carries no usable risk
/// amount. Callers must treat that as "not computable", never as zero.
pub fn r_multiple(trade: &TradeRecord) -> Result<f64, EngineError> {
    match trade.risk_amount {
        Some(risk) if risk > 0.0 => Ok(trade.pnl / risk),
        _ => Err(EngineError::undefined(
            "r_multiple",
            format!("trade {} has no risk amount", trade.id),
        )),
    }
}

/// Percentage move of the entry price in the trade's favor.
pub fn pnl_percent(trade: &TradeRecord) -> f64 {
    (trade.exit_price - trade.entry_price) / trade.entry_price * trade.direction.sign() * 100.0
}

/// Time between entry and exit. Never negative for a valid record.
pub fn hold_duration(trade: &TradeRecord) -> Duration {
    trade.exit_time - trade.entry_time
}
