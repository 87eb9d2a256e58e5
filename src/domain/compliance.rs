//! Checklist compliance scoring.

use super::error::EngineError;
use super::trade::{ChecklistResponse, TradeRecord};

/// Percentage of satisfied checklist items, rounded half-up to the nearest
/// integer (5/8 -> 62.5 -> 63).
///
/// An empty checklist is `UndefinedMetric`, not 0%: a trade with no
/// checklist attached is unscored, not non-compliant.
pub fn compliance_score(responses: &[ChecklistResponse]) -> Result<u32, EngineError> {
    let total = responses.len() as u32;
    if total == 0 {
        return Err(EngineError::undefined(
            "compliance_score",
            "checklist has no items",
        ));
    }
    let satisfied = responses.iter().filter(|r| r.satisfied).count() as u32;
    // Integer round-half-up of satisfied/total * 100.
    Ok((satisfied * 200 + total) / (2 * total))
}

/// Mean per-trade compliance over trades that carry a checklist. Trades
/// without one are excluded; if none qualifies the average is undefined.
pub fn average_compliance(trades: &[TradeRecord]) -> Result<f64, EngineError> {
    let scores: Vec<u32> = trades
        .iter()
        .filter(|t| !t.checklist.is_empty())
        .map(|t| compliance_score(&t.checklist))
        .collect::<Result<_, _>>()?;

    if scores.is_empty() {
        return Err(EngineError::undefined(
            "average_compliance",
            "no trade carries a checklist",
        ));
    }
    Ok(scores.iter().sum::<u32>() as f64 / scores.len() as f64)
}
