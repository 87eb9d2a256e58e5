//! Trade filtering ahead of aggregation.

use chrono::{DateTime, Utc};

use super::trade::{Direction, Tag, TradeRecord};

/// Conjunctive filter over a trade sequence. Every set field must match;
/// an empty filter passes everything. The time range applies to the entry
/// timestamp, half-open on neither side (`from <= entry_time <= to`).
#[derive(Debug, Clone, Default)]
pub struct TradeFilter {
    pub symbol: Option<String>,
    pub account: Option<String>,
    pub direction: Option<Direction>,
    pub tag: Option<Tag>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl TradeFilter {
    pub fn matches(&self, trade: &TradeRecord) -> bool {
        if let Some(symbol) = &self.symbol {
            if &trade.symbol != symbol {
                return false;
            }
        }
        if let Some(account) = &self.account {
            if &trade.account != account {
                return false;
            }
        }
        if let Some(direction) = self.direction {
            if trade.direction != direction {
                return false;
            }
        }
        if let Some(tag) = &self.tag {
            if !trade.tags.contains(tag) {
                return false;
            }
        }
        if let Some(from) = self.from {
            if trade.entry_time < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if trade.entry_time > to {
                return false;
            }
        }
        true
    }

    pub fn apply(&self, trades: &[TradeRecord]) -> Vec<TradeRecord> {
        trades
            .iter()
            .filter(|t| self.matches(t))
            .cloned()
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.symbol.is_none()
            && self.account.is_none()
            && self.direction.is_none()
            && self.tag.is_none()
            && self.from.is_none()
            && self.to.is_none()
    }
}
