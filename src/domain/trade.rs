//! Trade record model and ingestion validation.
//!
//! A `TradeRecord` is a closed trade as the journal stores it. Records are
//! immutable once ingested; every derived metric is recomputed from them on
//! demand. Validation runs eagerly at ingestion so a single malformed record
//! aborts a computation instead of silently corrupting its aggregates.

use chrono::{DateTime, Utc};

use super::error::EngineError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    /// +1.0 for long, -1.0 for short.
    pub fn sign(&self) -> f64 {
        match self {
            Direction::Long => 1.0,
            Direction::Short => -1.0,
        }
    }

    pub fn parse(s: &str) -> Option<Direction> {
        match s.to_lowercase().as_str() {
            "long" | "buy" => Some(Direction::Long),
            "short" | "sell" => Some(Direction::Short),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Direction::Long => "long",
            Direction::Short => "short",
        }
    }
}

/// Namespace of a journal tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagKind {
    Setup,
    Emotion,
    Mistake,
    Session,
}

impl TagKind {
    pub fn parse(s: &str) -> Option<TagKind> {
        match s.to_lowercase().as_str() {
            "setup" => Some(TagKind::Setup),
            "emotion" => Some(TagKind::Emotion),
            "mistake" => Some(TagKind::Mistake),
            "session" => Some(TagKind::Session),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TagKind::Setup => "setup",
            TagKind::Emotion => "emotion",
            TagKind::Mistake => "mistake",
            TagKind::Session => "session",
        }
    }
}

/// A namespaced journal tag, written as `kind:value` (e.g. `setup:Breakout`,
/// `emotion:fomo`). Tags are not mutually exclusive: a trade can carry any
/// number of tags of the same kind.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Tag {
    pub kind: TagKind,
    pub value: String,
}

impl Tag {
    pub fn new(kind: TagKind, value: impl Into<String>) -> Self {
        Tag {
            kind,
            value: value.into(),
        }
    }

    /// Parse `kind:value`. Returns `None` for an unknown kind, a missing
    /// separator, or an empty value.
    pub fn parse(s: &str) -> Option<Tag> {
        let (kind_str, value) = s.split_once(':')?;
        let kind = TagKind::parse(kind_str.trim())?;
        let value = value.trim();
        if value.is_empty() {
            return None;
        }
        Some(Tag::new(kind, value))
    }
}

/// One answer on a trade's pre-flight checklist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecklistResponse {
    pub item_id: String,
    pub satisfied: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TradeRecord {
    pub id: String,
    pub symbol: String,
    pub account: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub exit_price: f64,
    pub size: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    /// Realized profit/loss in currency units, net of fees.
    pub pnl: f64,
    /// Dollar amount the trader intended to risk. Absent or zero disables
    /// R-multiple computation for this trade.
    pub risk_amount: Option<f64>,
    pub tags: Vec<Tag>,
    pub checklist: Vec<ChecklistResponse>,
}

impl TradeRecord {
    /// Check the record invariants. Called at ingestion and again at the
    /// entry of every aggregation.
    pub fn validate(&self) -> Result<(), EngineError> {
        if self.entry_price <= 0.0 || !self.entry_price.is_finite() {
            return Err(EngineError::invalid_trade(
                &self.id,
                format!("entry_price must be positive, got {}", self.entry_price),
            ));
        }
        if self.exit_price <= 0.0 || !self.exit_price.is_finite() {
            return Err(EngineError::invalid_trade(
                &self.id,
                format!("exit_price must be positive, got {}", self.exit_price),
            ));
        }
        if self.size <= 0.0 || !self.size.is_finite() {
            return Err(EngineError::invalid_trade(
                &self.id,
                format!("size must be positive, got {}", self.size),
            ));
        }
        if self.exit_time < self.entry_time {
            return Err(EngineError::invalid_trade(
                &self.id,
                "exit_time is before entry_time",
            ));
        }
        if let Some(risk) = self.risk_amount {
            if risk <= 0.0 || !risk.is_finite() {
                return Err(EngineError::invalid_trade(
                    &self.id,
                    format!("risk_amount must be positive when present, got {risk}"),
                ));
            }
        }
        if !self.pnl.is_finite() {
            return Err(EngineError::invalid_trade(&self.id, "pnl is not finite"));
        }
        // Sign agreement: pnl may not strictly oppose the directional price
        // move. Zero pnl or a flat price is always accepted (fees can push
        // a flat trade either way).
        let price_move = (self.exit_price - self.entry_price) * self.direction.sign();
        if price_move != 0.0 && self.pnl != 0.0 && price_move.signum() != self.pnl.signum() {
            return Err(EngineError::invalid_trade(
                &self.id,
                format!(
                    "pnl sign {} disagrees with {} price move {}",
                    self.pnl,
                    self.direction.label(),
                    price_move
                ),
            ));
        }
        Ok(())
    }

    /// Tag values of the given kind, in record order.
    pub fn tag_values(&self, kind: TagKind) -> Vec<&str> {
        self.tags
            .iter()
            .filter(|t| t.kind == kind)
            .map(|t| t.value.as_str())
            .collect()
    }
}

/// Validate every record, failing on the first violation. Aggregations call
/// this before touching any numbers.
pub fn validate_all(trades: &[TradeRecord]) -> Result<(), EngineError> {
    for trade in trades {
        trade.validate()?;
    }
    Ok(())
}
