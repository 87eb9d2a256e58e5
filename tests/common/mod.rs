#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use edgebook::domain::error::EngineError;
use edgebook::domain::filter::TradeFilter;
pub use edgebook::domain::trade::{ChecklistResponse, Direction, Tag, TagKind, TradeRecord};
use edgebook::ports::trade_port::TradePort;

pub struct MockTradePort {
    pub trades: Vec<TradeRecord>,
    pub error: Option<String>,
}

impl MockTradePort {
    pub fn new() -> Self {
        Self {
            trades: Vec::new(),
            error: None,
        }
    }

    pub fn with_trades(mut self, trades: Vec<TradeRecord>) -> Self {
        self.trades = trades;
        self
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }
}

impl TradePort for MockTradePort {
    fn fetch_trades(&self, filter: &TradeFilter) -> Result<Vec<TradeRecord>, EngineError> {
        if let Some(reason) = &self.error {
            return Err(EngineError::Storage {
                reason: reason.clone(),
            });
        }
        Ok(filter.apply(&self.trades))
    }

    fn list_symbols(&self) -> Result<Vec<String>, EngineError> {
        let mut symbols: Vec<String> = self.trades.iter().map(|t| t.symbol.clone()).collect();
        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }

    fn list_accounts(&self) -> Result<Vec<String>, EngineError> {
        let mut accounts: Vec<String> = self.trades.iter().map(|t| t.account.clone()).collect();
        accounts.sort();
        accounts.dedup();
        Ok(accounts)
    }
}

pub fn ts(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, minute, 0).unwrap()
}

/// A long AAPL trade whose exit price agrees with the pnl sign.
pub fn make_trade(id: &str, day: u32, pnl: f64, risk: Option<f64>) -> TradeRecord {
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
        entry_time: ts(day, 14, 30),
        exit_time: ts(day, 16, 0),
        pnl,
        risk_amount: risk,
        tags: Vec::new(),
        checklist: Vec::new(),
    }
}

pub fn make_tagged_trade(id: &str, day: u32, pnl: f64, tags: Vec<Tag>) -> TradeRecord {
    TradeRecord {
        tags,
        ..make_trade(id, day, pnl, None)
    }
}

pub fn checklist(pattern: &[bool]) -> Vec<ChecklistResponse> {
    pattern
        .iter()
        .enumerate()
        .map(|(i, &satisfied)| ChecklistResponse {
            item_id: format!("item{i}"),
            satisfied,
        })
        .collect()
}
