//! CSV journal file adapter.
//!
//! Column layout:
//! `id,symbol,account,direction,entry_price,exit_price,size,entry_time,exit_time,pnl,risk_amount,tags,checklist`
//! Timestamps are RFC 3339. `tags` is a `|`-separated list of `kind:value`
//! entries, `checklist` a `|`-separated list of `item=0|1` entries; both may
//! be empty. An empty `risk_amount` means the trader recorded none.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use csv::StringRecord;

use crate::domain::error::EngineError;
use crate::domain::filter::TradeFilter;
use crate::domain::trade::{ChecklistResponse, Direction, Tag, TradeRecord};
use crate::ports::trade_port::TradePort;

const COLUMNS: [&str; 13] = [
    "id",
    "symbol",
    "account",
    "direction",
    "entry_price",
    "exit_price",
    "size",
    "entry_time",
    "exit_time",
    "pnl",
    "risk_amount",
    "tags",
    "checklist",
];

pub struct CsvTradeAdapter {
    path: PathBuf,
}

impl CsvTradeAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    fn read_all(&self) -> Result<Vec<TradeRecord>, EngineError> {
        let mut rdr =
            csv::Reader::from_path(&self.path).map_err(|e| EngineError::Storage {
                reason: format!("failed to open {}: {}", self.path.display(), e),
            })?;

        let mut trades = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| EngineError::Storage {
                reason: format!("CSV parse error on row {}: {}", line + 1, e),
            })?;
            let trade = parse_row(&record, line + 1)?;
            trade.validate()?;
            trades.push(trade);
        }
        Ok(trades)
    }
}

fn field<'a>(record: &'a StringRecord, idx: usize, row: usize) -> Result<&'a str, EngineError> {
    record
        .get(idx)
        .ok_or_else(|| EngineError::Storage {
            reason: format!("row {}: missing column {}", row, COLUMNS[idx]),
        })
        .map(str::trim)
}

fn parse_f64(value: &str, column: &str, row: usize) -> Result<f64, EngineError> {
    value.parse().map_err(|_| EngineError::Storage {
        reason: format!("row {row}: invalid {column} value '{value}'"),
    })
}

fn parse_timestamp(value: &str, column: &str, row: usize) -> Result<DateTime<Utc>, EngineError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| EngineError::Storage {
            reason: format!("row {row}: invalid {column} timestamp '{value}': {e}"),
        })
}

fn parse_tags(value: &str, row: usize) -> Result<Vec<Tag>, EngineError> {
    if value.is_empty() {
        return Ok(Vec::new());
    }
    value
        .split('|')
        .map(|entry| {
            Tag::parse(entry).ok_or_else(|| EngineError::Storage {
                reason: format!("row {row}: invalid tag '{entry}' (expected kind:value)"),
            })
        })
        .collect()
}

fn parse_checklist(value: &str, row: usize) -> Result<Vec<ChecklistResponse>, EngineError> {
    if value.is_empty() {
        return Ok(Vec::new());
    }
    value
        .split('|')
        .map(|entry| {
            let (item_id, flag) = entry.split_once('=').ok_or_else(|| EngineError::Storage {
                reason: format!("row {row}: invalid checklist entry '{entry}' (expected item=0|1)"),
            })?;
            let satisfied = match flag.trim() {
                "1" => true,
                "0" => false,
                other => {
                    return Err(EngineError::Storage {
                        reason: format!("row {row}: invalid checklist flag '{other}'"),
                    })
                }
            };
            Ok(ChecklistResponse {
                item_id: item_id.trim().to_string(),
                satisfied,
            })
        })
        .collect()
}

fn parse_row(record: &StringRecord, row: usize) -> Result<TradeRecord, EngineError> {
    let direction_str = field(record, 3, row)?;
    let direction = Direction::parse(direction_str).ok_or_else(|| EngineError::Storage {
        reason: format!("row {row}: invalid direction '{direction_str}'"),
    })?;

    let risk_str = field(record, 10, row)?;
    let risk_amount = if risk_str.is_empty() {
        None
    } else {
        Some(parse_f64(risk_str, "risk_amount", row)?)
    };

    Ok(TradeRecord {
        id: field(record, 0, row)?.to_string(),
        symbol: field(record, 1, row)?.to_string(),
        account: field(record, 2, row)?.to_string(),
        direction,
        entry_price: parse_f64(field(record, 4, row)?, "entry_price", row)?,
        exit_price: parse_f64(field(record, 5, row)?, "exit_price", row)?,
        size: parse_f64(field(record, 6, row)?, "size", row)?,
        entry_time: parse_timestamp(field(record, 7, row)?, "entry_time", row)?,
        exit_time: parse_timestamp(field(record, 8, row)?, "exit_time", row)?,
        pnl: parse_f64(field(record, 9, row)?, "pnl", row)?,
        risk_amount,
        tags: parse_tags(field(record, 11, row)?, row)?,
        checklist: parse_checklist(field(record, 12, row)?, row)?,
    })
}

impl TradePort for CsvTradeAdapter {
    fn fetch_trades(&self, filter: &TradeFilter) -> Result<Vec<TradeRecord>, EngineError> {
        let trades = self.read_all()?;
        Ok(filter.apply(&trades))
    }

    fn list_symbols(&self) -> Result<Vec<String>, EngineError> {
        let mut symbols: Vec<String> = self
            .read_all()?
            .into_iter()
            .map(|t| t.symbol)
            .collect();
        symbols.sort();
        symbols.dedup();
        Ok(symbols)
    }

    fn list_accounts(&self) -> Result<Vec<String>, EngineError> {
        let mut accounts: Vec<String> = self
            .read_all()?
            .into_iter()
            .map(|t| t.account)
            .collect();
        accounts.sort();
        accounts.dedup();
        Ok(accounts)
    }
}
