//! SQLite journal database adapter.
//!
//! Owns the journal schema: a `trades` table plus child tables for the
//! namespaced tags and the ordered checklist responses. Timestamps are
//! stored as RFC 3339 text in UTC.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

use crate::domain::error::EngineError;
use crate::domain::filter::TradeFilter;
use crate::domain::trade::{ChecklistResponse, Direction, Tag, TagKind, TradeRecord};
use crate::ports::config_port::ConfigPort;
use crate::ports::trade_port::TradePort;

pub struct SqliteTradeAdapter {
    pool: Pool<SqliteConnectionManager>,
}

impl SqliteTradeAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, EngineError> {
        let db_path = config
            .get("sqlite", "path")
            .ok_or_else(|| EngineError::ConfigMissing {
                section: "sqlite".into(),
                key: "path".into(),
            })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| EngineError::Storage {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, EngineError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| EngineError::Storage {
                reason: e.to_string(),
            })?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), EngineError> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS trades (
                id TEXT PRIMARY KEY,
                symbol TEXT NOT NULL,
                account TEXT NOT NULL,
                direction TEXT NOT NULL,
                entry_price REAL NOT NULL,
                exit_price REAL NOT NULL,
                size REAL NOT NULL,
                entry_time TEXT NOT NULL,
                exit_time TEXT NOT NULL,
                pnl REAL NOT NULL,
                risk_amount REAL
            );
            CREATE TABLE IF NOT EXISTS trade_tags (
                trade_id TEXT NOT NULL REFERENCES trades(id),
                kind TEXT NOT NULL,
                value TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS checklist_responses (
                trade_id TEXT NOT NULL REFERENCES trades(id),
                position INTEGER NOT NULL,
                item_id TEXT NOT NULL,
                satisfied INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_trades_symbol ON trades(symbol);
            CREATE INDEX IF NOT EXISTS idx_trade_tags_trade ON trade_tags(trade_id);
            CREATE INDEX IF NOT EXISTS idx_checklist_trade ON checklist_responses(trade_id);",
        )
        .map_err(|e: rusqlite::Error| EngineError::StorageQuery {
            reason: e.to_string(),
        })?;

        Ok(())
    }

    pub fn insert_trades(&self, trades: &[TradeRecord]) -> Result<(), EngineError> {
        for trade in trades {
            trade.validate()?;
        }

        let mut conn = self.conn()?;
        let tx = conn
            .transaction()
            .map_err(|e: rusqlite::Error| EngineError::StorageQuery {
                reason: e.to_string(),
            })?;

        for trade in trades {
            tx.execute(
                "INSERT OR REPLACE INTO trades
                 (id, symbol, account, direction, entry_price, exit_price, size,
                  entry_time, exit_time, pnl, risk_amount)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    trade.id,
                    trade.symbol,
                    trade.account,
                    trade.direction.label(),
                    trade.entry_price,
                    trade.exit_price,
                    trade.size,
                    trade.entry_time.to_rfc3339(),
                    trade.exit_time.to_rfc3339(),
                    trade.pnl,
                    trade.risk_amount,
                ],
            )
            .map_err(|e: rusqlite::Error| EngineError::StorageQuery {
                reason: e.to_string(),
            })?;

            tx.execute("DELETE FROM trade_tags WHERE trade_id = ?1", params![trade.id])
                .map_err(|e: rusqlite::Error| EngineError::StorageQuery {
                    reason: e.to_string(),
                })?;
            for tag in &trade.tags {
                tx.execute(
                    "INSERT INTO trade_tags (trade_id, kind, value) VALUES (?1, ?2, ?3)",
                    params![trade.id, tag.kind.label(), tag.value],
                )
                .map_err(|e: rusqlite::Error| EngineError::StorageQuery {
                    reason: e.to_string(),
                })?;
            }

            tx.execute(
                "DELETE FROM checklist_responses WHERE trade_id = ?1",
                params![trade.id],
            )
            .map_err(|e: rusqlite::Error| EngineError::StorageQuery {
                reason: e.to_string(),
            })?;
            for (position, response) in trade.checklist.iter().enumerate() {
                tx.execute(
                    "INSERT INTO checklist_responses (trade_id, position, item_id, satisfied)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![trade.id, position as i64, response.item_id, response.satisfied],
                )
                .map_err(|e: rusqlite::Error| EngineError::StorageQuery {
                    reason: e.to_string(),
                })?;
            }
        }

        tx.commit()
            .map_err(|e: rusqlite::Error| EngineError::StorageQuery {
                reason: e.to_string(),
            })?;

        Ok(())
    }

    fn conn(
        &self,
    ) -> Result<r2d2::PooledConnection<SqliteConnectionManager>, EngineError> {
        self.pool.get().map_err(|e: r2d2::Error| EngineError::Storage {
            reason: e.to_string(),
        })
    }

    fn load_tags(
        &self,
        conn: &rusqlite::Connection,
    ) -> Result<HashMap<String, Vec<Tag>>, EngineError> {
        let mut stmt = conn
            .prepare("SELECT trade_id, kind, value FROM trade_tags ORDER BY rowid")
            .map_err(|e: rusqlite::Error| EngineError::StorageQuery {
                reason: e.to_string(),
            })?;

        let rows = stmt
            .query_map([], |row| {
                let trade_id: String = row.get(0)?;
                let kind: String = row.get(1)?;
                let value: String = row.get(2)?;
                Ok((trade_id, kind, value))
            })
            .map_err(|e: rusqlite::Error| EngineError::StorageQuery {
                reason: e.to_string(),
            })?;

        let mut tags: HashMap<String, Vec<Tag>> = HashMap::new();
        for row in rows {
            let (trade_id, kind_str, value) =
                row.map_err(|e: rusqlite::Error| EngineError::StorageQuery {
                    reason: e.to_string(),
                })?;
            let kind = TagKind::parse(&kind_str).ok_or_else(|| EngineError::Storage {
                reason: format!("trade {trade_id}: unknown tag kind '{kind_str}'"),
            })?;
            tags.entry(trade_id).or_default().push(Tag::new(kind, value));
        }
        Ok(tags)
    }

    fn load_checklists(
        &self,
        conn: &rusqlite::Connection,
    ) -> Result<HashMap<String, Vec<ChecklistResponse>>, EngineError> {
        let mut stmt = conn
            .prepare(
                "SELECT trade_id, item_id, satisfied FROM checklist_responses
                 ORDER BY trade_id, position",
            )
            .map_err(|e: rusqlite::Error| EngineError::StorageQuery {
                reason: e.to_string(),
            })?;

        let rows = stmt
            .query_map([], |row| {
                let trade_id: String = row.get(0)?;
                let item_id: String = row.get(1)?;
                let satisfied: bool = row.get(2)?;
                Ok((trade_id, item_id, satisfied))
            })
            .map_err(|e: rusqlite::Error| EngineError::StorageQuery {
                reason: e.to_string(),
            })?;

        let mut checklists: HashMap<String, Vec<ChecklistResponse>> = HashMap::new();
        for row in rows {
            let (trade_id, item_id, satisfied) =
                row.map_err(|e: rusqlite::Error| EngineError::StorageQuery {
                    reason: e.to_string(),
                })?;
            checklists
                .entry(trade_id)
                .or_default()
                .push(ChecklistResponse { item_id, satisfied });
        }
        Ok(checklists)
    }
}

fn parse_stored_timestamp(value: &str, trade_id: &str) -> Result<DateTime<Utc>, EngineError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| EngineError::Storage {
            reason: format!("trade {trade_id}: invalid stored timestamp '{value}': {e}"),
        })
}

impl TradePort for SqliteTradeAdapter {
    fn fetch_trades(&self, filter: &TradeFilter) -> Result<Vec<TradeRecord>, EngineError> {
        let conn = self.conn()?;
        let mut tags = self.load_tags(&conn)?;
        let mut checklists = self.load_checklists(&conn)?;

        let mut stmt = conn
            .prepare(
                "SELECT id, symbol, account, direction, entry_price, exit_price, size,
                        entry_time, exit_time, pnl, risk_amount
                 FROM trades ORDER BY exit_time ASC, entry_time ASC, id ASC",
            )
            .map_err(|e: rusqlite::Error| EngineError::StorageQuery {
                reason: e.to_string(),
            })?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, f64>(4)?,
                    row.get::<_, f64>(5)?,
                    row.get::<_, f64>(6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, String>(8)?,
                    row.get::<_, f64>(9)?,
                    row.get::<_, Option<f64>>(10)?,
                ))
            })
            .map_err(|e: rusqlite::Error| EngineError::StorageQuery {
                reason: e.to_string(),
            })?;

        let mut trades = Vec::new();
        for row in rows {
            let (id, symbol, account, direction_str, entry_price, exit_price, size,
                entry_time_str, exit_time_str, pnl, risk_amount) =
                row.map_err(|e: rusqlite::Error| EngineError::StorageQuery {
                    reason: e.to_string(),
                })?;

            let direction =
                Direction::parse(&direction_str).ok_or_else(|| EngineError::Storage {
                    reason: format!("trade {id}: unknown stored direction '{direction_str}'"),
                })?;

            let trade = TradeRecord {
                entry_time: parse_stored_timestamp(&entry_time_str, &id)?,
                exit_time: parse_stored_timestamp(&exit_time_str, &id)?,
                tags: tags.remove(&id).unwrap_or_default(),
                checklist: checklists.remove(&id).unwrap_or_default(),
                id,
                symbol,
                account,
                direction,
                entry_price,
                exit_price,
                size,
                pnl,
                risk_amount,
            };
            trade.validate()?;
            trades.push(trade);
        }

        Ok(filter.apply(&trades))
    }

    fn list_symbols(&self) -> Result<Vec<String>, EngineError> {
        self.list_distinct("SELECT DISTINCT symbol FROM trades ORDER BY symbol")
    }

    fn list_accounts(&self) -> Result<Vec<String>, EngineError> {
        self.list_distinct("SELECT DISTINCT account FROM trades ORDER BY account")
    }
}

impl SqliteTradeAdapter {
    fn list_distinct(&self, query: &str) -> Result<Vec<String>, EngineError> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(query)
            .map_err(|e: rusqlite::Error| EngineError::StorageQuery {
                reason: e.to_string(),
            })?;
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(0))
            .map_err(|e: rusqlite::Error| EngineError::StorageQuery {
                reason: e.to_string(),
            })?;

        let mut values = Vec::new();
        for row in rows {
            values.push(row.map_err(|e: rusqlite::Error| EngineError::StorageQuery {
                reason: e.to_string(),
            })?);
        }
        Ok(values)
    }
}
