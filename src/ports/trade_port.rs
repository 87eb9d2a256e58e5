//! Trade store access port trait.
//!
//! The engine is agnostic to how the journal is persisted; any store that
//! can produce validated `TradeRecord`s can sit behind this trait.

use crate::domain::error::EngineError;
use crate::domain::filter::TradeFilter;
use crate::domain::trade::TradeRecord;

pub trait TradePort {
    /// Fetch the closed trades matching the filter. Implementations must
    /// validate each record at ingestion and fail on the first malformed
    /// one rather than silently dropping it.
    fn fetch_trades(&self, filter: &TradeFilter) -> Result<Vec<TradeRecord>, EngineError>;

    fn list_symbols(&self) -> Result<Vec<String>, EngineError>;

    fn list_accounts(&self) -> Result<Vec<String>, EngineError>;
}
