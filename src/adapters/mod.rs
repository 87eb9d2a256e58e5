//! Concrete port implementations.

pub mod csv_trade_adapter;
pub mod file_config_adapter;
pub mod text_report_adapter;

#[cfg(feature = "sqlite")]
pub mod sqlite_trade_adapter;
