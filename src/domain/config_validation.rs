//! Configuration validation.
//!
//! All config fields are checked before any data access so a typo fails the
//! run up front with a config exit code, not halfway through a report.

use std::str::FromStr;

use chrono_tz::Tz;

use crate::domain::error::EngineError;
use crate::ports::config_port::ConfigPort;

/// Bucket widths must divide the day evenly.
const MINUTES_PER_DAY: i64 = 1440;

pub fn validate_journal_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    validate_source(config)?;
    validate_timezone(config)?;
    validate_breakeven_epsilon(config)?;
    validate_bucket_minutes(config)?;
    Ok(())
}

/// The `[risk]` section is only needed by the risk metrics; validated
/// separately so `summary`/`segment` runs do not require it.
pub fn validate_risk_config(config: &dyn ConfigPort) -> Result<(), EngineError> {
    validate_account_size(config)?;
    validate_target_risk(config)?;
    Ok(())
}

fn validate_source(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let source = config
        .get("journal", "source")
        .ok_or_else(|| EngineError::ConfigMissing {
            section: "journal".to_string(),
            key: "source".to_string(),
        })?;

    match source.as_str() {
        "csv" => {
            match config.get("journal", "csv_path") {
                Some(p) if !p.trim().is_empty() => Ok(()),
                _ => Err(EngineError::ConfigMissing {
                    section: "journal".to_string(),
                    key: "csv_path".to_string(),
                }),
            }
        }
        "sqlite" => {
            match config.get("sqlite", "path") {
                Some(p) if !p.trim().is_empty() => Ok(()),
                _ => Err(EngineError::ConfigMissing {
                    section: "sqlite".to_string(),
                    key: "path".to_string(),
                }),
            }
        }
        other => Err(EngineError::ConfigInvalid {
            section: "journal".to_string(),
            key: "source".to_string(),
            reason: format!("unknown source '{other}' (expected csv or sqlite)"),
        }),
    }
}

fn validate_timezone(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let tz = config
        .get("journal", "timezone")
        .ok_or_else(|| EngineError::ConfigMissing {
            section: "journal".to_string(),
            key: "timezone".to_string(),
        })?;

    Tz::from_str(&tz).map_err(|_| EngineError::ConfigInvalid {
        section: "journal".to_string(),
        key: "timezone".to_string(),
        reason: format!("'{tz}' is not an IANA timezone name"),
    })?;
    Ok(())
}

fn validate_breakeven_epsilon(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let value = config.get_double("journal", "breakeven_epsilon", 0.0);
    if value < 0.0 || !value.is_finite() {
        return Err(EngineError::ConfigInvalid {
            section: "journal".to_string(),
            key: "breakeven_epsilon".to_string(),
            reason: "breakeven_epsilon must be non-negative".to_string(),
        });
    }
    Ok(())
}

fn validate_bucket_minutes(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let value = config.get_int("segment", "bucket_minutes", 60);
    if value <= 0 || value > MINUTES_PER_DAY || MINUTES_PER_DAY % value != 0 {
        return Err(EngineError::ConfigInvalid {
            section: "segment".to_string(),
            key: "bucket_minutes".to_string(),
            reason: format!("{value} does not divide the 1440-minute day"),
        });
    }
    Ok(())
}

fn validate_account_size(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let value = config.get_double("risk", "account_size", 0.0);
    if value <= 0.0 || !value.is_finite() {
        return Err(EngineError::ConfigInvalid {
            section: "risk".to_string(),
            key: "account_size".to_string(),
            reason: "account_size must be positive".to_string(),
        });
    }
    Ok(())
}

fn validate_target_risk(config: &dyn ConfigPort) -> Result<(), EngineError> {
    let value = config.get_double("risk", "target_risk", 0.0);
    if value <= 0.0 || !value.is_finite() {
        return Err(EngineError::ConfigInvalid {
            section: "risk".to_string(),
            key: "target_risk".to_string(),
            reason: "target_risk must be positive".to_string(),
        });
    }
    Ok(())
}
