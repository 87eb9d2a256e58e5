//! CLI definition and dispatch.

use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand};
use serde::Serialize;

use crate::adapters::csv_trade_adapter::CsvTradeAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::text_report_adapter::TextReportAdapter;
use crate::domain::aggregate::{aggregate, AggregationPolicy};
use crate::domain::compliance::{average_compliance, compliance_score};
use crate::domain::config_validation::{validate_journal_config, validate_risk_config};
use crate::domain::error::EngineError;
use crate::domain::filter::TradeFilter;
use crate::domain::risk::{kelly_criterion, risk_consistency, risk_of_ruin};
use crate::domain::segment::{
    segment, segment_fixed, time_bucket_universe, weekday_universe, BucketConfig, Dimension,
};
use crate::domain::trade::{Direction, Tag};
use crate::ports::config_port::ConfigPort;
use crate::ports::report_port::ReportPort;
use crate::ports::trade_port::TradePort;

#[derive(Parser, Debug)]
#[command(name = "edgebook", about = "Trading journal performance analytics")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Args, Debug, Default)]
pub struct FilterArgs {
    /// Restrict to one ticker symbol
    #[arg(long)]
    pub symbol: Option<String>,
    /// Restrict to one account
    #[arg(long)]
    pub account: Option<String>,
    /// Restrict to long or short trades
    #[arg(long)]
    pub direction: Option<String>,
    /// Restrict to trades carrying a kind:value tag
    #[arg(long)]
    pub tag: Option<String>,
    /// Earliest entry date (YYYY-MM-DD, inclusive)
    #[arg(long)]
    pub from: Option<String>,
    /// Latest entry date (YYYY-MM-DD, inclusive)
    #[arg(long)]
    pub to: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Aggregate the journal into a performance summary
    Summary {
        #[arg(short, long)]
        config: PathBuf,
        #[command(flatten)]
        filter: FilterArgs,
        /// Emit JSON instead of the text report
        #[arg(long)]
        json: bool,
        /// Also write the report to a file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Break the journal down along a dimension
    Segment {
        #[arg(short, long)]
        config: PathBuf,
        /// Dimension: symbol, account, direction, setup, emotion, mistake,
        /// session, weekday, time-of-day
        #[arg(long)]
        by: String,
        /// Bucket width in minutes for time-of-day segmentation
        #[arg(long)]
        bucket_minutes: Option<i64>,
        /// Emit every bucket of the dimension's universe, zeroed when empty
        #[arg(long)]
        dense: bool,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long)]
        json: bool,
    },
    /// Kelly fraction, risk of ruin and sizing consistency
    Risk {
        #[arg(short, long)]
        config: PathBuf,
        /// Override [risk] account_size
        #[arg(long)]
        account_size: Option<f64>,
        /// Override [risk] target_risk
        #[arg(long)]
        target_risk: Option<f64>,
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long)]
        json: bool,
    },
    /// Per-trade checklist compliance
    Compliance {
        #[arg(short, long)]
        config: PathBuf,
        /// Score a single trade by id
        #[arg(long)]
        trade: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// Import a CSV journal into the SQLite store
    Import {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        csv: PathBuf,
    },
    /// Show symbols, accounts and journal coverage
    Info {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a configuration file
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Summary {
            config,
            filter,
            json,
            output,
        } => run_summary(&config, &filter, json, output.as_ref()),
        Command::Segment {
            config,
            by,
            bucket_minutes,
            dense,
            filter,
            json,
        } => run_segment(&config, &by, bucket_minutes, dense, &filter, json),
        Command::Risk {
            config,
            account_size,
            target_risk,
            filter,
            json,
        } => run_risk(&config, account_size, target_risk, &filter, json),
        Command::Compliance {
            config,
            trade,
            json,
        } => run_compliance(&config, trade.as_deref(), json),
        Command::Import { config, csv } => run_import(&config, &csv),
        Command::Info { config } => run_info(&config),
        Command::Validate { config } => run_validate(&config),
    }
}

fn fail(err: &EngineError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

pub fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, EngineError> {
    FileConfigAdapter::from_file(path).map_err(|e| EngineError::ConfigParse {
        file: path.display().to_string(),
        reason: e.to_string(),
    })
}

pub fn build_policy(config: &dyn ConfigPort) -> AggregationPolicy {
    AggregationPolicy {
        breakeven_epsilon: config.get_double("journal", "breakeven_epsilon", 0.0),
    }
}

pub fn build_bucket_config(
    config: &dyn ConfigPort,
    bucket_minutes_override: Option<i64>,
) -> Result<BucketConfig, EngineError> {
    let tz_name = config
        .get("journal", "timezone")
        .ok_or_else(|| EngineError::ConfigMissing {
            section: "journal".into(),
            key: "timezone".into(),
        })?;
    let timezone = Tz::from_str(&tz_name).map_err(|_| EngineError::ConfigInvalid {
        section: "journal".into(),
        key: "timezone".into(),
        reason: format!("'{tz_name}' is not an IANA timezone name"),
    })?;

    let minutes =
        bucket_minutes_override.unwrap_or_else(|| config.get_int("segment", "bucket_minutes", 60));
    if minutes <= 0 || minutes > 1440 {
        return Err(EngineError::ConfigInvalid {
            section: "segment".into(),
            key: "bucket_minutes".into(),
            reason: format!("{minutes} is out of range"),
        });
    }
    BucketConfig::new(timezone, minutes as u32)
}

pub fn build_filter(args: &FilterArgs) -> Result<TradeFilter, EngineError> {
    let direction = match &args.direction {
        Some(s) => Some(Direction::parse(s).ok_or_else(|| EngineError::ConfigInvalid {
            section: "filter".into(),
            key: "direction".into(),
            reason: format!("'{s}' is not long or short"),
        })?),
        None => None,
    };

    let tag = match &args.tag {
        Some(s) => Some(Tag::parse(s).ok_or_else(|| EngineError::ConfigInvalid {
            section: "filter".into(),
            key: "tag".into(),
            reason: format!("'{s}' is not a kind:value tag"),
        })?),
        None => None,
    };

    Ok(TradeFilter {
        symbol: args.symbol.clone(),
        account: args.account.clone(),
        direction,
        tag,
        from: parse_day_bound(args.from.as_deref(), "from", false)?,
        to: parse_day_bound(args.to.as_deref(), "to", true)?,
    })
}

/// `--from` snaps to the start of the day, `--to` to its end, so a
/// single-day range covers the whole session.
fn parse_day_bound(
    value: Option<&str>,
    key: &str,
    end_of_day: bool,
) -> Result<Option<DateTime<Utc>>, EngineError> {
    let Some(value) = value else {
        return Ok(None);
    };
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        EngineError::ConfigInvalid {
            section: "filter".into(),
            key: key.into(),
            reason: "invalid date format (expected YYYY-MM-DD)".into(),
        }
    })?;
    let time = if end_of_day {
        date.and_hms_opt(23, 59, 59).unwrap()
    } else {
        date.and_hms_opt(0, 0, 0).unwrap()
    };
    Ok(Some(time.and_utc()))
}

fn build_trade_port(config: &dyn ConfigPort) -> Result<Box<dyn TradePort>, EngineError> {
    let source = config
        .get("journal", "source")
        .ok_or_else(|| EngineError::ConfigMissing {
            section: "journal".into(),
            key: "source".into(),
        })?;

    match source.as_str() {
        "csv" => {
            let path = config
                .get("journal", "csv_path")
                .ok_or_else(|| EngineError::ConfigMissing {
                    section: "journal".into(),
                    key: "csv_path".into(),
                })?;
            Ok(Box::new(CsvTradeAdapter::new(PathBuf::from(path))))
        }
        "sqlite" => {
            #[cfg(feature = "sqlite")]
            {
                use crate::adapters::sqlite_trade_adapter::SqliteTradeAdapter;
                Ok(Box::new(SqliteTradeAdapter::from_config(config)?))
            }
            #[cfg(not(feature = "sqlite"))]
            {
                Err(EngineError::ConfigInvalid {
                    section: "journal".into(),
                    key: "source".into(),
                    reason: "built without sqlite support".into(),
                })
            }
        }
        other => Err(EngineError::ConfigInvalid {
            section: "journal".into(),
            key: "source".into(),
            reason: format!("unknown source '{other}' (expected csv or sqlite)"),
        }),
    }
}

fn fetch(
    config_path: &PathBuf,
    filter_args: &FilterArgs,
) -> Result<(FileConfigAdapter, Vec<crate::domain::trade::TradeRecord>), EngineError> {
    let config = load_config(config_path)?;
    validate_journal_config(&config)?;
    let filter = build_filter(filter_args)?;
    let port = build_trade_port(&config)?;
    let trades = port.fetch_trades(&filter)?;
    eprintln!("Loaded {} trades", trades.len());
    Ok((config, trades))
}

fn run_summary(
    config_path: &PathBuf,
    filter_args: &FilterArgs,
    json: bool,
    output: Option<&PathBuf>,
) -> ExitCode {
    let result = (|| -> Result<(), EngineError> {
        let (config, trades) = fetch(config_path, filter_args)?;
        let summary = aggregate(&trades, &build_policy(&config))?;

        let report = TextReportAdapter::new();
        if json {
            println!("{}", to_json(&summary)?);
        } else {
            print!("{}", report.render_summary(&summary));
        }
        if let Some(path) = output {
            report.write(&summary, &path.display().to_string())?;
            eprintln!("Report written to {}", path.display());
        }
        Ok(())
    })();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

fn run_segment(
    config_path: &PathBuf,
    by: &str,
    bucket_minutes: Option<i64>,
    dense: bool,
    filter_args: &FilterArgs,
    json: bool,
) -> ExitCode {
    let result = (|| -> Result<(), EngineError> {
        let dimension = Dimension::parse(by).ok_or_else(|| EngineError::ConfigInvalid {
            section: "segment".into(),
            key: "by".into(),
            reason: format!("unknown dimension '{by}'"),
        })?;

        let (config, trades) = fetch(config_path, filter_args)?;
        let policy = build_policy(&config);
        let bucket_config = build_bucket_config(&config, bucket_minutes)?;

        let segments = if dense {
            let universe = match dimension {
                Dimension::Weekday => weekday_universe(),
                Dimension::TimeOfDay => time_bucket_universe(&bucket_config),
                _ => {
                    return Err(EngineError::ConfigInvalid {
                        section: "segment".into(),
                        key: "dense".into(),
                        reason: format!(
                            "--dense needs a fixed universe; '{}' has none",
                            dimension.label()
                        ),
                    })
                }
            };
            segment_fixed(&trades, dimension, &universe, &bucket_config, &policy)?
        } else {
            segment(&trades, dimension, &bucket_config, &policy)?
        };

        if json {
            println!("{}", to_json(&segments)?);
        } else {
            let report = TextReportAdapter::new();
            print!("{}", report.render_segments(dimension.label(), &segments));
        }
        Ok(())
    })();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

#[derive(Debug, Serialize)]
struct RiskReport {
    kelly_fraction: Option<f64>,
    risk_of_ruin: Option<f64>,
    consistency_score: Option<f64>,
    notes: Vec<String>,
}

fn run_risk(
    config_path: &PathBuf,
    account_size_override: Option<f64>,
    target_risk_override: Option<f64>,
    filter_args: &FilterArgs,
    json: bool,
) -> ExitCode {
    let result = (|| -> Result<RiskReport, EngineError> {
        let (config, trades) = fetch(config_path, filter_args)?;
        if account_size_override.is_none() || target_risk_override.is_none() {
            validate_risk_config(&config)?;
        }
        let account_size =
            account_size_override.unwrap_or_else(|| config.get_double("risk", "account_size", 0.0));
        let target_risk =
            target_risk_override.unwrap_or_else(|| config.get_double("risk", "target_risk", 0.0));

        let summary = aggregate(&trades, &build_policy(&config))?;

        let mut report = RiskReport {
            kelly_fraction: None,
            risk_of_ruin: None,
            consistency_score: None,
            notes: Vec::new(),
        };

        // Each metric can be individually undefined without sinking the
        // others; the reason is carried in the notes.
        match kelly_criterion(&summary) {
            Ok(v) => report.kelly_fraction = Some(v),
            Err(e) => report.notes.push(e.to_string()),
        }
        match risk_of_ruin(&summary, account_size) {
            Ok(v) => report.risk_of_ruin = Some(v),
            Err(e) => report.notes.push(e.to_string()),
        }
        match risk_consistency(&trades, target_risk) {
            Ok(v) => report.consistency_score = Some(v),
            Err(e) => report.notes.push(e.to_string()),
        }

        Ok(report)
    })();

    match result {
        Ok(report) => {
            if json {
                match to_json(&report) {
                    Ok(s) => println!("{s}"),
                    Err(e) => return fail(&e),
                }
            } else {
                println!("=== Risk Profile ===\n");
                println!("  Kelly Fraction:    {}", format_pct(report.kelly_fraction));
                println!("  Risk of Ruin:      {}", format_pct(report.risk_of_ruin));
                println!(
                    "  Consistency Score: {}",
                    match report.consistency_score {
                        Some(v) => format!("{v:.0} / 100"),
                        None => "n/a".to_string(),
                    }
                );
                for note in &report.notes {
                    println!("  note: {note}");
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn format_pct(value: Option<f64>) -> String {
    match value {
        Some(v) => format!("{:.2}%", v * 100.0),
        None => "n/a".to_string(),
    }
}

#[derive(Debug, Serialize)]
struct ComplianceRow {
    trade_id: String,
    score: Option<u32>,
}

#[derive(Debug, Serialize)]
struct ComplianceReport {
    rows: Vec<ComplianceRow>,
    average: Option<f64>,
}

fn run_compliance(config_path: &PathBuf, trade_id: Option<&str>, json: bool) -> ExitCode {
    let result = (|| -> Result<ComplianceReport, EngineError> {
        let (_config, trades) = fetch(config_path, &FilterArgs::default())?;

        let selected: Vec<_> = match trade_id {
            Some(id) => {
                let found: Vec<_> = trades.into_iter().filter(|t| t.id == id).collect();
                if found.is_empty() {
                    return Err(EngineError::StorageQuery {
                        reason: format!("no trade with id '{id}'"),
                    });
                }
                found
            }
            None => trades,
        };

        let rows = selected
            .iter()
            .map(|t| ComplianceRow {
                trade_id: t.id.clone(),
                score: compliance_score(&t.checklist).ok(),
            })
            .collect();
        let average = average_compliance(&selected).ok();

        Ok(ComplianceReport { rows, average })
    })();

    match result {
        Ok(report) => {
            if json {
                match to_json(&report) {
                    Ok(s) => println!("{s}"),
                    Err(e) => return fail(&e),
                }
            } else {
                println!("=== Checklist Compliance ===\n");
                for row in &report.rows {
                    match row.score {
                        Some(score) => println!("  {:<16} {:>4}%", row.trade_id, score),
                        None => println!("  {:<16} {:>5}", row.trade_id, "n/a"),
                    }
                }
                match report.average {
                    Some(avg) => println!("\n  Average: {avg:.1}%"),
                    None => println!("\n  Average: n/a (no scored trades)"),
                }
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn run_import(config_path: &PathBuf, csv_path: &PathBuf) -> ExitCode {
    #[cfg(feature = "sqlite")]
    {
        use crate::adapters::sqlite_trade_adapter::SqliteTradeAdapter;

        let result = (|| -> Result<usize, EngineError> {
            let config = load_config(config_path)?;
            let source = CsvTradeAdapter::new(csv_path.clone());
            let trades = source.fetch_trades(&TradeFilter::default())?;

            let store = SqliteTradeAdapter::from_config(&config)?;
            store.initialize_schema()?;
            store.insert_trades(&trades)?;
            Ok(trades.len())
        })();

        match result {
            Ok(count) => {
                eprintln!("Imported {count} trades from {}", csv_path.display());
                ExitCode::SUCCESS
            }
            Err(e) => fail(&e),
        }
    }
    #[cfg(not(feature = "sqlite"))]
    {
        let _ = (config_path, csv_path);
        eprintln!("error: import requires the sqlite feature");
        ExitCode::from(1)
    }
}

fn run_info(config_path: &PathBuf) -> ExitCode {
    let result = (|| -> Result<(), EngineError> {
        let config = load_config(config_path)?;
        validate_journal_config(&config)?;
        let port = build_trade_port(&config)?;

        let accounts = port.list_accounts()?;
        println!("Accounts: {}", accounts.join(", "));

        println!("\n  {:<10} {:>7} {:>12} {:>12}", "symbol", "trades", "first", "last");
        for symbol in port.list_symbols()? {
            let filter = TradeFilter {
                symbol: Some(symbol.clone()),
                ..Default::default()
            };
            let trades = port.fetch_trades(&filter)?;
            let first = trades.iter().map(|t| t.entry_time).min();
            let last = trades.iter().map(|t| t.exit_time).max();
            match (first, last) {
                (Some(first), Some(last)) => println!(
                    "  {:<10} {:>7} {:>12} {:>12}",
                    symbol,
                    trades.len(),
                    first.format("%Y-%m-%d"),
                    last.format("%Y-%m-%d")
                ),
                _ => println!("  {:<10} {:>7}", symbol, 0),
            }
        }
        Ok(())
    })();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => fail(&e),
    }
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    let result = (|| -> Result<(), EngineError> {
        let config = load_config(config_path)?;
        validate_journal_config(&config)?;
        // The [risk] section is optional; validate it only when present.
        if config.get("risk", "account_size").is_some()
            || config.get("risk", "target_risk").is_some()
        {
            validate_risk_config(&config)?;
        }
        Ok(())
    })();

    match result {
        Ok(()) => {
            println!("Configuration OK");
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<String, EngineError> {
    serde_json::to_string_pretty(value).map_err(|e| EngineError::Storage {
        reason: format!("JSON encoding failed: {e}"),
    })
}
