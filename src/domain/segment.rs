//! Trade segmentation: per-dimension breakdown tables.
//!
//! A segment map re-runs the aggregator over each slice of the journal that
//! shares a dimension value (setup, emotion, weekday, time bucket, ...).
//! Tag dimensions are multi-membership: a trade carrying two emotion tags
//! contributes to both emotion segments, so segment trade counts can sum to
//! more than the unsegmented total. Single-valued dimensions (symbol,
//! account, direction, weekday, time bucket) are strict partitions.

use std::collections::BTreeMap;

use chrono::{Datelike, Timelike, Weekday};
use chrono_tz::Tz;

use super::aggregate::{aggregate, AggregationPolicy, MetricSummary};
use super::error::EngineError;
use super::trade::{validate_all, TagKind, TradeRecord};

/// Minutes in a day; time buckets must divide it evenly.
const MINUTES_PER_DAY: u32 = 1440;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dimension {
    Symbol,
    Account,
    Direction,
    Tag(TagKind),
    Weekday,
    TimeOfDay,
}

impl Dimension {
    /// Parse a CLI/config dimension name. Tag dimensions use their kind
    /// name directly (`setup`, `emotion`, `mistake`, `session`).
    pub fn parse(s: &str) -> Option<Dimension> {
        match s.to_lowercase().as_str() {
            "symbol" => Some(Dimension::Symbol),
            "account" => Some(Dimension::Account),
            "direction" => Some(Dimension::Direction),
            "weekday" => Some(Dimension::Weekday),
            "time-of-day" | "time_of_day" | "hour" => Some(Dimension::TimeOfDay),
            other => TagKind::parse(other).map(Dimension::Tag),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Dimension::Symbol => "symbol",
            Dimension::Account => "account",
            Dimension::Direction => "direction",
            Dimension::Tag(kind) => kind.label(),
            Dimension::Weekday => "weekday",
            Dimension::TimeOfDay => "time-of-day",
        }
    }
}

/// Calendar interpretation for weekday and time-of-day segmentation.
///
/// Timestamps are stored in UTC and converted to the trader's account
/// timezone before bucketing; session boundaries are a wall-clock concept,
/// so interpreting them as UTC would misclassify every trade east or west
/// of Greenwich.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketConfig {
    pub timezone: Tz,
    pub bucket_minutes: u32,
}

impl BucketConfig {
    pub fn new(timezone: Tz, bucket_minutes: u32) -> Result<Self, EngineError> {
        if bucket_minutes == 0
            || bucket_minutes > MINUTES_PER_DAY
            || MINUTES_PER_DAY % bucket_minutes != 0
        {
            return Err(EngineError::ConfigInvalid {
                section: "segment".into(),
                key: "bucket_minutes".into(),
                reason: format!("{bucket_minutes} does not divide the 1440-minute day"),
            });
        }
        Ok(BucketConfig {
            timezone,
            bucket_minutes,
        })
    }

    /// Hourly buckets in the given timezone.
    pub fn hourly(timezone: Tz) -> Self {
        BucketConfig {
            timezone,
            bucket_minutes: 60,
        }
    }
}

fn weekday_label(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

/// The Monday-Friday bucket universe for dense weekday heatmaps.
pub fn weekday_universe() -> Vec<String> {
    ["Monday", "Tuesday", "Wednesday", "Thursday", "Friday"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// All time buckets of a day under the given config, for dense heatmaps.
pub fn time_bucket_universe(config: &BucketConfig) -> Vec<String> {
    (0..MINUTES_PER_DAY / config.bucket_minutes)
        .map(|i| bucket_label(i * config.bucket_minutes, config.bucket_minutes))
        .collect()
}

fn bucket_label(start_minute: u32, width: u32) -> String {
    let end = start_minute + width;
    format!(
        "{:02}:{:02}-{:02}:{:02}",
        start_minute / 60,
        start_minute % 60,
        end / 60,
        end % 60
    )
}

/// Dimension values a trade belongs to. Entry time anchors the calendar
/// dimensions: the session that produced the trade is the one it entered in.
fn values_for(trade: &TradeRecord, dimension: Dimension, config: &BucketConfig) -> Vec<String> {
    match dimension {
        Dimension::Symbol => vec![trade.symbol.clone()],
        Dimension::Account => vec![trade.account.clone()],
        Dimension::Direction => vec![trade.direction.label().to_string()],
        Dimension::Tag(kind) => trade
            .tag_values(kind)
            .into_iter()
            .map(|v| v.to_string())
            .collect(),
        Dimension::Weekday => {
            let local = trade.entry_time.with_timezone(&config.timezone);
            vec![weekday_label(local.weekday()).to_string()]
        }
        Dimension::TimeOfDay => {
            let local = trade.entry_time.with_timezone(&config.timezone);
            let minute_of_day = local.hour() * 60 + local.minute();
            let start = minute_of_day - minute_of_day % config.bucket_minutes;
            vec![bucket_label(start, config.bucket_minutes)]
        }
    }
}

fn group(
    trades: &[TradeRecord],
    dimension: Dimension,
    config: &BucketConfig,
) -> BTreeMap<String, Vec<TradeRecord>> {
    let mut groups: BTreeMap<String, Vec<TradeRecord>> = BTreeMap::new();
    for trade in trades {
        for value in values_for(trade, dimension, config) {
            groups.entry(value).or_default().push(trade.clone());
        }
    }
    groups
}

/// Partition trades along a dimension and aggregate each slice.
///
/// Sparse: segments with no trades are omitted. A trade with no value along
/// the dimension (e.g. no `emotion:` tag) contributes to no segment. For tag
/// dimensions the membership is multi-valued — see the module docs.
pub fn segment(
    trades: &[TradeRecord],
    dimension: Dimension,
    config: &BucketConfig,
    policy: &AggregationPolicy,
) -> Result<BTreeMap<String, MetricSummary>, EngineError> {
    validate_all(trades)?;

    let mut result = BTreeMap::new();
    for (value, slice) in group(trades, dimension, config) {
        let summary = aggregate(&slice, policy)?;
        result.insert(value, summary);
    }
    Ok(result)
}

/// Like [`segment`], but emits an entry for every key in `universe`, using a
/// zero-trade summary where the journal has nothing — heatmap consumers can
/// rely on a dense table. Values outside the universe are dropped.
pub fn segment_fixed(
    trades: &[TradeRecord],
    dimension: Dimension,
    universe: &[String],
    config: &BucketConfig,
    policy: &AggregationPolicy,
) -> Result<BTreeMap<String, MetricSummary>, EngineError> {
    let sparse = segment(trades, dimension, config, policy)?;

    let mut result = BTreeMap::new();
    for key in universe {
        let summary = sparse.get(key).cloned().unwrap_or_else(MetricSummary::empty);
        result.insert(key.clone(), summary);
    }
    Ok(result)
}
