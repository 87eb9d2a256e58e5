//! Integration tests across the analytics pipeline.
//!
//! Tests cover:
//! - Full pipeline with a mock trade port (no storage)
//! - Filter -> aggregate -> segment flow against known trades
//! - Risk metrics over aggregated summaries
//! - Compliance scoring edge cases
//! - Property-based invariants of the aggregator (proptest)
//! - CSV/SQLite adapter parity over the same journal (sqlite feature)

mod common;

use std::collections::BTreeMap;

use approx::assert_relative_eq;
use chrono_tz::America::New_York;
use chrono_tz::UTC;
use common::*;
use edgebook::domain::aggregate::{aggregate, AggregationPolicy, MetricSummary};
use edgebook::domain::compliance::{average_compliance, compliance_score};
use edgebook::domain::error::EngineError;
use edgebook::domain::filter::TradeFilter;
use edgebook::domain::primitives::r_multiple;
use edgebook::domain::risk::{kelly_criterion, risk_consistency, risk_of_ruin};
use edgebook::domain::segment::{
    segment, segment_fixed, weekday_universe, BucketConfig, Dimension,
};
use edgebook::ports::trade_port::TradePort;

mod full_pipeline {
    use super::*;

    #[test]
    fn fetch_filter_aggregate_with_mock_port() {
        let port = MockTradePort::new().with_trades(vec![
            make_trade("T1", 1, 100.0, Some(50.0)),
            make_trade("T2", 2, -50.0, Some(50.0)),
            make_trade("T3", 3, 200.0, Some(50.0)),
        ]);

        let trades = port.fetch_trades(&TradeFilter::default()).unwrap();
        let summary = aggregate(&trades, &AggregationPolicy::default()).unwrap();

        assert_eq!(summary.trade_count, 3);
        assert_relative_eq!(summary.win_rate, 2.0 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(summary.gross_profit, 300.0);
        assert_relative_eq!(summary.gross_loss, 50.0);
        assert_relative_eq!(summary.profit_factor, 6.0, epsilon = 1e-9);
        assert_relative_eq!(summary.average_r.unwrap(), 5.0 / 3.0, epsilon = 1e-9);
        assert_relative_eq!(summary.expectancy, 250.0 / 3.0, epsilon = 1e-9);
    }

    #[test]
    fn filter_narrows_before_aggregation() {
        let mut msft = make_trade("T2", 2, -50.0, None);
        msft.symbol = "MSFT".into();
        let port = MockTradePort::new()
            .with_trades(vec![make_trade("T1", 1, 100.0, None), msft]);

        let filter = TradeFilter {
            symbol: Some("AAPL".into()),
            ..Default::default()
        };
        let trades = port.fetch_trades(&filter).unwrap();
        let summary = aggregate(&trades, &AggregationPolicy::default()).unwrap();

        assert_eq!(summary.trade_count, 1);
        assert_relative_eq!(summary.net_pnl, 100.0);
    }

    #[test]
    fn port_error_propagates() {
        let port = MockTradePort::new().with_error("disk on fire");
        let err = port.fetch_trades(&TradeFilter::default()).unwrap_err();
        assert!(matches!(err, EngineError::Storage { .. }));
    }

    #[test]
    fn trade_without_risk_amount_keeps_other_metrics_valid() {
        let trades = vec![
            make_trade("T1", 1, 100.0, None),
            make_trade("T2", 2, -50.0, Some(25.0)),
        ];
        assert!(matches!(
            r_multiple(&trades[0]),
            Err(EngineError::UndefinedMetric { .. })
        ));

        let summary = aggregate(&trades, &AggregationPolicy::default()).unwrap();
        assert_relative_eq!(summary.win_rate, 0.5);
        assert_relative_eq!(summary.profit_factor, 2.0);
        // Only T2 has a risk amount: R = -2.
        assert_relative_eq!(summary.average_r.unwrap(), -2.0);
    }

    #[test]
    fn equity_curve_timestamps_non_decreasing() {
        let trades = vec![
            make_trade("T3", 9, 10.0, None),
            make_trade("T1", 3, -20.0, None),
            make_trade("T2", 6, 30.0, None),
        ];
        let summary = aggregate(&trades, &AggregationPolicy::default()).unwrap();
        for pair in summary.equity_curve.windows(2) {
            assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }
}

mod segmentation {
    use super::*;

    fn hourly() -> BucketConfig {
        BucketConfig::hourly(UTC)
    }

    #[test]
    fn direction_partition_reproduces_gross_profit() {
        let mut short = make_trade("T3", 3, 80.0, None);
        short.direction = Direction::Short;
        short.exit_price = 95.0; // price fell, short wins

        let trades = vec![
            make_trade("T1", 1, 100.0, None),
            make_trade("T2", 2, -50.0, None),
            short,
        ];

        let segments = segment(
            &trades,
            Dimension::Direction,
            &hourly(),
            &AggregationPolicy::default(),
        )
        .unwrap();

        let unsegmented = aggregate(&trades, &AggregationPolicy::default()).unwrap();
        let gross_sum: f64 = segments.values().map(|s| s.gross_profit).sum();
        let count_sum: usize = segments.values().map(|s| s.trade_count).sum();

        assert_relative_eq!(gross_sum, unsegmented.gross_profit);
        assert_eq!(count_sum, unsegmented.trade_count);
    }

    #[test]
    fn emotion_segments_overcount_multi_tagged_trades() {
        let trades = vec![
            make_tagged_trade(
                "T1",
                1,
                100.0,
                vec![
                    Tag::new(TagKind::Emotion, "calm"),
                    Tag::new(TagKind::Emotion, "confident"),
                ],
            ),
            make_tagged_trade("T2", 2, -50.0, vec![Tag::new(TagKind::Emotion, "fomo")]),
        ];

        let segments = segment(
            &trades,
            Dimension::Tag(TagKind::Emotion),
            &hourly(),
            &AggregationPolicy::default(),
        )
        .unwrap();

        let count_sum: usize = segments.values().map(|s| s.trade_count).sum();
        assert!(count_sum > trades.len());
        assert_relative_eq!(segments["fomo"].net_pnl, -50.0);
        assert_relative_eq!(segments["calm"].net_pnl, 100.0);
    }

    #[test]
    fn dense_weekday_table_has_all_five_buckets() {
        // 2024-03-11 is a Monday.
        let trades = vec![make_trade("T1", 11, 100.0, None)];
        let segments = segment_fixed(
            &trades,
            Dimension::Weekday,
            &weekday_universe(),
            &hourly(),
            &AggregationPolicy::default(),
        )
        .unwrap();

        assert_eq!(segments.len(), 5);
        assert_eq!(segments["Monday"].trade_count, 1);
        for day in ["Tuesday", "Wednesday", "Thursday", "Friday"] {
            assert_eq!(segments[day].trade_count, 0);
            assert_eq!(segments[day].win_rate, 0.0);
        }
    }

    #[test]
    fn time_of_day_heatmap_uses_account_timezone() {
        // Entry 14:30 UTC = 10:30 New York during DST.
        let trades = vec![make_trade("T1", 11, 100.0, None)];

        let ny = segment(
            &trades,
            Dimension::TimeOfDay,
            &BucketConfig::hourly(New_York),
            &AggregationPolicy::default(),
        )
        .unwrap();
        assert!(ny.contains_key("10:00-11:00"));

        let utc = segment(
            &trades,
            Dimension::TimeOfDay,
            &BucketConfig::hourly(UTC),
            &AggregationPolicy::default(),
        )
        .unwrap();
        assert!(utc.contains_key("14:00-15:00"));
    }
}

mod risk_metrics {
    use super::*;

    fn summary_of(trades: &[TradeRecord]) -> MetricSummary {
        aggregate(trades, &AggregationPolicy::default()).unwrap()
    }

    #[test]
    fn kelly_from_aggregated_journal() {
        let trades = vec![
            make_trade("T1", 1, 100.0, Some(50.0)),
            make_trade("T2", 2, -50.0, Some(50.0)),
            make_trade("T3", 3, 200.0, Some(50.0)),
        ];
        let kelly = kelly_criterion(&summary_of(&trades)).unwrap();
        assert!((0.0..=1.0).contains(&kelly));
        assert_relative_eq!(kelly, 5.0 / 9.0, epsilon = 1e-9);
    }

    #[test]
    fn kelly_undefined_surfaces_as_error() {
        let trades = vec![make_trade("T1", 1, 100.0, Some(50.0))];
        assert!(matches!(
            kelly_criterion(&summary_of(&trades)),
            Err(EngineError::UndefinedMetric { .. })
        ));
    }

    #[test]
    fn ruin_shrinks_with_deeper_account() {
        let trades = vec![
            make_trade("T1", 1, 100.0, Some(50.0)),
            make_trade("T2", 2, -50.0, Some(50.0)),
            make_trade("T3", 3, -50.0, Some(50.0)),
            make_trade("T4", 4, 100.0, Some(50.0)),
            make_trade("T5", 5, -50.0, Some(50.0)),
        ];
        let summary = summary_of(&trades);
        let shallow = risk_of_ruin(&summary, 500.0).unwrap();
        let deep = risk_of_ruin(&summary, 10_000.0).unwrap();
        assert!(shallow > deep);
    }

    #[test]
    fn consistency_rewards_steady_sizing() {
        let steady = vec![
            make_trade("T1", 1, 100.0, Some(50.0)),
            make_trade("T2", 2, -50.0, Some(50.0)),
            make_trade("T3", 3, 80.0, Some(50.0)),
        ];
        assert_relative_eq!(risk_consistency(&steady, 50.0).unwrap(), 100.0);

        let erratic = vec![
            make_trade("T4", 4, 100.0, Some(10.0)),
            make_trade("T5", 5, -50.0, Some(200.0)),
        ];
        assert!(risk_consistency(&erratic, 50.0).unwrap() < 100.0);
    }
}

mod compliance_scoring {
    use super::*;

    #[test]
    fn checklist_scores_round_half_up() {
        assert_eq!(
            compliance_score(&checklist(&[true, true, true, true, true, true, false, false]))
                .unwrap(),
            75
        );
        assert_eq!(
            compliance_score(&checklist(&[true, true, true, true, true, false, false, false]))
                .unwrap(),
            63
        );
    }

    #[test]
    fn empty_checklist_is_undefined_not_zero() {
        assert!(matches!(
            compliance_score(&[]),
            Err(EngineError::UndefinedMetric { .. })
        ));
    }

    #[test]
    fn journal_average_skips_unscored_trades() {
        let mut scored = make_trade("T1", 1, 100.0, None);
        scored.checklist = checklist(&[true, true, false, false]);
        let unscored = make_trade("T2", 2, -50.0, None);

        let avg = average_compliance(&[scored, unscored]).unwrap();
        assert_relative_eq!(avg, 50.0);
    }
}

mod aggregate_properties {
    use super::*;
    use proptest::prelude::*;

    fn arb_trades() -> impl Strategy<Value = Vec<TradeRecord>> {
        prop::collection::vec(
            (
                -1000i64..1000i64,
                1u32..28u32,
                0u32..23u32,
                prop::option::of(1u32..200u32),
            ),
            0..40,
        )
        .prop_map(|rows| {
            rows.into_iter()
                .enumerate()
                .map(|(i, (pnl_cents, day, hour, risk))| {
                    let pnl = pnl_cents as f64 / 10.0;
                    let mut trade =
                        make_trade(&format!("P{i:03}"), day, pnl, risk.map(f64::from));
                    trade.entry_time = ts(day, hour, 0);
                    trade.exit_time = ts(day, hour + 1, 0);
                    trade
                })
                .collect()
        })
    }

    proptest! {
        #[test]
        fn counts_partition_total(trades in arb_trades()) {
            let summary = aggregate(&trades, &AggregationPolicy::default()).unwrap();
            prop_assert_eq!(
                summary.win_count + summary.loss_count + summary.breakeven_count,
                summary.trade_count
            );
        }

        #[test]
        fn equity_curve_is_time_ordered(trades in arb_trades()) {
            let summary = aggregate(&trades, &AggregationPolicy::default()).unwrap();
            for pair in summary.equity_curve.windows(2) {
                prop_assert!(pair[0].timestamp <= pair[1].timestamp);
            }
        }

        #[test]
        fn max_drawdown_never_negative(trades in arb_trades()) {
            let summary = aggregate(&trades, &AggregationPolicy::default()).unwrap();
            prop_assert!(summary.max_drawdown >= 0.0);
        }

        #[test]
        fn gross_columns_never_negative(trades in arb_trades()) {
            let summary = aggregate(&trades, &AggregationPolicy::default()).unwrap();
            prop_assert!(summary.gross_profit >= 0.0);
            prop_assert!(summary.gross_loss >= 0.0);
        }

        #[test]
        fn kelly_in_unit_interval_when_defined(trades in arb_trades()) {
            let summary = aggregate(&trades, &AggregationPolicy::default()).unwrap();
            if let Ok(kelly) = kelly_criterion(&summary) {
                prop_assert!((0.0..=1.0).contains(&kelly));
            }
        }
    }
}

#[cfg(feature = "sqlite")]
mod adapter_parity {
    use super::*;
    use edgebook::adapters::csv_trade_adapter::CsvTradeAdapter;
    use edgebook::adapters::sqlite_trade_adapter::SqliteTradeAdapter;
    use std::fs;
    use tempfile::TempDir;

    const JOURNAL_CSV: &str = "\
id,symbol,account,direction,entry_price,exit_price,size,entry_time,exit_time,pnl,risk_amount,tags,checklist
T1,AAPL,main,long,100.0,110.0,10,2024-03-11T14:30:00+00:00,2024-03-11T16:00:00+00:00,100.0,50.0,setup:Breakout|emotion:calm,plan=1|stop=1
T2,AAPL,main,long,100.0,95.0,10,2024-03-12T14:30:00+00:00,2024-03-12T16:00:00+00:00,-50.0,50.0,setup:Breakout|emotion:fomo,plan=1|stop=0
T3,MSFT,main,short,400.0,390.0,5,2024-03-13T14:30:00+00:00,2024-03-13T16:00:00+00:00,50.0,,session:regular,
";

    #[test]
    fn csv_and_sqlite_yield_identical_summaries() {
        let dir = TempDir::new().unwrap();
        let csv_path = dir.path().join("trades.csv");
        fs::write(&csv_path, JOURNAL_CSV).unwrap();

        let csv_adapter = CsvTradeAdapter::new(csv_path);
        let trades = csv_adapter.fetch_trades(&TradeFilter::default()).unwrap();

        let sqlite_adapter = SqliteTradeAdapter::in_memory().unwrap();
        sqlite_adapter.initialize_schema().unwrap();
        sqlite_adapter.insert_trades(&trades).unwrap();
        let round_tripped = sqlite_adapter.fetch_trades(&TradeFilter::default()).unwrap();

        let policy = AggregationPolicy::default();
        let from_csv = aggregate(&trades, &policy).unwrap();
        let from_sqlite = aggregate(&round_tripped, &policy).unwrap();
        assert_eq!(from_csv, from_sqlite);

        let segments_csv = segment(
            &trades,
            Dimension::Tag(TagKind::Setup),
            &BucketConfig::hourly(UTC),
            &policy,
        )
        .unwrap();
        let segments_sqlite = segment(
            &round_tripped,
            Dimension::Tag(TagKind::Setup),
            &BucketConfig::hourly(UTC),
            &policy,
        )
        .unwrap();
        assert_eq!(
            segments_csv.keys().collect::<Vec<_>>(),
            segments_sqlite.keys().collect::<Vec<_>>()
        );
    }

    #[test]
    fn sqlite_filter_matches_in_memory_filter() {
        let dir = TempDir::new().unwrap();
        let csv_path = dir.path().join("trades.csv");
        fs::write(&csv_path, JOURNAL_CSV).unwrap();

        let trades = CsvTradeAdapter::new(csv_path)
            .fetch_trades(&TradeFilter::default())
            .unwrap();
        let sqlite_adapter = SqliteTradeAdapter::in_memory().unwrap();
        sqlite_adapter.initialize_schema().unwrap();
        sqlite_adapter.insert_trades(&trades).unwrap();

        let filter = TradeFilter {
            symbol: Some("AAPL".into()),
            tag: Some(Tag::new(TagKind::Emotion, "fomo")),
            ..Default::default()
        };
        let via_sqlite = sqlite_adapter.fetch_trades(&filter).unwrap();
        let via_memory = filter.apply(&trades);
        assert_eq!(via_sqlite, via_memory);
        assert_eq!(via_sqlite.len(), 1);
        assert_eq!(via_sqlite[0].id, "T2");
    }
}

mod report_output {
    use super::*;
    use edgebook::adapters::text_report_adapter::TextReportAdapter;
    use edgebook::ports::report_port::ReportPort;
    use tempfile::TempDir;

    #[test]
    fn segmented_report_written_to_disk() {
        let trades = vec![
            make_trade("T1", 1, 100.0, Some(50.0)),
            make_trade("T2", 2, -50.0, Some(50.0)),
        ];
        let policy = AggregationPolicy::default();
        let summary = aggregate(&trades, &policy).unwrap();
        let segments: BTreeMap<String, MetricSummary> = segment(
            &trades,
            Dimension::Direction,
            &BucketConfig::hourly(UTC),
            &policy,
        )
        .unwrap();

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("report.txt");
        TextReportAdapter::new()
            .write_segmented(&summary, &segments, path.to_str().unwrap())
            .unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("Performance Summary"));
        assert!(content.contains("long"));
    }
}
