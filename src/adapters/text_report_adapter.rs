//! Plain-text report adapter.
//!
//! Renders a `MetricSummary` (and optional segment tables) as an aligned
//! text block suitable for a terminal or a report file.

use std::collections::BTreeMap;
use std::fs;

use crate::domain::aggregate::MetricSummary;
use crate::domain::error::EngineError;
use crate::ports::report_port::ReportPort;

pub struct TextReportAdapter;

impl TextReportAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn render_summary(&self, summary: &MetricSummary) -> String {
        let mut out = String::new();

        out.push_str("=== Performance Summary ===\n\n");
        out.push_str(&format!("  Trades:             {:>12}\n", summary.trade_count));
        out.push_str(&format!(
            "  Wins / Losses / BE: {:>4} / {:>4} / {:>4}\n",
            summary.win_count, summary.loss_count, summary.breakeven_count
        ));
        out.push_str(&format!(
            "  Win Rate:           {:>11.1}%\n",
            summary.win_rate * 100.0
        ));
        out.push_str(&format!("  Net PnL:            {:>12.2}\n", summary.net_pnl));
        out.push_str(&format!(
            "  Gross Profit:       {:>12.2}\n",
            summary.gross_profit
        ));
        out.push_str(&format!("  Gross Loss:         {:>12.2}\n", summary.gross_loss));
        out.push_str(&format!(
            "  Profit Factor:      {}\n",
            format_ratio(summary.profit_factor)
        ));
        out.push_str(&format!(
            "  Expectancy:         {:>12.2}\n",
            summary.expectancy
        ));
        out.push_str(&format!(
            "  Average R:          {}\n",
            match summary.average_r {
                Some(r) => format!("{r:>12.2}"),
                None => format!("{:>12}", "n/a"),
            }
        ));
        out.push_str(&format!(
            "  Avg Win / Avg Loss: {:>10.2} / {:>8.2}\n",
            summary.average_win, summary.average_loss
        ));
        out.push_str(&format!(
            "  Largest Win / Loss: {:>10.2} / {:>8.2}\n",
            summary.largest_win, summary.largest_loss
        ));
        out.push_str(&format!(
            "  Max Drawdown:       {:>12.2}\n",
            summary.max_drawdown
        ));
        out.push_str(&format!(
            "  Win / Loss Streak:  {:>4} / {:>4}\n",
            summary.max_consecutive_wins, summary.max_consecutive_losses
        ));
        out.push_str(&format!(
            "  Avg Hold:           {}\n",
            format_hold(summary.average_hold_secs)
        ));

        out
    }

    pub fn render_segments(&self, title: &str, segments: &BTreeMap<String, MetricSummary>) -> String {
        let mut out = String::new();
        out.push_str(&format!("=== Breakdown by {title} ===\n\n"));
        out.push_str(&format!(
            "  {:<20} {:>7} {:>9} {:>12} {:>9} {:>12}\n",
            "segment", "trades", "win rate", "net pnl", "pf", "expectancy"
        ));

        for (value, summary) in segments {
            out.push_str(&format!(
                "  {:<20} {:>7} {:>8.1}% {:>12.2} {:>9} {:>12.2}\n",
                value,
                summary.trade_count,
                summary.win_rate * 100.0,
                summary.net_pnl,
                format_ratio(summary.profit_factor).trim_start(),
                summary.expectancy,
            ));
        }

        out
    }
}

impl Default for TextReportAdapter {
    fn default() -> Self {
        Self::new()
    }
}

fn format_ratio(value: f64) -> String {
    if value.is_infinite() {
        format!("{:>12}", "inf")
    } else {
        format!("{value:>12.2}")
    }
}

fn format_hold(secs: i64) -> String {
    if secs >= 86_400 {
        format!("{:.1}d", secs as f64 / 86_400.0)
    } else if secs >= 3_600 {
        format!("{:.1}h", secs as f64 / 3_600.0)
    } else {
        format!("{}m", secs / 60)
    }
}

impl ReportPort for TextReportAdapter {
    fn write(&self, summary: &MetricSummary, output_path: &str) -> Result<(), EngineError> {
        fs::write(output_path, self.render_summary(summary))?;
        Ok(())
    }

    fn write_segmented(
        &self,
        summary: &MetricSummary,
        segments: &BTreeMap<String, MetricSummary>,
        output_path: &str,
    ) -> Result<(), EngineError> {
        let mut content = self.render_summary(summary);
        content.push('\n');
        content.push_str(&self.render_segments("segment", segments));
        fs::write(output_path, content)?;
        Ok(())
    }
}
