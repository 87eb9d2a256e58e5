//! Report generation port trait.

use std::collections::BTreeMap;

use crate::domain::aggregate::MetricSummary;
use crate::domain::error::EngineError;

/// Port for writing analytics reports.
pub trait ReportPort {
    fn write(&self, summary: &MetricSummary, output_path: &str) -> Result<(), EngineError>;

    /// Default implementation: falls back to `write`, ignoring the segment
    /// tables.
    fn write_segmented(
        &self,
        summary: &MetricSummary,
        _segments: &BTreeMap<String, MetricSummary>,
        output_path: &str,
    ) -> Result<(), EngineError> {
        self.write(summary, output_path)
    }
}
