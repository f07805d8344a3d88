//! Running drift statistics per range, persisted on every update.
//!
//! Percentages are recomputed from the exact counts each time; nothing is
//! accumulated incrementally. The estimate is derived from the unrounded
//! drift percentage and rounded once at the end.

use crate::Result;
use crate::results::InvalidEntry;
use crate::results::RangeResult;
use crate::results::Results;
use crate::results::ResultsFile;
use serde::Deserialize;
use serde::Serialize;

/// Records processed between intra-page checkpoints.
pub const CHECKPOINT_INTERVAL: u64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsBucket {
    pub sample_total: u64,
    pub sample_invalid: u64,
    pub percent_invalid: String,
    pub total_documents: u64,
    pub total_estimated_invalid: u64,
    pub sample_percent_of_total: String,
}

impl StatsBucket {
    pub fn new(total_documents: u64) -> Self {
        Self {
            sample_total: 0,
            sample_invalid: 0,
            percent_invalid: format_percent(0.0),
            total_documents,
            total_estimated_invalid: 0,
            sample_percent_of_total: format_percent(0.0),
        }
    }

    /// Replaces the counts and re-derives every percentage and the estimate.
    /// Zero samples yields `0.0%` and an estimate of 0.
    pub fn recompute(&mut self, invalid: u64, sampled: u64) {
        self.sample_total = sampled;
        self.sample_invalid = invalid;
        let percent_invalid = percent(invalid, sampled);
        self.percent_invalid = format_percent(percent_invalid);
        self.total_estimated_invalid =
            (self.total_documents as f64 * percent_invalid / 100.0).round() as u64;
        self.sample_percent_of_total = format_percent(percent(sampled, self.total_documents));
    }
}

/// `part / whole * 100`, or 0 when `whole` is 0.
pub fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        return 0.0;
    }
    part as f64 / whole as f64 * 100.0
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Two-decimal percentage that always keeps a fractional digit: `30.0%`,
/// `13.1%`, `5.94%`.
pub fn format_percent(value: f64) -> String {
    let value = if value.is_finite() { round2(value) } else { 0.0 };
    let mut text = value.to_string();
    if !text.contains('.') {
        text.push_str(".0");
    }
    text.push('%');
    text
}

/// Owns the results document and rewrites it after every update.
pub struct StatsAggregator {
    results: Results,
    file: ResultsFile,
    repair: bool,
    initial_skip: u64,
}

impl StatsAggregator {
    pub fn new(file: ResultsFile, repair: bool, initial_skip: u64) -> Self {
        Self {
            results: Results::new(),
            file,
            repair,
            initial_skip,
        }
    }

    /// Starts a fresh bucket for `label`, discarding any previous one.
    pub fn init(&mut self, label: &str, total_documents: u64) {
        self.results
            .insert(label.to_string(), RangeResult::new(total_documents));
    }

    pub fn update(
        &mut self,
        label: &str,
        invalid: u64,
        sampled: u64,
        checkpoint: bool,
    ) -> Result<()> {
        let stats = &mut self
            .results
            .entry(label.to_string())
            .or_insert_with(|| RangeResult::new(0))
            .stats;
        stats.recompute(invalid, sampled);

        let repaired = if self.repair { " (repaired)" } else { "" };
        let prefix = if checkpoint {
            "Checkpoint: total"
        } else {
            "Total"
        };
        tracing::info!(
            range = label,
            resume_skip = self.initial_skip + sampled,
            "{prefix} invalid data: {invalid}{repaired}, total items {sampled} ({})",
            stats.percent_invalid
        );
        self.flush()
    }

    pub fn record_invalid(&mut self, label: &str, id: &str, entry: InvalidEntry) {
        self.results
            .entry(label.to_string())
            .or_insert_with(|| RangeResult::new(0))
            .invalid
            .insert(id.to_string(), entry);
    }

    pub fn flush(&self) -> Result<()> {
        self.file.write(&self.results)
    }

    pub fn bucket(&self, label: &str) -> Option<&StatsBucket> {
        self.results.get(label).map(|result| &result.stats)
    }
}
