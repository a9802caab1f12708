//! Per-pass statistics and progress reporting.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Number of error messages carried in a [`SyncSummary`].
pub const MAX_REPORTED_ERRORS: usize = 10;

/// Aggregate outcome of one reconciliation pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStats {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Distinct valid assets found in the repository.
    pub total_processed: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    /// Per-asset store failures.
    pub failed: usize,
    /// Manifests dropped by parsing or validation.
    pub skipped: usize,
    pub errors: Vec<String>,
}

impl SyncStats {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: None,
            total_processed: 0,
            created: 0,
            updated: 0,
            deleted: 0,
            failed: 0,
            skipped: 0,
            errors: Vec::new(),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    /// Wall-clock duration; zero until [`SyncStats::finish`] is called.
    pub fn duration(&self) -> Duration {
        self.finished_at
            .and_then(|end| (end - self.started_at).to_std().ok())
            .unwrap_or_default()
    }

    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Number of store mutations the pass made.
    pub fn changes(&self) -> usize {
        self.created + self.updated + self.deleted
    }

    pub fn summary(&self) -> SyncSummary {
        SyncSummary {
            start_time: self.started_at.to_rfc3339(),
            end_time: self.finished_at.map(|t| t.to_rfc3339()),
            duration_seconds: self.duration().as_secs_f64(),
            total_processed: self.total_processed,
            created: self.created,
            updated: self.updated,
            deleted: self.deleted,
            failed: self.failed,
            skipped: self.skipped,
            errors: self.errors.iter().take(MAX_REPORTED_ERRORS).cloned().collect(),
        }
    }
}

/// External, JSON-serializable view of [`SyncStats`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncSummary {
    pub start_time: String,
    pub end_time: Option<String>,
    pub duration_seconds: f64,
    pub total_processed: usize,
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failed: usize,
    pub skipped: usize,
    pub errors: Vec<String>,
}

/// One progress tick of a running pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncProgress {
    pub message: String,
    pub current: usize,
    pub total: usize,
}

impl SyncProgress {
    pub fn new(message: impl Into<String>, current: usize, total: usize) -> Self {
        Self {
            message: message.into(),
            current,
            total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_caps_errors() {
        let mut stats = SyncStats::new(Utc::now());
        stats.errors = (0..25).map(|i| format!("e{i}")).collect();
        stats.failed = 25;
        stats.finish();

        let summary = stats.summary();
        assert_eq!(summary.errors.len(), MAX_REPORTED_ERRORS);
        assert_eq!(summary.failed, 25);
        assert!(summary.end_time.is_some());
        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["errors"][0], "e0");
    }

    #[test]
    fn unfinished_duration_is_zero() {
        let stats = SyncStats::new(Utc::now());
        assert_eq!(stats.duration(), Duration::ZERO);
        assert!(!stats.has_failures());
    }
}
