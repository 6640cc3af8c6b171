//! Refresh pass results.

use chrono::{DateTime, Utc};

/// A page that could not be refreshed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    pub table_id: String,
    pub page: String,
    pub error: String,

    /// Whether a previously loaded version is still being served.
    pub kept_stale: bool,
}

/// Outcome of one refresh pass over all tracked tables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub refreshed_pages: usize,
    pub failures: Vec<PageFailure>,
}

impl RefreshReport {
    /// Starts an empty report.
    #[must_use]
    pub const fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            finished_at: started_at,
            refreshed_pages: 0,
            failures: Vec::new(),
        }
    }

    /// Returns true if every page was refreshed.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    #[must_use]
    pub fn total_pages(&self) -> usize {
        self.refreshed_pages + self.failures.len()
    }

    /// Wall-clock length of the pass.
    #[must_use]
    pub fn elapsed(&self) -> chrono::TimeDelta {
        self.finished_at - self.started_at
    }
}

/// Refresh history shared between the scheduler and the admin commands.
#[derive(Debug, Default)]
pub struct RefreshState {
    last_report: Option<RefreshReport>,
    last_success_at: Option<DateTime<Utc>>,
    pass_count: u64,
}

impl RefreshState {
    /// Creates an empty state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a finished pass.
    pub fn record(&mut self, report: RefreshReport) {
        if report.is_success() {
            self.last_success_at = Some(report.finished_at);
        }
        self.pass_count += 1;
        self.last_report = Some(report);
    }

    #[must_use]
    pub const fn last_report(&self) -> Option<&RefreshReport> {
        self.last_report.as_ref()
    }

    /// When a pass last completed without any failure.
    #[must_use]
    pub const fn last_success_at(&self) -> Option<DateTime<Utc>> {
        self.last_success_at
    }

    #[must_use]
    pub const fn pass_count(&self) -> u64 {
        self.pass_count
    }
}
