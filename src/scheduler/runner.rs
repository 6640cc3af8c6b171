//! Refresh scheduler runner.
//!
//! Each pass walks every tracked table:
//! 1. Fetch and parse each page
//! 2. Pages that fail keep their previously loaded version, if any
//! 3. The rebuilt table replaces the old one only if some page succeeded
//!
//! Tables no longer tracked are dropped from the registry before the pass.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use thiserror::Error;
use tokio::sync::{RwLock, mpsc, oneshot};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use super::{PageFailure, RefreshReport, RefreshState};
use crate::config::{TrackedTable, TrackedTables};
use crate::plan::{ParseError, TableParser, WeekRoutine, WorkoutPlans, WorkoutTable};
use crate::sheets::{FetchError, SheetSource};

/// Messages that can be sent to the scheduler.
#[derive(Debug)]
pub enum RefreshMessage {
    /// Run a pass now, optionally replying with its report.
    RefreshNow(Option<oneshot::Sender<RefreshReport>>),
    /// Stop the scheduler.
    Shutdown,
}

/// Why a single page failed to refresh.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Periodic refresher of all tracked tables.
pub struct RefreshScheduler {
    source: Arc<dyn SheetSource>,
    plans: WorkoutPlans,
    tables: Arc<RwLock<TrackedTables>>,
    state: Arc<RwLock<RefreshState>>,

    /// Where reports with failures are forwarded.
    reports: Option<mpsc::Sender<RefreshReport>>,

    refresh_interval: Duration,
}

impl RefreshScheduler {
    /// Creates a scheduler refreshing once a day.
    #[must_use]
    pub fn new(
        source: Arc<dyn SheetSource>,
        plans: WorkoutPlans,
        tables: Arc<RwLock<TrackedTables>>,
        state: Arc<RwLock<RefreshState>>,
    ) -> Self {
        Self {
            source,
            plans,
            tables,
            state,
            reports: None,
            refresh_interval: Duration::from_secs(24 * 3600),
        }
    }

    /// Sets the interval between scheduled passes.
    #[must_use]
    pub const fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    /// Forwards reports containing failures to `tx`.
    #[must_use]
    pub fn with_report_channel(mut self, tx: mpsc::Sender<RefreshReport>) -> Self {
        self.reports = Some(tx);
        self
    }

    /// Runs the scheduler loop. The first pass starts immediately.
    pub async fn run(&self, mut rx: mpsc::Receiver<RefreshMessage>) {
        info!(
            "Refresh scheduler started, interval {} minutes",
            self.refresh_interval.as_secs() / 60
        );

        let mut refresh_timer = interval(self.refresh_interval);
        refresh_timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = refresh_timer.tick() => {
                    self.refresh_all().await;
                }
                msg = rx.recv() => {
                    match msg {
                        Some(RefreshMessage::RefreshNow(reply)) => {
                            debug!("Received refresh request");
                            let report = self.refresh_all().await;
                            if let Some(reply) = reply {
                                let _ = reply.send(report);
                            }
                        }
                        Some(RefreshMessage::Shutdown) | None => {
                            info!("Refresh scheduler shutting down");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Runs one pass over every tracked table.
    pub async fn refresh_all(&self) -> RefreshReport {
        let mut report = RefreshReport::new(Utc::now());
        let tracked = self.tables.read().await.tables.clone();
        let parser = TableParser::for_current_year();

        for table_id in self.plans.table_ids().await {
            if !tracked.iter().any(|t| t.table_id == table_id) {
                self.plans.remove_table(&table_id).await;
            }
        }

        for table in &tracked {
            self.refresh_table(table, &parser, &mut report).await;
        }

        report.finished_at = Utc::now();
        info!(
            "Refresh finished: {}/{} pages in {} ms",
            report.refreshed_pages,
            report.total_pages(),
            report.elapsed().num_milliseconds()
        );

        self.state.write().await.record(report.clone());

        if !report.is_success()
            && let Some(tx) = &self.reports
            && tx.send(report.clone()).await.is_err()
        {
            debug!("Report channel closed");
        }

        report
    }

    async fn refresh_table(&self, tracked: &TrackedTable, parser: &TableParser, report: &mut RefreshReport) {
        let previous = self.plans.table(&tracked.table_id).await;
        let mut table = WorkoutTable::new(
            &tracked.table_id,
            previous.as_ref().map(|t| t.table_name.clone()).unwrap_or_default(),
        );
        let mut refreshed = 0;

        for page in &tracked.pages {
            match self.load_page(&tracked.table_id, page, parser).await {
                Ok((table_name, weeks)) => {
                    if !table_name.is_empty() {
                        table.table_name = table_name;
                    }
                    table.insert_page(page.clone(), weeks);
                    refreshed += 1;
                }
                Err(e) => {
                    let stale = previous.as_ref().and_then(|t| t.page(page));
                    warn!(
                        "Failed to refresh page {:?} of {}: {}{}",
                        page,
                        tracked.table_id,
                        e,
                        if stale.is_some() { " (keeping previous version)" } else { "" }
                    );

                    if let Some(weeks) = stale {
                        table.insert_page(page.clone(), weeks.to_vec());
                    }
                    report.failures.push(PageFailure {
                        table_id: tracked.table_id.clone(),
                        page: page.clone(),
                        error: e.to_string(),
                        kept_stale: stale.is_some(),
                    });
                }
            }
        }

        report.refreshed_pages += refreshed;
        if refreshed > 0 {
            self.plans.update_workout_table(table).await;
        }
    }

    async fn load_page(
        &self,
        table_id: &str,
        page: &str,
        parser: &TableParser,
    ) -> Result<(String, Vec<WeekRoutine>), RefreshError> {
        let raw = self.source.fetch_page(table_id, page).await?;
        let weeks = parser.parse_page(&raw)?;
        Ok((raw.table_name, weeks))
    }
}

impl std::fmt::Debug for RefreshScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RefreshScheduler")
            .field("refresh_interval", &self.refresh_interval)
            .finish_non_exhaustive()
    }
}
