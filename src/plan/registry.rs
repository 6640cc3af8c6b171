//! Shared store of parsed workout tables.
//!
//! The refresh scheduler replaces whole tables while chat handlers read
//! them. Tables are held behind `Arc`, so a replace is a single pointer swap
//! under the write lock and readers never see a half-built table.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{WeekRoutine, Workout, WorkoutTable};

/// All loaded workout tables keyed by table id.
///
/// Name and count lookups return empty results for unknown keys; week and
/// workout lookups take 1-based numbers and return `None` when out of range.
#[derive(Debug, Default, Clone)]
pub struct WorkoutPlans {
    tables: Arc<RwLock<HashMap<String, Arc<WorkoutTable>>>>,
}

impl WorkoutPlans {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces (or inserts) the table with the same id.
    pub async fn update_workout_table(&self, table: WorkoutTable) {
        let table_id = table.table_id.clone();
        let page_count = table.pages.len();

        let previous = self
            .tables
            .write()
            .await
            .insert(table_id.clone(), Arc::new(table));

        info!(
            "Workout table {} {} ({} pages)",
            table_id,
            if previous.is_some() { "replaced" } else { "loaded" },
            page_count
        );
    }

    /// Removes a table; returns true if it was loaded.
    pub async fn remove_table(&self, table_id: &str) -> bool {
        let removed = self.tables.write().await.remove(table_id).is_some();
        if removed {
            info!("Workout table {} removed", table_id);
        }
        removed
    }

    /// Returns a snapshot of one table.
    pub async fn table(&self, table_id: &str) -> Option<Arc<WorkoutTable>> {
        self.tables.read().await.get(table_id).cloned()
    }

    /// Returns the ids of all loaded tables, sorted.
    pub async fn table_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.tables.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Returns the display name of a table, if loaded.
    pub async fn table_name(&self, table_id: &str) -> Option<String> {
        self.table(table_id).await.map(|t| t.table_name.clone())
    }

    /// Returns the plan (page) names of a table; empty for unknown tables.
    pub async fn get_plan_names(&self, table_id: &str) -> Vec<String> {
        self.table(table_id)
            .await
            .map(|t| t.pages.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Returns the number of weeks in a plan; 0 if the plan is unknown.
    pub async fn get_week_number(&self, table_id: &str, plan: &str) -> usize {
        self.with_plan(table_id, plan, <[WeekRoutine]>::len)
            .await
            .unwrap_or_default()
    }

    /// Returns the number of workouts in a week; 0 if the week is unknown.
    pub async fn get_workout_number(&self, table_id: &str, plan: &str, week: usize) -> usize {
        self.with_plan(table_id, plan, |weeks| {
            week_at(weeks, week).map_or(0, |w| w.workouts.len())
        })
        .await
        .unwrap_or_default()
    }

    /// Returns a week by its 1-based number.
    pub async fn get_week_routine(&self, table_id: &str, plan: &str, week: usize) -> Option<WeekRoutine> {
        self.with_plan(table_id, plan, |weeks| week_at(weeks, week).cloned())
            .await
            .flatten()
    }

    /// Returns a workout by 1-based week number and actual number.
    pub async fn get_workout(
        &self,
        table_id: &str,
        plan: &str,
        week: usize,
        workout: usize,
    ) -> Option<Workout> {
        self.with_plan(table_id, plan, |weeks| {
            week_at(weeks, week)
                .and_then(|w| w.workout(workout))
                .cloned()
        })
        .await
        .flatten()
    }

    /// Returns the week whose date range contains `today`.
    pub async fn current_week(&self, table_id: &str, plan: &str, today: NaiveDate) -> Option<WeekRoutine> {
        self.with_plan(table_id, plan, |weeks| {
            weeks.iter().find(|w| w.contains(today)).cloned()
        })
        .await
        .flatten()
    }

    /// Runs `f` on a plan's weeks under the read lock.
    async fn with_plan<T>(
        &self,
        table_id: &str,
        plan: &str,
        f: impl FnOnce(&[WeekRoutine]) -> T,
    ) -> Option<T> {
        let tables = self.tables.read().await;
        let weeks = tables.get(table_id)?.page(plan);
        if weeks.is_none() {
            debug!("Plan {:?} not found in table {}", plan, table_id);
        }
        weeks.map(f)
    }
}

fn week_at(weeks: &[WeekRoutine], number: usize) -> Option<&WeekRoutine> {
    number.checked_sub(1).and_then(|i| weeks.get(i))
}
