//! Typed workout plan entities produced by the table parser.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A single exercise line of a set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exercise {
    /// Exercise name as written on the sheet.
    pub description: String,

    /// Free-form repetitions: a count, a range, a distance, or empty.
    pub reps_window: String,

    /// Working weight, when the sheet gives one.
    pub weight: Option<String>,
}

impl Exercise {
    /// Creates a new exercise.
    #[must_use]
    pub fn new(description: impl Into<String>, reps_window: impl Into<String>, weight: Option<String>) -> Self {
        Self {
            description: description.into(),
            reps_window: reps_window.into(),
            weight,
        }
    }
}

/// A group of exercises introduced by a set-header row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Set {
    /// Free-form description following the header numbers.
    pub description: String,

    /// Set number exactly as printed on the sheet (0 for an unmarked set).
    ///
    /// Not unique and not contiguous, so never use it as an index into
    /// [`Workout::sets`].
    pub number: u32,

    /// Exercises in sheet row order.
    pub exercises: Vec<Exercise>,

    /// Round count as literal sheet text (`"3"`, `"3-5"`, ...), empty if absent.
    pub rounds: String,

    /// Whether a set-header row introduced the set.
    #[serde(default)]
    pub marked: bool,
}

impl Set {
    /// Returns true if the set was introduced by a header row.
    #[must_use]
    pub const fn is_marked(&self) -> bool {
        self.marked
    }
}

/// One training session within a week.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workout {
    /// Text following the declared number; may contain newlines.
    pub description: String,

    /// Sets in sheet order.
    pub sets: Vec<Set>,

    /// 1-based position within the week, counting homework entries too.
    pub actual_number: usize,

    /// Declared number from the sheet; 0 marks homework.
    pub number: u32,
}

impl Workout {
    /// Returns true for an unlabeled (homework) entry.
    #[must_use]
    pub fn is_homework(&self) -> bool {
        self.number == 0
    }

    /// Total number of exercises across all sets.
    #[must_use]
    pub fn exercise_count(&self) -> usize {
        self.sets.iter().map(|s| s.exercises.len()).sum()
    }
}

/// A calendar week of workouts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekRoutine {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,

    /// 1-based sequential week number within the page.
    pub number: usize,

    pub workouts: Vec<Workout>,

    /// Trailing free-form text of the week header.
    pub comment: String,
}

impl WeekRoutine {
    /// Checks whether `date` falls within this week's range (inclusive).
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start_date <= date && date <= self.end_date
    }

    /// Looks up a workout by its 1-based actual number.
    #[must_use]
    pub fn workout(&self, actual_number: usize) -> Option<&Workout> {
        actual_number
            .checked_sub(1)
            .and_then(|i| self.workouts.get(i))
    }
}

/// All parsed pages of one spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WorkoutTable {
    /// Opaque spreadsheet identifier.
    pub table_id: String,

    /// Display name; may be empty until fetched.
    pub table_name: String,

    /// Page (plan) name to its weeks.
    pub pages: BTreeMap<String, Vec<WeekRoutine>>,
}

impl WorkoutTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new(table_id: impl Into<String>, table_name: impl Into<String>) -> Self {
        Self {
            table_id: table_id.into(),
            table_name: table_name.into(),
            pages: BTreeMap::new(),
        }
    }

    /// Adds or replaces a page.
    pub fn insert_page(&mut self, name: impl Into<String>, weeks: Vec<WeekRoutine>) {
        self.pages.insert(name.into(), weeks);
    }

    /// Returns the weeks of a page.
    #[must_use]
    pub fn page(&self, name: &str) -> Option<&[WeekRoutine]> {
        self.pages.get(name).map(Vec::as_slice)
    }
}
