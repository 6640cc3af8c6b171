//! Single-pass parser turning a sheet page into week routines.
//!
//! The pass is a small state machine over the page:
//! 1. Before the first week header nothing but blank rows is allowed.
//! 2. A week span start opens a week; a workout span start opens a workout
//!    inside it. Outer spans open before inner ones.
//! 3. Every row then feeds its set header or exercise into the open workout.
//! 4. A workout span end closes the workout; a week span end closes the
//!    week. Inner spans close before outer ones.
//!
//! All four transitions can fire on the same row (one-row workouts in
//! one-row weeks), which is why they are evaluated in that fixed order.
//!
//! A workout row with a blank label continues the workout above it in the
//! same week: such rows are usually a forgotten merge, not a new session.

use chrono::{Datelike, Local};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::classify::{self, RowKind, SetHeader, WeekHeader, WorkoutHeader, WEEK_CELL, WORKOUT_CELL};
use super::merges::{GridMerge, MergeIndex, RowSpan};
use super::{Exercise, ParseError, Set, WeekRoutine, Workout};

/// One fetched sheet page, header row already removed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RawPage {
    /// Display name of the spreadsheet the page belongs to.
    pub table_name: String,

    /// Merged regions, row 0 being the first data row.
    pub merges: Vec<GridMerge>,

    /// Up to five cells per row.
    pub rows: Vec<Vec<String>>,
}

/// Parses sheet pages, resolving week dates against a fixed year.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TableParser {
    year: i32,
}

impl TableParser {
    /// Creates a parser resolving dates against `year`.
    #[must_use]
    pub const fn new(year: i32) -> Self {
        Self { year }
    }

    /// Creates a parser for the current local year.
    #[must_use]
    pub fn for_current_year() -> Self {
        Self::new(Local::now().year())
    }

    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// Parses a fetched page.
    ///
    /// # Errors
    ///
    /// Returns the first structural problem found; no partial result is kept.
    pub fn parse_page(&self, page: &RawPage) -> Result<Vec<WeekRoutine>, ParseError> {
        self.parse(&page.merges, &page.rows)
    }

    /// Parses merge descriptors and data rows into weeks.
    ///
    /// # Errors
    ///
    /// Returns the first structural problem found; no partial result is kept.
    pub fn parse(&self, merges: &[GridMerge], rows: &[Vec<String>]) -> Result<Vec<WeekRoutine>, ParseError> {
        let index = MergeIndex::build(merges, rows.len())?;
        let mut pass = Pass::new(self.year, &index);

        for (row_index, row) in rows.iter().enumerate() {
            pass.step(row_index, row)?;
        }

        let weeks = pass.output;
        debug!(
            "Parsed {} rows into {} weeks ({} week spans, {} workout spans)",
            rows.len(),
            weeks.len(),
            index.weeks().len(),
            index.workouts().len()
        );
        Ok(weeks)
    }
}

/// Accumulates exercises of the set being read.
#[derive(Debug)]
struct SetBuilder {
    number: u32,
    rounds: String,
    description: String,
    exercises: Vec<Exercise>,
    /// Header sets are kept even without exercises.
    marked: bool,
}

impl SetBuilder {
    fn unmarked() -> Self {
        Self {
            number: 0,
            rounds: String::new(),
            description: String::new(),
            exercises: Vec::new(),
            marked: false,
        }
    }

    fn from_header(header: SetHeader) -> Self {
        Self {
            number: header.number,
            rounds: header.rounds,
            description: header.description,
            exercises: Vec::new(),
            marked: true,
        }
    }

    fn resume(set: Set) -> Self {
        Self {
            number: set.number,
            rounds: set.rounds,
            description: set.description,
            exercises: set.exercises,
            marked: set.marked,
        }
    }

    fn finish(self) -> Option<Set> {
        (self.marked || !self.exercises.is_empty()).then(|| Set {
            description: self.description,
            number: self.number,
            exercises: self.exercises,
            rounds: self.rounds,
            marked: self.marked,
        })
    }
}

#[derive(Debug)]
struct WorkoutBuilder {
    number: u32,
    description: String,
    actual_number: usize,
    sets: Vec<Set>,
    current: Option<SetBuilder>,
}

impl WorkoutBuilder {
    fn new(header: WorkoutHeader, actual_number: usize) -> Self {
        Self {
            number: header.number,
            description: header.description,
            actual_number,
            sets: Vec::new(),
            current: None,
        }
    }

    /// Reopens a closed workout so that following rows extend its last set.
    fn reopen(workout: Workout) -> Self {
        let mut sets = workout.sets;
        let current = sets.pop().map(SetBuilder::resume);
        Self {
            number: workout.number,
            description: workout.description,
            actual_number: workout.actual_number,
            sets,
            current,
        }
    }

    fn push(&mut self, kind: RowKind) {
        match kind {
            RowKind::SetHeader(header) => {
                self.flush_set();
                self.current = Some(SetBuilder::from_header(header));
            }
            RowKind::Exercise(exercise) => {
                self.current
                    .get_or_insert_with(SetBuilder::unmarked)
                    .exercises
                    .push(exercise);
            }
            RowKind::Empty => {}
        }
    }

    fn flush_set(&mut self) {
        if let Some(set) = self.current.take().and_then(SetBuilder::finish) {
            self.sets.push(set);
        }
    }

    fn finish(mut self) -> Workout {
        self.flush_set();
        Workout {
            description: self.description,
            sets: self.sets,
            actual_number: self.actual_number,
            number: self.number,
        }
    }
}

#[derive(Debug)]
struct WeekBuilder {
    header: WeekHeader,
    number: usize,
    workouts: Vec<Workout>,
}

impl WeekBuilder {
    fn next_actual_number(&self) -> usize {
        self.workouts.len() + 1
    }

    fn finish(self) -> WeekRoutine {
        WeekRoutine {
            start_date: self.header.start_date,
            end_date: self.header.end_date,
            number: self.number,
            workouts: self.workouts,
            comment: self.header.comment,
        }
    }
}

/// Where the pass currently is in the week/workout nesting.
#[derive(Debug)]
enum Phase {
    BeforeWeek,
    InWeek(WeekBuilder),
    InWorkout(WeekBuilder, WorkoutBuilder),
}

/// State of one left-to-right pass over a page.
struct Pass<'a> {
    year: i32,
    weeks: &'a [RowSpan],
    workouts: &'a [RowSpan],
    row_count: usize,
    next_week: usize,
    next_workout: usize,
    phase: Phase,
    output: Vec<WeekRoutine>,
}

impl<'a> Pass<'a> {
    fn new(year: i32, index: &'a MergeIndex) -> Self {
        Self {
            year,
            weeks: index.weeks(),
            workouts: index.workouts(),
            row_count: index.row_count(),
            next_week: 0,
            next_workout: 0,
            phase: Phase::BeforeWeek,
            output: Vec::new(),
        }
    }

    fn step(&mut self, row_index: usize, row: &[String]) -> Result<(), ParseError> {
        let last_row = row_index + 1 == self.row_count;
        let week = self.weeks.get(self.next_week).copied();
        let workout = self.workouts.get(self.next_workout).copied();

        if week.is_some_and(|s| s.start == row_index) {
            self.open_week(row_index, row)?;
        }
        if workout.is_some_and(|s| s.start == row_index) {
            self.open_workout(row_index, row)?;
        }

        self.push_row(row_index, row)?;

        if last_row || workout.is_some_and(|s| s.last() == row_index) {
            self.close_workout();
            self.next_workout += 1;
        }
        if last_row || week.is_some_and(|s| s.last() == row_index) {
            self.close_week(row_index)?;
            self.next_week += 1;
        }

        Ok(())
    }

    fn open_week(&mut self, row_index: usize, row: &[String]) -> Result<(), ParseError> {
        if let Phase::InWorkout(..) = self.phase {
            return Err(ParseError::WorkoutCrossesWeek { row: row_index });
        }

        let header = classify::parse_week_header(classify::cell(row, WEEK_CELL), self.year, row_index)?;
        self.phase = Phase::InWeek(WeekBuilder {
            header,
            number: self.output.len() + 1,
            workouts: Vec::new(),
        });
        Ok(())
    }

    fn open_workout(&mut self, row_index: usize, row: &[String]) -> Result<(), ParseError> {
        let mut week = match std::mem::replace(&mut self.phase, Phase::BeforeWeek) {
            Phase::BeforeWeek if is_blank(row) => return Ok(()),
            Phase::BeforeWeek => return Err(ParseError::RowOutsideWeek { row: row_index }),
            Phase::InWorkout(mut week, workout) => {
                week.workouts.push(workout.finish());
                week
            }
            Phase::InWeek(week) => week,
        };

        let label = classify::cell(row, WORKOUT_CELL);
        let continued = if label.trim().is_empty() {
            week.workouts.pop()
        } else {
            None
        };

        let workout = match continued {
            Some(previous) => WorkoutBuilder::reopen(previous),
            None => WorkoutBuilder::new(
                classify::parse_workout_header(label, row_index)?,
                week.next_actual_number(),
            ),
        };

        self.phase = Phase::InWorkout(week, workout);
        Ok(())
    }

    fn push_row(&mut self, row_index: usize, row: &[String]) -> Result<(), ParseError> {
        let kind = classify::classify_row(row, row_index)?;

        match &mut self.phase {
            Phase::InWorkout(_, workout) => workout.push(kind),
            Phase::BeforeWeek if kind != RowKind::Empty => {
                return Err(ParseError::RowOutsideWeek { row: row_index });
            }
            // A workout merge that began before its week header opened nothing.
            Phase::InWeek(_) if kind != RowKind::Empty => {
                return Err(ParseError::RowOutsideWorkout { row: row_index });
            }
            Phase::BeforeWeek | Phase::InWeek(_) => {}
        }

        Ok(())
    }

    fn close_workout(&mut self) {
        self.phase = match std::mem::replace(&mut self.phase, Phase::BeforeWeek) {
            Phase::InWorkout(mut week, workout) => {
                week.workouts.push(workout.finish());
                Phase::InWeek(week)
            }
            other => other,
        };
    }

    fn close_week(&mut self, row_index: usize) -> Result<(), ParseError> {
        match std::mem::replace(&mut self.phase, Phase::BeforeWeek) {
            Phase::InWeek(week) => self.output.push(week.finish()),
            Phase::InWorkout(..) => return Err(ParseError::WorkoutCrossesWeek { row: row_index }),
            Phase::BeforeWeek => {}
        }
        Ok(())
    }
}

fn is_blank(row: &[String]) -> bool {
    row.iter().all(|c| c.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn rows(data: &[&[&str]]) -> Vec<Vec<String>> {
        data.iter()
            .map(|r| r.iter().map(|&c| c.to_owned()).collect())
            .collect()
    }

    fn week(start: usize, end: usize) -> GridMerge {
        GridMerge::new(start, end, 0, 1)
    }

    fn workout(start: usize, end: usize) -> GridMerge {
        GridMerge::new(start, end, 1, 2)
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const PARSER: TableParser = TableParser::new(2022);

    #[test]
    fn test_single_week_with_continuation_row() {
        let merges = [week(0, 3), workout(0, 1), workout(1, 2), workout(2, 3)];
        let data = rows(&[
            &["27-03.07 comment", "1 desc", "1\\3\\ready"],
            &["", "2 desc", "x ex", "5"],
            &["", "", "y ex"],
        ]);

        let weeks = PARSER.parse(&merges, &data).unwrap();
        assert_eq!(weeks.len(), 1);

        let first = &weeks[0];
        assert_eq!(first.start_date, date(2022, 6, 27));
        assert_eq!(first.end_date, date(2022, 7, 3));
        assert_eq!(first.number, 1);
        assert_eq!(first.comment, "comment");
        assert_eq!(first.workouts.len(), 2);

        let opening = &first.workouts[0];
        assert_eq!(opening.number, 1);
        assert_eq!(opening.description, " desc");
        assert_eq!(
            opening.sets,
            vec![Set {
                description: "ready".to_owned(),
                number: 1,
                exercises: vec![],
                rounds: "3".to_owned(),
                marked: true,
            }]
        );

        let second = &first.workouts[1];
        assert_eq!(second.number, 2);
        assert_eq!(second.sets.len(), 1);
        assert_eq!(
            second.sets[0].exercises,
            vec![Exercise::new("x ex", "5", None), Exercise::new("y ex", "", None)]
        );
    }

    #[test]
    fn test_homework_takes_an_actual_slot() {
        let merges = [week(0, 4), workout(0, 2), workout(2, 3), workout(3, 4)];
        let data = rows(&[
            &["04-10.07", "2\nвес 85%", "1\\3", ""],
            &["", "", "squat", "5", "85%"],
            &["", "отдых", "walk", "30 min"],
            &["", "3", "bench", "8"],
        ]);

        let weeks = PARSER.parse(&merges, &data).unwrap();
        let workouts = &weeks[0].workouts;

        let numbers: Vec<(usize, u32)> = workouts.iter().map(|w| (w.actual_number, w.number)).collect();
        assert_eq!(numbers, vec![(1, 2), (2, 0), (3, 3)]);
        assert_eq!(workouts[0].description, "\nвес 85%");
        assert_eq!(workouts[1].description, "отдых");
        assert!(workouts[1].is_homework());
        assert_eq!(
            workouts[0].sets[0].exercises[0].weight.as_deref(),
            Some("85%")
        );
    }

    #[test]
    fn test_actual_numbers_restart_each_week() {
        let merges = [week(0, 3), week(3, 5)];
        let data = rows(&[
            &["04-10.07", "1", "a"],
            &["", "2", "b"],
            &["", "3", "c"],
            &["11-17.07", "1", "d"],
            &["", "отдых", "e"],
        ]);

        let weeks = PARSER.parse(&merges, &data).unwrap();
        assert_eq!(weeks.len(), 2);
        for week in &weeks {
            for (i, workout) in week.workouts.iter().enumerate() {
                assert_eq!(workout.actual_number, i + 1);
            }
        }
        assert_eq!(weeks[0].workouts.len(), 3);
        assert_eq!(weeks[1].workouts.len(), 2);
        assert_eq!(weeks[1].number, 2);
    }

    #[test]
    fn test_set_numbers_pass_through() {
        let merges = [week(0, 7), workout(0, 7)];
        let data = rows(&[
            &["04-10.07", "1", "1\\2\\warm-up"],
            &["", "", "row", "10"],
            &["", "", "1\\3"],
            &["", "", "squat", "5"],
            &["", "", "4\\to failure"],
            &["", "", "pull-up", "max"],
            &["", "", "0\\"],
        ]);

        let weeks = PARSER.parse(&merges, &data).unwrap();
        let sets = &weeks[0].workouts[0].sets;
        let numbers: Vec<u32> = sets.iter().map(|s| s.number).collect();
        assert_eq!(numbers, vec![1, 1, 4, 0]);
        assert_eq!(sets[0].rounds, "2");
        assert_eq!(sets[0].description, "warm-up");
        assert_eq!(sets[2].rounds, "");
        assert_eq!(sets[2].description, "to failure");
        assert!(sets[3].exercises.is_empty());
        assert!(sets[3].is_marked());
    }

    #[test]
    fn test_exercises_before_first_header_form_unmarked_set() {
        let merges = [week(0, 3), workout(0, 3)];
        let data = rows(&[
            &["04-10.07", "1", "jog", "1 km"],
            &["", "", "", "", ""],
            &["", "", "2\\3", ""],
        ]);

        let weeks = PARSER.parse(&merges, &data).unwrap();
        let sets = &weeks[0].workouts[0].sets;
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].number, 0);
        assert!(!sets[0].is_marked());
        assert_eq!(sets[0].exercises, vec![Exercise::new("jog", "1 km", None)]);
        assert_eq!(sets[1].number, 2);
    }

    #[test]
    fn test_all_boundaries_on_one_row() {
        // One-row weeks holding one-row workouts: every row opens and closes
        // both a week and a workout.
        let merges = [week(0, 1), week(1, 2), week(2, 3)];
        let data = rows(&[
            &["01-07.08", "1 a", "x", "5"],
            &["08-14.08", "1 b", "y"],
            &["15-21.08 last", "отдых", "z"],
        ]);

        let weeks = PARSER.parse(&merges, &data).unwrap();
        assert_eq!(weeks.len(), 3);
        for (i, week) in weeks.iter().enumerate() {
            assert_eq!(week.number, i + 1);
            assert_eq!(week.workouts.len(), 1);
            assert_eq!(week.workouts[0].actual_number, 1);
            assert_eq!(week.workouts[0].sets[0].exercises.len(), 1);
        }
        assert_eq!(weeks[2].comment, "last");
        assert_eq!(weeks[2].workouts[0].number, 0);
    }

    #[test]
    fn test_unmerged_week_rows_belong_to_open_week() {
        // Week merge covers only its header row.
        let merges = [week(0, 1), week(3, 4)];
        let data = rows(&[
            &["04-10.07", "1", "a"],
            &["", "2", "b"],
            &["", "3", "c"],
            &["11-17.07", "1", "d"],
        ]);

        let weeks = PARSER.parse(&merges, &data).unwrap();
        assert_eq!(weeks.len(), 2);
        assert_eq!(weeks[0].workouts.len(), 3);
        assert_eq!(weeks[1].workouts.len(), 1);
    }

    #[test]
    fn test_blank_label_opening_a_week_is_homework() {
        let merges = [week(0, 2)];
        let data = rows(&[&["04-10.07", "", "stretch"], &["", "1", "run"]]);

        let weeks = PARSER.parse(&merges, &data).unwrap();
        let workouts = &weeks[0].workouts;
        assert_eq!(workouts.len(), 2);
        assert_eq!(workouts[0].number, 0);
        assert_eq!(workouts[0].description, "");
        assert_eq!(workouts[1].actual_number, 2);
    }

    #[test]
    fn test_leading_blank_rows_are_skipped() {
        let merges = [week(1, 2)];
        let data = rows(&[&["", "", ""], &["04-10.07", "1", "run"]]);

        let weeks = PARSER.parse(&merges, &data).unwrap();
        assert_eq!(weeks.len(), 1);
        assert_eq!(weeks[0].workouts.len(), 1);
    }

    #[test]
    fn test_rows_before_first_week_fail() {
        let merges = [week(1, 2)];
        let data = rows(&[&["", "1", "run"], &["04-10.07", "1", "run"]]);

        let err = PARSER.parse(&merges, &data).unwrap_err();
        assert_eq!(err, ParseError::RowOutsideWeek { row: 0 });
    }

    #[test]
    fn test_workout_merge_opening_before_week_fails() {
        let merges = [workout(0, 3), week(1, 3)];
        let data = rows(&[
            &["", "", ""],
            &["04-10.07", "", "squat", "5"],
            &["", "", "bench", "8"],
        ]);

        let err = PARSER.parse(&merges, &data).unwrap_err();
        assert_eq!(err, ParseError::RowOutsideWorkout { row: 1 });
    }

    #[test]
    fn test_malformed_week_header_fails_page() {
        let merges = [week(0, 1), week(1, 2)];
        let data = rows(&[&["04-10.07", "1", "run"], &["next week", "1", "run"]]);

        let err = PARSER.parse(&merges, &data).unwrap_err();
        assert!(matches!(err, ParseError::InvalidWeekHeader { row: 1, .. }));
    }

    #[test]
    fn test_workout_spanning_two_weeks_fails() {
        let merges = [week(0, 2), week(2, 4), workout(1, 3)];
        let data = rows(&[
            &["04-10.07", "1", "a"],
            &["", "2", "b"],
            &["11-17.07", "", "c"],
            &["", "1", "d"],
        ]);

        let err = PARSER.parse(&merges, &data).unwrap_err();
        assert_eq!(err, ParseError::WorkoutCrossesWeek { row: 1 });
    }

    #[test]
    fn test_empty_page() {
        assert!(PARSER.parse(&[], &[]).unwrap().is_empty());
    }

    #[test]
    fn test_parse_is_deterministic() {
        let merges = [week(0, 3), workout(0, 2), workout(2, 3)];
        let data = rows(&[
            &["26-01.01 new year", "1", "1\\3\\a"],
            &["", "", "b", "5", "20"],
            &["", "2", "c", "3-5"],
        ]);

        let first = PARSER.parse(&merges, &data).unwrap();
        let second = PARSER.parse(&merges, &data).unwrap();
        assert_eq!(first, second);
        assert_eq!(first[0].start_date, date(2022, 12, 26));
        assert_eq!(first[0].end_date, date(2023, 1, 1));
    }

    #[test]
    fn test_parse_page_round_trips_raw_page_json() {
        let json = r#"{
            "table_name": "Plan",
            "merges": [{"start_row": 0, "end_row": 2, "start_column": 0, "end_column": 1}],
            "rows": [["04-10.07", "1", "run", "5 km"], ["", "2", "swim"]]
        }"#;
        let page: RawPage = serde_json::from_str(json).unwrap();
        let weeks = PARSER.parse_page(&page).unwrap();
        assert_eq!(weeks[0].workouts.len(), 2);
    }
}
