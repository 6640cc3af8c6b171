//! Week and workout row spans derived from sheet cell merges.
//!
//! Column 0 merges mark weeks, column 1 merges mark workouts. Rows left
//! unmerged in column 1 are single-row workouts, so the workout list is
//! gap-filled to cover every data row (a page without workout merges becomes
//! one workout per row). Weeks run from their header merge up to the next
//! week header or the end of the sheet.

use serde::{Deserialize, Serialize};

use super::ParseError;

/// Column holding week headers.
pub const WEEK_COLUMN: usize = 0;

/// Column holding workout headers.
pub const WORKOUT_COLUMN: usize = 1;

/// A merged cell region, rows already shifted so that row 0 is the first data row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridMerge {
    pub start_row: usize,
    /// Exclusive.
    pub end_row: usize,
    pub start_column: usize,
    /// Exclusive.
    pub end_column: usize,
}

impl GridMerge {
    /// Creates a merge descriptor.
    #[must_use]
    pub const fn new(start_row: usize, end_row: usize, start_column: usize, end_column: usize) -> Self {
        Self {
            start_row,
            end_row,
            start_column,
            end_column,
        }
    }

    /// Returns true if the merge covers exactly the given single column.
    #[must_use]
    pub const fn is_column(&self, column: usize) -> bool {
        self.start_column == column && self.end_column == column + 1
    }
}

/// Half-open row interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowSpan {
    pub start: usize,
    pub end: usize,
}

impl RowSpan {
    #[must_use]
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    #[must_use]
    pub const fn singleton(row: usize) -> Self {
        Self::new(row, row + 1)
    }

    /// Index of the last row in the span.
    #[must_use]
    pub const fn last(&self) -> usize {
        self.end.saturating_sub(1)
    }

    #[must_use]
    pub const fn contains(&self, row: usize) -> bool {
        self.start <= row && row < self.end
    }
}

/// Sorted, non-overlapping week and workout spans for one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeIndex {
    weeks: Vec<RowSpan>,
    workouts: Vec<RowSpan>,
    row_count: usize,
}

impl MergeIndex {
    /// Builds the index for a page with `row_count` data rows.
    ///
    /// Merges reaching past the last row are clipped. A page without any
    /// week merges is treated as a single week covering all rows.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError::OverlappingMerges`] if two merges in the same
    /// column share a row.
    pub fn build(merges: &[GridMerge], row_count: usize) -> Result<Self, ParseError> {
        let weeks = column_spans(merges, WEEK_COLUMN, row_count);
        let workouts = column_spans(merges, WORKOUT_COLUMN, row_count);

        check_disjoint(&weeks, "week")?;
        check_disjoint(&workouts, "workout")?;

        Ok(Self {
            weeks: stretch_to_next(&weeks, row_count),
            workouts: fill_gaps(&workouts, row_count),
            row_count,
        })
    }

    /// Week extents, each running up to the next week header.
    #[must_use]
    pub fn weeks(&self) -> &[RowSpan] {
        &self.weeks
    }

    /// Workout spans covering every data row exactly once.
    #[must_use]
    pub fn workouts(&self) -> &[RowSpan] {
        &self.workouts
    }

    #[must_use]
    pub const fn row_count(&self) -> usize {
        self.row_count
    }
}

/// Collects the clipped, sorted spans of merges covering exactly `column`.
fn column_spans(merges: &[GridMerge], column: usize, row_count: usize) -> Vec<RowSpan> {
    let mut spans: Vec<RowSpan> = merges
        .iter()
        .filter(|m| m.is_column(column))
        .filter_map(|m| {
            let end = m.end_row.min(row_count);
            (m.start_row < end).then_some(RowSpan::new(m.start_row, end))
        })
        .collect();

    spans.sort_by_key(|s| (s.start, s.end));
    spans.dedup();
    spans
}

fn check_disjoint(spans: &[RowSpan], column: &'static str) -> Result<(), ParseError> {
    for pair in spans.windows(2) {
        if pair[1].start < pair[0].end {
            return Err(ParseError::OverlappingMerges {
                column,
                first_end: pair[0].end,
                second_start: pair[1].start,
            });
        }
    }
    Ok(())
}

/// Inserts a singleton span for every row no merge covers.
fn fill_gaps(spans: &[RowSpan], row_count: usize) -> Vec<RowSpan> {
    let mut filled = Vec::with_capacity(spans.len());
    let mut row = 0;

    for span in spans {
        while row < span.start {
            filled.push(RowSpan::singleton(row));
            row += 1;
        }
        filled.push(*span);
        row = span.end;
    }

    while row < row_count {
        filled.push(RowSpan::singleton(row));
        row += 1;
    }

    filled
}

/// Extends each span to the start of the following one (the last to `row_count`).
fn stretch_to_next(spans: &[RowSpan], row_count: usize) -> Vec<RowSpan> {
    if row_count == 0 {
        return Vec::new();
    }
    if spans.is_empty() {
        return vec![RowSpan::new(0, row_count)];
    }

    spans
        .iter()
        .enumerate()
        .map(|(i, span)| {
            let end = spans.get(i + 1).map_or(row_count, |next| next.start);
            RowSpan::new(span.start, end)
        })
        .collect()
}
