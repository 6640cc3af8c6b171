//! Structural errors found while parsing a sheet page.

use thiserror::Error;

/// Errors that fail a whole page parse.
///
/// Row numbers are 0-based data rows (the header row is not counted).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Data row {row}: malformed week header: {text:?}")]
    InvalidWeekHeader { row: usize, text: String },

    #[error("Data row {row}: week header {text:?} does not name a valid date")]
    InvalidDate { row: usize, text: String },

    #[error("Data row {row}: malformed workout header: {text:?}")]
    InvalidWorkoutHeader { row: usize, text: String },

    #[error("Data row {row}: malformed set header: {text:?}")]
    InvalidSetHeader { row: usize, text: String },

    #[error("Merged {column} cells overlap at rows {first_end} and {second_start}")]
    OverlappingMerges {
        column: &'static str,
        first_end: usize,
        second_start: usize,
    },

    #[error("Data row {row} is not covered by any week")]
    RowOutsideWeek { row: usize },

    #[error("Data row {row} is not covered by any workout")]
    RowOutsideWorkout { row: usize },

    #[error("Data row {row}: workout is still open when its week ends")]
    WorkoutCrossesWeek { row: usize },
}

impl ParseError {
    /// Returns the data row the error refers to, if any.
    #[must_use]
    pub const fn row(&self) -> Option<usize> {
        match self {
            Self::InvalidWeekHeader { row, .. }
            | Self::InvalidDate { row, .. }
            | Self::InvalidWorkoutHeader { row, .. }
            | Self::InvalidSetHeader { row, .. }
            | Self::RowOutsideWeek { row }
            | Self::RowOutsideWorkout { row }
            | Self::WorkoutCrossesWeek { row } => Some(*row),
            Self::OverlappingMerges { .. } => None,
        }
    }
}
