//! Lexical rules for sheet rows and header cells.
//!
//! Data rows have up to five cells:
//! `[week label, workout label, set header or exercise, reps, weight]`.

use chrono::{Months, NaiveDate};

use super::{Exercise, ParseError};

/// Cell index of the week label.
pub const WEEK_CELL: usize = 0;
/// Cell index of the workout label.
pub const WORKOUT_CELL: usize = 1;
/// Cell index of the set header or exercise name.
pub const ENTRY_CELL: usize = 2;
/// Cell index of the repetitions.
pub const REPS_CELL: usize = 3;
/// Cell index of the weight.
pub const WEIGHT_CELL: usize = 4;

/// Parsed `<number>\<rounds>\<description>` set header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetHeader {
    pub number: u32,
    pub rounds: String,
    pub description: String,
}

/// What a data row contributes to the current workout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKind {
    SetHeader(SetHeader),
    Exercise(Exercise),
    Empty,
}

/// Parsed week header cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WeekHeader {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub comment: String,
}

/// Parsed workout header cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkoutHeader {
    /// Declared number; 0 for homework.
    pub number: u32,
    /// Text after the number, kept verbatim.
    pub description: String,
}

/// Returns the cell at `index`, or an empty string past the end of the row.
pub fn cell(row: &[String], index: usize) -> &str {
    row.get(index).map_or("", String::as_str)
}

/// Classifies the set/exercise part of a data row.
///
/// # Errors
///
/// Returns [`ParseError::InvalidSetHeader`] if the set number does not fit.
pub fn classify_row(row: &[String], row_index: usize) -> Result<RowKind, ParseError> {
    let entry = cell(row, ENTRY_CELL).trim();

    if let Some(header) = parse_set_header(entry, row_index)? {
        return Ok(RowKind::SetHeader(header));
    }

    let reps = cell(row, REPS_CELL).trim();
    let weight = cell(row, WEIGHT_CELL).trim();

    if entry.is_empty() && reps.is_empty() && weight.is_empty() {
        return Ok(RowKind::Empty);
    }

    Ok(RowKind::Exercise(Exercise::new(
        entry,
        reps,
        (!weight.is_empty()).then(|| weight.to_owned()),
    )))
}

/// Parses a set header if `text` starts with digits immediately followed by `\`.
///
/// Returns `Ok(None)` for anything else.
fn parse_set_header(text: &str, row_index: usize) -> Result<Option<SetHeader>, ParseError> {
    let Some((digits, rest)) = split_leading_digits(text) else {
        return Ok(None);
    };
    let Some(rest) = rest.strip_prefix('\\') else {
        return Ok(None);
    };

    let number = digits.parse().map_err(|_| ParseError::InvalidSetHeader {
        row: row_index,
        text: text.to_owned(),
    })?;

    let rest = rest.trim_start();
    let (rounds, description) = if rest.starts_with(|c: char| c.is_ascii_digit()) {
        // Only the first backslash after the rounds separates them; later
        // backslashes belong to the description.
        rest.split_once('\\').unwrap_or((rest, ""))
    } else {
        ("", rest)
    };

    Ok(Some(SetHeader {
        number,
        rounds: rounds.trim().to_owned(),
        description: description.trim().to_owned(),
    }))
}

/// Parses a workout label: a leading number names the session, anything else
/// (including an empty label) is homework with number 0.
///
/// # Errors
///
/// Returns [`ParseError::InvalidWorkoutHeader`] if the leading number does not fit.
pub fn parse_workout_header(text: &str, row_index: usize) -> Result<WorkoutHeader, ParseError> {
    let Some((digits, rest)) = split_leading_digits(text.trim_start()) else {
        return Ok(WorkoutHeader {
            number: 0,
            description: text.to_owned(),
        });
    };

    let number = digits.parse().map_err(|_| ParseError::InvalidWorkoutHeader {
        row: row_index,
        text: text.to_owned(),
    })?;

    Ok(WorkoutHeader {
        number,
        description: rest.to_owned(),
    })
}

/// Parses a week label such as `"27-03.07 deload"` or `"26.12-01.01"`.
///
/// The short form `start-end.month` takes the month from the end day; when
/// the start day is larger, the week began in the previous month. A week
/// running from December into January starts in `year` and ends in `year + 1`.
///
/// # Errors
///
/// Returns [`ParseError::InvalidWeekHeader`] if the label has no date range
/// and [`ParseError::InvalidDate`] if the range names a day that does not exist.
pub fn parse_week_header(text: &str, year: i32, row_index: usize) -> Result<WeekHeader, ParseError> {
    let malformed = || ParseError::InvalidWeekHeader {
        row: row_index,
        text: text.to_owned(),
    };
    let invalid_date = || ParseError::InvalidDate {
        row: row_index,
        text: text.to_owned(),
    };

    let (first, rest) = take_number(text.trim_start()).ok_or_else(malformed)?;

    let (range, comment) = if let Some(rest) = strip_dash(rest) {
        // start_day-end_day.month
        let (end_day, rest) = take_number(rest).ok_or_else(malformed)?;
        let rest = rest.strip_prefix('.').ok_or_else(malformed)?;
        let (month, rest) = take_number(rest).ok_or_else(malformed)?;
        (short_range(first, end_day, month, year), rest)
    } else if let Some(rest) = rest.strip_prefix('.') {
        // start_day.start_month-end_day.end_month
        let (start_month, rest) = take_number(rest).ok_or_else(malformed)?;
        let rest = strip_dash(rest).ok_or_else(malformed)?;
        let (end_day, rest) = take_number(rest).ok_or_else(malformed)?;
        let rest = rest.strip_prefix('.').ok_or_else(malformed)?;
        let (end_month, rest) = take_number(rest).ok_or_else(malformed)?;
        (full_range(first, start_month, end_day, end_month, year), rest)
    } else {
        return Err(malformed());
    };

    let (start_date, end_date) = range.ok_or_else(invalid_date)?;

    Ok(WeekHeader {
        start_date,
        end_date,
        comment: comment.trim().to_owned(),
    })
}

fn short_range(start_day: u32, end_day: u32, month: u32, year: i32) -> Option<(NaiveDate, NaiveDate)> {
    if start_day <= end_day {
        let start = NaiveDate::from_ymd_opt(year, month, start_day)?;
        let end = NaiveDate::from_ymd_opt(year, month, end_day)?;
        return Some((start, end));
    }

    let (start_year, start_month, end_year) = if month == 1 {
        (year, 12, year + 1)
    } else {
        (year, month.checked_sub(1)?, year)
    };

    let start = NaiveDate::from_ymd_opt(start_year, start_month, start_day)?;
    let end = NaiveDate::from_ymd_opt(end_year, month, end_day)?;
    Some((start, end))
}

fn full_range(
    start_day: u32,
    start_month: u32,
    end_day: u32,
    end_month: u32,
    year: i32,
) -> Option<(NaiveDate, NaiveDate)> {
    let start = NaiveDate::from_ymd_opt(year, start_month, start_day)?;
    let mut end = NaiveDate::from_ymd_opt(year, end_month, end_day)?;
    if end < start {
        end = end.checked_add_months(Months::new(12))?;
    }
    Some((start, end))
}

/// Splits off the leading ASCII digits; `None` if there are none.
fn split_leading_digits(text: &str) -> Option<(&str, &str)> {
    let len = text.bytes().take_while(u8::is_ascii_digit).count();
    (len > 0).then(|| text.split_at(len))
}

fn take_number(text: &str) -> Option<(u32, &str)> {
    let (digits, rest) = split_leading_digits(text)?;
    Some((digits.parse().ok()?, rest))
}

fn strip_dash(text: &str) -> Option<&str> {
    text.strip_prefix('-').or_else(|| text.strip_prefix('–'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|&c| c.to_owned()).collect()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_set_header_with_rounds() {
        let kind = classify_row(&row(&["", "", "1\\3\\ready"]), 0).unwrap();
        assert_eq!(
            kind,
            RowKind::SetHeader(SetHeader {
                number: 1,
                rounds: "3".to_owned(),
                description: "ready".to_owned(),
            })
        );
    }

    #[test]
    fn test_set_header_without_rounds() {
        let kind = classify_row(&row(&["", "", "2\\superset, no rest"]), 0).unwrap();
        assert_eq!(
            kind,
            RowKind::SetHeader(SetHeader {
                number: 2,
                rounds: String::new(),
                description: "superset, no rest".to_owned(),
            })
        );
    }

    #[test]
    fn test_set_header_rounds_range_and_extra_backslash() {
        let kind = classify_row(&row(&["", "", "3\\3-5\\left\\right"]), 0).unwrap();
        assert_eq!(
            kind,
            RowKind::SetHeader(SetHeader {
                number: 3,
                rounds: "3-5".to_owned(),
                description: "left\\right".to_owned(),
            })
        );
    }

    #[test]
    fn test_set_header_rounds_only() {
        let kind = classify_row(&row(&["", "", "0\\4"]), 0).unwrap();
        assert_eq!(
            kind,
            RowKind::SetHeader(SetHeader {
                number: 0,
                rounds: "4".to_owned(),
                description: String::new(),
            })
        );
    }

    #[test]
    fn test_set_header_number_overflow() {
        let err = classify_row(&row(&["", "", "99999999999\\x"]), 7).unwrap_err();
        assert!(matches!(err, ParseError::InvalidSetHeader { row: 7, .. }));
    }

    #[test]
    fn test_digits_without_backslash_is_exercise() {
        let kind = classify_row(&row(&["", "", "100m sprint", "4"]), 0).unwrap();
        assert_eq!(kind, RowKind::Exercise(Exercise::new("100m sprint", "4", None)));
    }

    #[test]
    fn test_exercise_cells_are_trimmed() {
        let kind = classify_row(&row(&["", "", " squat ", " 5x5 ", " 80kg "]), 0).unwrap();
        assert_eq!(
            kind,
            RowKind::Exercise(Exercise::new("squat", "5x5", Some("80kg".to_owned())))
        );
    }

    #[test]
    fn test_short_and_blank_rows_are_empty() {
        assert_eq!(classify_row(&row(&["x", "y"]), 0).unwrap(), RowKind::Empty);
        assert_eq!(classify_row(&row(&["", "", "  ", "", ""]), 0).unwrap(), RowKind::Empty);
        assert_eq!(classify_row(&[], 0).unwrap(), RowKind::Empty);
    }

    #[test]
    fn test_workout_header_numbered() {
        let header = parse_workout_header("2\nвес 85%", 0).unwrap();
        assert_eq!(header.number, 2);
        assert_eq!(header.description, "\nвес 85%");
    }

    #[test]
    fn test_workout_header_homework() {
        let header = parse_workout_header("отдых", 0).unwrap();
        assert_eq!(header.number, 0);
        assert_eq!(header.description, "отдых");
    }

    #[test]
    fn test_workout_header_overflow() {
        let err = parse_workout_header("123456789012 heavy", 3).unwrap_err();
        assert!(matches!(err, ParseError::InvalidWorkoutHeader { row: 3, .. }));
    }

    #[test]
    fn test_week_header_same_month() {
        let header = parse_week_header("04-10.07", 2022, 0).unwrap();
        assert_eq!(header.start_date, date(2022, 7, 4));
        assert_eq!(header.end_date, date(2022, 7, 10));
        assert_eq!(header.comment, "");
    }

    #[test]
    fn test_week_header_month_rollover_with_comment() {
        let header = parse_week_header("27-03.07 comment", 2022, 0).unwrap();
        assert_eq!(header.start_date, date(2022, 6, 27));
        assert_eq!(header.end_date, date(2022, 7, 3));
        assert_eq!(header.comment, "comment");
    }

    #[test]
    fn test_week_header_year_rollover() {
        let header = parse_week_header("26-01.01", 2022, 0).unwrap();
        assert_eq!(header.start_date, date(2022, 12, 26));
        assert_eq!(header.end_date, date(2023, 1, 1));
    }

    #[test]
    fn test_week_header_full_form() {
        let header = parse_week_header("28.02-06.03 deload week", 2022, 0).unwrap();
        assert_eq!(header.start_date, date(2022, 2, 28));
        assert_eq!(header.end_date, date(2022, 3, 6));
        assert_eq!(header.comment, "deload week");

        let header = parse_week_header("29.12-04.01", 2022, 0).unwrap();
        assert_eq!(header.start_date, date(2022, 12, 29));
        assert_eq!(header.end_date, date(2023, 1, 4));
    }

    #[test]
    fn test_week_header_en_dash() {
        let header = parse_week_header("04–10.07", 2022, 0).unwrap();
        assert_eq!(header.start_date, date(2022, 7, 4));
    }

    #[test]
    fn test_week_header_malformed() {
        for text in ["", "week one", "27-03", "27.07", "27-x.07"] {
            let err = parse_week_header(text, 2022, 5).unwrap_err();
            assert!(
                matches!(err, ParseError::InvalidWeekHeader { row: 5, .. }),
                "{text:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn test_week_header_impossible_date() {
        let err = parse_week_header("30-31.02", 2022, 1).unwrap_err();
        assert!(matches!(err, ParseError::InvalidDate { row: 1, .. }));

        let err = parse_week_header("01-07.13", 2022, 1).unwrap_err();
        assert!(matches!(err, ParseError::InvalidDate { .. }));
    }

    #[test]
    fn test_week_dates_are_ordered() {
        for (text, year) in [("26-01.01", 2022), ("29-06.03", 2024), ("01-01.05", 2023)] {
            let header = parse_week_header(text, year, 0).unwrap();
            assert!(header.start_date <= header.end_date, "{text}");
        }
    }
}
