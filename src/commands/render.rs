//! `MarkdownV2` rendering of plans, workouts and reports.
//!
//! Every dynamic string passes through `markdown::escape`; markup is only
//! ever wrapped around already escaped text.

use chrono::NaiveDate;
use teloxide::utils::markdown::{bold, escape, escape_link_url, italic};

use crate::plan::{Exercise, Set, WeekRoutine, Workout};
use crate::scheduler::RefreshReport;
use crate::users::ExerciseLinks;

/// Formats a week's date range as `27.06-03.07`.
#[must_use]
pub fn date_range(week: &WeekRoutine) -> String {
    format!(
        "{}-{}",
        week.start_date.format("%d.%m"),
        week.end_date.format("%d.%m")
    )
}

/// Plain-text workout title.
#[must_use]
pub fn workout_title(workout: &Workout) -> String {
    if workout.is_homework() {
        "Homework".to_owned()
    } else {
        format!("Workout {}", workout.number)
    }
}

fn week_heading(week: &WeekRoutine) -> String {
    bold(&escape(&format!("Week {}: {}", week.number, date_range(week))))
}

/// Lists plans, marking the selected one.
#[must_use]
pub fn plans(table_name: &str, plans: &[String], selected: Option<&str>) -> String {
    let mut lines = vec![bold(&escape(if table_name.is_empty() { "Plans" } else { table_name }))];

    for (i, plan) in plans.iter().enumerate() {
        let marker = if selected == Some(plan.as_str()) { "▶ " } else { "" };
        lines.push(escape(&format!("{marker}{}. {plan}", i + 1)));
    }

    lines.push(String::new());
    lines.push(escape("Select one with /plan <name or number>."));
    lines.join("\n")
}

/// Lists the weeks of a plan, marking the current and selected ones.
#[must_use]
pub fn weeks(plan: &str, weeks: &[WeekRoutine], today: NaiveDate, selected: Option<usize>) -> String {
    let mut lines = vec![bold(&escape(plan))];

    for week in weeks {
        let mut line = format!(
            "{}. {} ({} workouts)",
            week.number,
            date_range(week),
            week.workouts.len()
        );
        if !week.comment.is_empty() {
            line.push_str(&format!(" {}", week.comment));
        }

        let mut rendered = escape(&line);
        if selected == Some(week.number) {
            rendered = format!("▶ {rendered}");
        }
        if week.contains(today) {
            rendered.push_str(&format!(" {}", italic(&escape("(this week)"))));
        }
        lines.push(rendered);
    }

    lines.join("\n")
}

/// Shows a week with its workout list.
#[must_use]
pub fn week(week: &WeekRoutine) -> String {
    let mut lines = vec![week_heading(week)];
    if !week.comment.is_empty() {
        lines.push(italic(&escape(&week.comment)));
    }
    lines.push(String::new());

    if week.workouts.is_empty() {
        lines.push(escape("No workouts this week."));
    }
    for workout in &week.workouts {
        let summary = first_line(&workout.description);
        let mut line = format!("{}. {}", workout.actual_number, workout_title(workout));
        if !summary.is_empty() {
            line.push_str(&format!(": {summary}"));
        }
        line.push_str(&format!(" ({} exercises)", workout.exercise_count()));
        lines.push(escape(&line));
    }

    lines.push(String::new());
    lines.push(escape("Open one with /workout <n> or send /next."));
    lines.join("\n")
}

/// Shows a full workout, linking exercises found in the glossary.
#[must_use]
pub fn workout(week: &WeekRoutine, workout: &Workout, links: &ExerciseLinks) -> String {
    let mut lines = vec![
        week_heading(week),
        bold(&escape(&format!(
            "{} ({}/{})",
            workout_title(workout),
            workout.actual_number,
            week.workouts.len()
        ))),
    ];

    let description = workout.description.trim();
    if !description.is_empty() {
        lines.push(escape(description));
    }

    for set in &workout.sets {
        lines.push(String::new());
        if let Some(header) = set_header(set) {
            lines.push(header);
        }
        lines.extend(set.exercises.iter().map(|e| exercise(e, links)));
    }

    lines.join("\n")
}

fn set_header(set: &Set) -> Option<String> {
    if !set.is_marked() {
        return None;
    }

    let mut title = if set.number == 0 {
        "Set".to_owned()
    } else {
        format!("Set {}", set.number)
    };
    if !set.rounds.is_empty() {
        title.push_str(&format!(" x {}", set.rounds));
    }

    let mut header = bold(&escape(&title));
    if !set.description.is_empty() {
        header.push_str(&format!(" {}", italic(&escape(&set.description))));
    }
    Some(header)
}

fn exercise(exercise: &Exercise, links: &ExerciseLinks) -> String {
    let name = escape(&exercise.description);
    let name = match links.get(&exercise.description) {
        Some(url) => format!("[{name}]({})", escape_link_url(url)),
        None => name,
    };

    let mut details = Vec::new();
    if !exercise.reps_window.is_empty() {
        details.push(exercise.reps_window.clone());
    }
    if let Some(weight) = &exercise.weight {
        details.push(format!("@ {weight}"));
    }

    if details.is_empty() {
        format!("• {name}")
    } else {
        format!("• {name} {}", escape(&format!("- {}", details.join(" "))))
    }
}

/// Summarizes a refresh pass.
#[must_use]
pub fn report(report: &RefreshReport) -> String {
    let mut lines = vec![bold(&escape(&format!(
        "Refresh {}: {}/{} pages in {:.1}s",
        if report.is_success() { "finished" } else { "finished with errors" },
        report.refreshed_pages,
        report.total_pages(),
        seconds(report)
    )))];

    lines.push(escape(&format!(
        "Finished at {}",
        report.finished_at.format("%Y-%m-%d %H:%M UTC")
    )));

    for failure in &report.failures {
        let stale = if failure.kept_stale { " (serving previous version)" } else { "" };
        lines.push(escape(&format!(
            "• {} / {}: {}{stale}",
            failure.table_id, failure.page, failure.error
        )));
    }

    lines.join("\n")
}

#[allow(clippy::cast_precision_loss)]
fn seconds(report: &RefreshReport) -> f64 {
    report.elapsed().num_milliseconds() as f64 / 1000.0
}

fn first_line(text: &str) -> &str {
    text.lines().map(str::trim).find(|l| !l.is_empty()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::scheduler::PageFailure;

    fn date(m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2022, m, d).unwrap()
    }

    fn sample_week() -> WeekRoutine {
        WeekRoutine {
            start_date: date(6, 27),
            end_date: date(7, 3),
            number: 1,
            workouts: vec![
                Workout {
                    description: "Legs.\nGo heavy!".to_owned(),
                    sets: vec![
                        Set {
                            description: "warm-up".to_owned(),
                            number: 1,
                            exercises: vec![Exercise::new("Back squat", "5-8", Some("80%".to_owned()))],
                            rounds: "3".to_owned(),
                            marked: true,
                        },
                        Set {
                            description: String::new(),
                            number: 0,
                            exercises: vec![Exercise::new("Plank", "", None)],
                            rounds: String::new(),
                            marked: false,
                        },
                    ],
                    actual_number: 1,
                    number: 1,
                },
                Workout {
                    description: String::new(),
                    sets: vec![],
                    actual_number: 2,
                    number: 0,
                },
            ],
            comment: "deload".to_owned(),
        }
    }

    fn links() -> (tempfile::TempDir, ExerciseLinks) {
        let dir = tempfile::tempdir().unwrap();
        let mut links = ExerciseLinks::load(dir.path().join("links.json")).unwrap();
        links.insert("back squat", "https://youtu.be/sq(1)");
        (dir, links)
    }

    #[test]
    fn test_date_range() {
        assert_eq!(date_range(&sample_week()), "27.06-03.07");
    }

    #[test]
    fn test_workout_escapes_and_links() {
        let week = sample_week();
        let (_dir, links) = links();
        let text = workout(&week, &week.workouts[0], &links);

        assert!(text.starts_with("*Week 1: 27\\.06\\-03\\.07*"));
        assert!(text.contains("*Workout 1 \\(1/2\\)*"));
        assert!(text.contains("Legs\\.\nGo heavy\\!"));
        assert!(text.contains("*Set 1 x 3* _warm\\-up_"));
        assert!(text.contains("• [Back squat](https://youtu.be/sq(1\\))"));
        assert!(text.contains("\\- 5\\-8 @ 80%"));
        assert!(text.contains("• Plank"));
    }

    #[test]
    fn test_bare_header_set_keeps_its_heading() {
        let mut week = sample_week();
        week.workouts[0].sets = vec![Set {
            description: String::new(),
            number: 0,
            exercises: vec![Exercise::new("Burpee", "10", None)],
            rounds: String::new(),
            marked: true,
        }];
        let (_dir, links) = links();

        let text = workout(&week, &week.workouts[0], &links);
        assert!(text.contains("\n*Set*\n• Burpee"));
    }

    #[test]
    fn test_week_lists_workouts() {
        let text = week(&sample_week());
        assert!(text.contains("_deload_"));
        assert!(text.contains("1\\. Workout 1: Legs\\. \\(2 exercises\\)"));
        assert!(text.contains("2\\. Homework \\(0 exercises\\)"));
    }

    #[test]
    fn test_weeks_marks_today_and_selection() {
        let list = [sample_week()];
        let text = weeks("Strength", &list, date(6, 30), Some(1));
        assert!(text.starts_with("*Strength*"));
        assert!(text.contains("▶ 1\\. 27\\.06\\-03\\.07 \\(2 workouts\\) deload _\\(this week\\)_"));
    }

    #[test]
    fn test_plans_marks_selected() {
        let names = vec!["Cardio".to_owned(), "Strength".to_owned()];
        let text = plans("My table", &names, Some("Strength"));
        assert!(text.contains("1\\. Cardio"));
        assert!(text.contains("▶ 2\\. Strength"));
    }

    #[test]
    fn test_report_lists_failures() {
        let mut refresh = RefreshReport::new(Utc::now());
        refresh.refreshed_pages = 1;
        refresh.failures.push(PageFailure {
            table_id: "abc".to_owned(),
            page: "Plan".to_owned(),
            error: "Data row 3: malformed set header".to_owned(),
            kept_stale: true,
        });

        let text = report(&refresh);
        assert!(text.contains("finished with errors: 1/2 pages"));
        assert!(text.contains("abc / Plan: Data row 3: malformed set header \\(serving previous version\\)"));
    }
}
