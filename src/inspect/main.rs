//! Standalone inspector for workout plan pages.
//!
//! Parses a sheet page, either from a saved JSON dump or fetched live from
//! Google Sheets, and prints the resulting week, workout and set tree.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use workout_plan_bot::config::extract_table_id;
use workout_plan_bot::plan::{RawPage, TableParser, WeekRoutine};
use workout_plan_bot::sheets::{SheetSource, SheetsClient};

/// Workout plan page inspector.
#[derive(Parser, Debug)]
#[command(name = "inspect_plan")]
#[command(about = "Parses a workout plan page and prints its structure")]
#[command(version)]
struct Args {
    /// Saved page JSON (`table_name`, `merges`, `rows`).
    #[arg(short, long, conflicts_with = "table")]
    file: Option<PathBuf>,

    /// Spreadsheet id or URL to fetch live. Needs `GOOGLE_API_KEY`.
    #[arg(short, long, requires = "page")]
    table: Option<String>,

    /// Page (sheet tab) name to fetch.
    #[arg(short, long)]
    page: Option<String>,

    /// Year week dates are resolved against. Defaults to the current year.
    #[arg(short, long)]
    year: Option<i32>,

    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Print every exercise, not only the counts.
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let page = match load_page(&args).await {
        Ok(p) => p,
        Err(e) => {
            eprintln!("✗ {e}");
            return ExitCode::FAILURE;
        }
    };

    let parser = args.year.map_or_else(TableParser::for_current_year, TableParser::new);
    println!(
        "Inspecting: {} ({} rows, {} merges, year {})\n",
        if page.table_name.is_empty() { "<unnamed>" } else { &page.table_name },
        page.rows.len(),
        page.merges.len(),
        parser.year()
    );

    match parser.parse_page(&page) {
        Ok(weeks) => {
            print_weeks(&weeks, args.verbose);

            let workouts: usize = weeks.iter().map(|w| w.workouts.len()).sum();
            println!("\n✓ Parsed {} weeks with {workouts} workouts", weeks.len());
            ExitCode::SUCCESS
        }
        Err(e) => {
            println!("✗ Parse failed: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn load_page(args: &Args) -> Result<RawPage, String> {
    if let Some(path) = &args.file {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
        return serde_json::from_str(&content).map_err(|e| format!("Invalid page JSON: {e}"));
    }

    let (Some(table), Some(page)) = (&args.table, &args.page) else {
        return Err("Pass either --file or --table with --page".to_owned());
    };

    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        eprintln!("Could not load .env file ({}): {e}", args.env_file);
    }
    let api_key = std::env::var("GOOGLE_API_KEY").map_err(|_| "GOOGLE_API_KEY is not set".to_owned())?;

    let client = SheetsClient::new(api_key, std::time::Duration::ZERO).map_err(|e| e.to_string())?;
    client
        .fetch_page(&extract_table_id(table), page)
        .await
        .map_err(|e| format!("Fetch failed: {e}"))
}

fn print_weeks(weeks: &[WeekRoutine], verbose: bool) {
    for week in weeks {
        print!(
            "Week {}: {} - {}",
            week.number,
            week.start_date.format("%d.%m.%Y"),
            week.end_date.format("%d.%m.%Y")
        );
        if week.comment.is_empty() {
            println!();
        } else {
            println!(" ({})", week.comment);
        }

        for workout in &week.workouts {
            let title = if workout.is_homework() {
                "Homework".to_owned()
            } else {
                format!("Workout {}", workout.number)
            };
            println!(
                "  [{}] {title}: {} ({} sets, {} exercises)",
                workout.actual_number,
                truncate(workout.description.lines().next().unwrap_or_default().trim(), 40),
                workout.sets.len(),
                workout.exercise_count()
            );

            if !verbose {
                continue;
            }
            for set in &workout.sets {
                if set.is_marked() {
                    println!("    Set {} x {} {}", set.number, set.rounds, set.description);
                }
                for exercise in &set.exercises {
                    let weight = exercise.weight.as_deref().map(|w| format!(" @ {w}")).unwrap_or_default();
                    println!("      - {} {}{weight}", exercise.description, exercise.reps_window);
                }
            }
        }
    }
}

/// Truncates a string for display.
fn truncate(s: &str, max_len: usize) -> String {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() <= max_len {
        s.to_owned()
    } else {
        format!("{}...", chars[..max_len].iter().collect::<String>())
    }
}
