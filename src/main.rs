//! Workout Plan Bot - Main Entry Point
//!
//! A Telegram bot that serves workout programs kept in Google Sheets,
//! refreshing them on a schedule.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use teloxide::Bot;
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use workout_plan_bot::commands::{BotContext, CommandHandler};
use workout_plan_bot::config::{BotSettings, TrackedTables};
use workout_plan_bot::plan::WorkoutPlans;
use workout_plan_bot::scheduler::{RefreshHandle, RefreshMessage, RefreshReport, RefreshScheduler, RefreshState};
use workout_plan_bot::sheets::SheetsClient;
use workout_plan_bot::telegram;
use workout_plan_bot::users::{ExerciseLinks, UserStore};

/// Telegram bot serving workout plans from Google Sheets.
#[derive(Parser, Debug)]
#[command(name = "workout_bot")]
#[command(about = "Serve workout plans parsed from Google Sheets over Telegram")]
#[command(version)]
struct Args {
    /// Path to the tracked tables JSON file. Overrides `TABLES_PATH`.
    #[arg(short, long)]
    tables: Option<PathBuf>,

    /// Path to the .env file for environment variables.
    #[arg(long, default_value = ".env")]
    env_file: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Generate an example tables file and exit.
    #[arg(long)]
    generate_config: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level);

    if args.generate_config {
        return generate_example_config();
    }

    if let Err(e) = dotenvy::from_filename(&args.env_file) {
        debug!("Could not load .env file ({}): {}", args.env_file, e);
    }

    let mut settings = BotSettings::from_env().context("Failed to load bot settings from environment")?;
    if let Some(path) = args.tables {
        settings.tables_path = path;
    }
    debug!("Settings: {:?}", settings);

    let tables = TrackedTables::load_or_default(&settings.tables_path)
        .context("Failed to load tracked tables")?;
    tables.validate().context("Tracked tables validation failed")?;
    info!(
        "Tracking {} tables from {}",
        tables.len(),
        settings.tables_path.display()
    );

    let users = UserStore::load(settings.users_path.clone()).context("Failed to load users")?;
    let links = ExerciseLinks::load(settings.links_path.clone()).context("Failed to load exercise links")?;
    info!("Loaded {} users and {} exercise links", users.len(), links.len());

    let sheets = SheetsClient::new(settings.google_api_key.clone(), settings.sheets_min_interval())
        .context("Failed to create Google Sheets client")?;

    let plans = WorkoutPlans::new();
    let tables = Arc::new(RwLock::new(tables));
    let state = Arc::new(RwLock::new(RefreshState::new()));

    let (refresh_tx, refresh_rx) = mpsc::channel::<RefreshMessage>(32);
    let (report_tx, report_rx) = mpsc::channel::<RefreshReport>(8);

    let scheduler = RefreshScheduler::new(
        Arc::new(sheets),
        plans.clone(),
        Arc::clone(&tables),
        Arc::clone(&state),
    )
    .with_refresh_interval(settings.refresh_interval())
    .with_report_channel(report_tx);

    let refresh = RefreshHandle::new(refresh_tx, state);
    let context = BotContext {
        plans,
        tables,
        tables_path: settings.tables_path.clone(),
        users: Arc::new(RwLock::new(users)),
        links: Arc::new(RwLock::new(links)),
        refresh: refresh.clone(),
    };
    let handler = Arc::new(CommandHandler::new(settings.admin_ids.clone(), context));

    let bot = Bot::new(&settings.bot_token);
    if let Err(e) = telegram::register_commands(&bot).await {
        warn!("Failed to register the command menu: {}", e);
    }

    info!("Starting workout bot...");
    info!("Admins: {:?}", settings.admin_ids);

    let scheduler_handle = tokio::spawn(async move {
        scheduler.run(refresh_rx).await;
    });
    let notifier_handle = tokio::spawn(telegram::forward_reports(
        bot.clone(),
        settings.admin_ids.clone(),
        report_rx,
    ));

    info!("Bot is running. Use Ctrl+C to stop.");
    telegram::run_dispatcher(bot, handler).await;

    info!("Shutting down...");
    refresh.shutdown().await;
    let _ = scheduler_handle.await;
    let _ = notifier_handle.await;

    Ok(())
}

/// Initializes the logging subsystem.
fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Generates an example tables file.
fn generate_example_config() -> Result<()> {
    let example = TrackedTables::example();
    example.save_to_file("tables.example.json")?;

    println!("✓ Example tables written to: tables.example.json");
    println!("\nTo use this bot:");
    println!("1. Copy tables.example.json to tables.json");
    println!("2. Replace the table id and page names with your own");
    println!("3. Create a .env file with TELEGRAM_BOT_TOKEN, GOOGLE_API_KEY and ADMIN_IDS");
    println!("4. Run: workout_bot");

    Ok(())
}
