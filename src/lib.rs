//! Workout Plan Bot Library
//!
//! A Telegram bot serving workout programs kept in Google Sheets.
//!
//! This crate provides the core functionality for:
//! - Parsing sheet pages into weeks, workouts, sets and exercises
//! - Fetching pages from the Google Sheets API under a request throttle
//! - Refreshing tracked tables on a schedule
//! - Handling athlete and admin commands over Telegram

pub mod commands;
pub mod config;
pub mod plan;
pub mod scheduler;
pub mod sheets;
pub mod telegram;
pub mod users;
