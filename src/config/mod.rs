//! Configuration module for the workout bot.
//!
//! Handles environment settings and the tracked tables file.

mod settings;
mod tables;

pub use settings::{BotSettings, ConfigError};
pub use tables::{TablesError, TrackedTable, TrackedTables, extract_table_id};
