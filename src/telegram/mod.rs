//! Telegram transport module.
//!
//! Bridges the Bot API to the command handler and delivers refresh
//! reports to admins.

mod bot;

pub use bot::{forward_reports, register_commands, run_dispatcher};
