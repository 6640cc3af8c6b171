//! Command handling module.
//!
//! Turns incoming chat text into replies: slash commands for athletes
//! browsing their plan, and admin commands for tables, links and access.

mod handler;
pub mod render;
mod state;
mod types;

pub use handler::{BotContext, ChatUser, CommandHandler};
pub use state::{Action, ChatState, Input, transition};
pub use types::{BotCommand, CommandResult, PendingInput};
