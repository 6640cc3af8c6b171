//! Table refresh scheduler module.
//!
//! Keeps the workout plans registry in sync with the tracked spreadsheets,
//! on a fixed interval and on demand.

mod handle;
mod runner;
mod state;

pub use handle::RefreshHandle;
pub use runner::{RefreshError, RefreshMessage, RefreshScheduler};
pub use state::{PageFailure, RefreshReport, RefreshState};
