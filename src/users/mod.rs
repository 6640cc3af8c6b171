//! Persistent per-user state and the exercise glossary.

mod links;
mod store;

pub use links::{ExerciseLinks, is_valid_url};
pub use store::{StoreError, UserRecord, UserStore};
