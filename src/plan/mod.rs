//! Workout plan domain: sheet parsing and the shared plan registry.
//!
//! A sheet page arrives as merge descriptors plus rows of cells. The
//! [`MergeIndex`] turns merges into week and workout spans, the classifier
//! reads each row, and [`TableParser`] folds everything into
//! [`WeekRoutine`]s. Parsed tables live in [`WorkoutPlans`].

pub mod classify;
mod error;
pub mod merges;
mod model;
mod parser;
mod registry;

pub use error::ParseError;
pub use merges::{GridMerge, MergeIndex, RowSpan};
pub use model::{Exercise, Set, WeekRoutine, Workout, WorkoutTable};
pub use parser::{RawPage, TableParser};
pub use registry::WorkoutPlans;
