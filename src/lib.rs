//! BudgetLine keeps a versioned history of monthly goals for every budget
//! category and lets a caller browse it month by month. The effective goal of
//! each category is tracked by a cursor that is repaired incrementally as the
//! displayed month moves, so lookups never rescan the history.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod models;
pub mod sync;

pub use error::{EngineError, SyncError, ValidationError};
