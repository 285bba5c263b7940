use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::{CategoryId, CategoryType, Period};
use crate::sync::WriteVerb;

/// Broken engine invariants and registry misuse. These are programming
/// errors: the operation that raised one has not touched the state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    #[error("goal timeline already has a version for {0}")]
    DuplicatePeriod(Period),
    #[error("goal edit for {period} is not adjacent to the effective version ({effective})")]
    NonAdjacentEdit { period: Period, effective: Period },
    #[error("goal timeline cannot be empty")]
    EmptyTimeline,
    #[error("goal cursor {cursor} out of bounds for {len} versions")]
    CursorOutOfBounds { cursor: usize, len: usize },
    #[error("goal cursor at {cursor}, effective version is at {expected}")]
    MisplacedCursor { cursor: usize, expected: usize },
    #[error("goal versions out of order: {newer} stored after {older}")]
    OutOfOrder { newer: Period, older: Period },
    #[error("category not found: {0}")]
    CategoryNotFound(CategoryId),
    #[error("category {0} already exists")]
    DuplicateCategory(CategoryId),
    #[error("category {id} is filed under the wrong type (tagged {kind})")]
    MisfiledCategory { id: CategoryId, kind: CategoryType },
    #[error("main category {0} cannot be moved or removed")]
    MainCategoryImmutable(CategoryId),
    #[error("invalid reorder: {0}")]
    InvalidPermutation(String),
    #[error("invalid month: {0} (expected 1-12)")]
    InvalidMonth(u32),
    #[error("year {0} outside the supported range 1-9999")]
    YearOutOfRange(i32),
    #[error("category {id} has order {order}, expected {expected}")]
    OrderGap {
        id: CategoryId,
        order: usize,
        expected: usize,
    },
}

/// Input rejected before any mutation is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("goal amount cannot be negative: {0}")]
    NegativeAmount(Decimal),
    #[error("goal amount too large: {0}")]
    AmountTooLarge(Decimal),
    #[error("goal amount has more than two decimal places: {0}")]
    TooPrecise(Decimal),
    #[error("category name cannot be empty")]
    EmptyName,
    #[error("category name longer than {max} characters")]
    NameTooLong { max: usize },
    #[error("a category named '{0}' already exists")]
    DuplicateName(String),
    #[error("invalid period '{0}' (expected YYYY-MM)")]
    InvalidPeriod(String),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Engine(#[from] EngineError),
    #[error("category {0} has a goal write in flight")]
    WriteInFlight(CategoryId),
    #[error("{verb} failed, local changes rolled back: {reason:#}")]
    GoalWriteFailed { verb: WriteVerb, reason: anyhow::Error },
    #[error("{operation} failed, local changes rolled back: {reason:#}")]
    Persistence {
        operation: &'static str,
        reason: anyhow::Error,
    },
}
