mod category;
mod goal;
mod period;
mod state;

pub use category::{validate_name, BudgetCategory, CategoryId, CategoryType, MAX_NAME_LEN};
pub use goal::{validate_amount, GoalChange, GoalRecord, GoalTimeline, MAX_GOAL};
pub use period::{Direction, Period, MAX_YEAR, MIN_YEAR};
pub use state::{Navigation, OrganizedBudgetState, Slot, TypeGroup};
