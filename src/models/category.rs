use rust_decimal::Decimal;

use super::{GoalTimeline, Period};
use crate::error::ValidationError;

pub type CategoryId = i64;

pub const MAX_NAME_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CategoryType {
    Income,
    Expenses,
}

impl CategoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "Income",
            Self::Expenses => "Expenses",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "income" | "in" => Some(Self::Income),
            "expenses" | "expense" | "out" => Some(Self::Expenses),
            _ => None,
        }
    }

    pub fn all() -> &'static [CategoryType] {
        &[Self::Income, Self::Expenses]
    }

    pub fn other(&self) -> Self {
        match self {
            Self::Income => Self::Expenses,
            Self::Expenses => Self::Income,
        }
    }
}

impl std::fmt::Display for CategoryType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetCategory {
    pub id: CategoryId,
    pub name: String,
    pub kind: CategoryType,
    pub order: usize,
    pub timeline: GoalTimeline,
}

impl BudgetCategory {
    /// A category with a single goal version for `period`.
    pub fn new(
        id: CategoryId,
        name: String,
        kind: CategoryType,
        period: Period,
        goal: Decimal,
    ) -> Self {
        Self {
            id,
            name,
            kind,
            order: 0,
            timeline: GoalTimeline::new(period, goal),
        }
    }

    /// The goal effective for the displayed period.
    pub fn goal(&self) -> Decimal {
        self.timeline.amount()
    }
}

impl std::fmt::Display for BudgetCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Trims and checks a category name.
pub fn validate_name(name: &str) -> Result<String, ValidationError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::NameTooLong { max: MAX_NAME_LEN });
    }
    Ok(name.to_string())
}
