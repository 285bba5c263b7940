use chrono::{Datelike, NaiveDate};
use std::str::FromStr;

use crate::error::{EngineError, ValidationError};

/// Which way the displayed period moves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Previous,
    Next,
}

pub const MIN_YEAR: i32 = 1;
pub const MAX_YEAR: i32 = 9999;

/// A budgeting month in years 1 through 9999. Ordering is by year, then month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period {
    year: i32,
    month: u32,
}

impl Period {
    pub fn new(month: u32, year: i32) -> Result<Self, EngineError> {
        if !(1..=12).contains(&month) {
            return Err(EngineError::InvalidMonth(month));
        }
        if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
            return Err(EngineError::YearOutOfRange(year));
        }
        Ok(Self { year, month })
    }

    /// The real-world month according to the local clock.
    pub fn current() -> Result<Self, EngineError> {
        Self::from_date(chrono::Local::now().date_naive())
    }

    pub fn from_date(date: NaiveDate) -> Result<Self, EngineError> {
        Self::new(date.month(), date.year())
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn advance(self, direction: Direction) -> Self {
        match direction {
            Direction::Previous => self.previous(),
            Direction::Next => self.next(),
        }
    }

    /// The following month. Saturates at December of [`MAX_YEAR`].
    pub fn next(self) -> Self {
        if self.month == 12 {
            if self.year == MAX_YEAR {
                return self;
            }
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    /// The preceding month. Saturates at January of [`MIN_YEAR`].
    pub fn previous(self) -> Self {
        if self.month == 1 {
            if self.year == MIN_YEAR {
                return self;
            }
            Self {
                year: self.year - 1,
                month: 12,
            }
        } else {
            Self {
                year: self.year,
                month: self.month - 1,
            }
        }
    }

    /// Signed number of single-month steps from `self` to `other`.
    pub fn months_until(&self, other: Period) -> i64 {
        (i64::from(other.year) - i64::from(self.year)) * 12 + i64::from(other.month)
            - i64::from(self.month)
    }
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

impl FromStr for Period {
    type Err = ValidationError;

    /// Parses `YYYY-MM`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        NaiveDate::parse_from_str(&format!("{s}-01"), "%Y-%m-%d")
            .ok()
            .and_then(|date| Self::from_date(date).ok())
            .ok_or_else(|| ValidationError::InvalidPeriod(s.to_string()))
    }
}
