use rust_decimal::Decimal;

use super::Period;
use crate::error::{EngineError, ValidationError};

/// One version of a category's goal, effective from `period` until a newer
/// version supersedes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalRecord {
    pub period: Period,
    pub amount: Decimal,
}

impl GoalRecord {
    pub fn new(period: Period, amount: Decimal) -> Self {
        Self { period, amount }
    }
}

/// What a goal edit did to the timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GoalChange {
    /// The edited period already had a version; its amount was replaced.
    Overwritten { previous: Decimal },
    /// A new version was inserted at `index`.
    Inserted { index: usize },
}

/// Goal versions of one category, newest period first, plus the cursor
/// pointing at the version effective for the displayed period.
///
/// Invariants: never empty, strictly descending by period, and
/// `cursor < records.len()`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalTimeline {
    records: Vec<GoalRecord>,
    cursor: usize,
}

impl GoalTimeline {
    pub fn new(period: Period, amount: Decimal) -> Self {
        Self {
            records: vec![GoalRecord::new(period, amount)],
            cursor: 0,
        }
    }

    /// Builds a timeline from stored versions in any order and seeks the
    /// cursor for `displayed`.
    pub fn from_records(
        mut records: Vec<GoalRecord>,
        displayed: Period,
    ) -> Result<Self, EngineError> {
        if records.is_empty() {
            return Err(EngineError::EmptyTimeline);
        }
        records.sort_by(|a, b| b.period.cmp(&a.period));
        if let Some(pair) = records.windows(2).find(|w| w[0].period == w[1].period) {
            return Err(EngineError::DuplicatePeriod(pair[0].period));
        }
        let mut timeline = Self { records, cursor: 0 };
        timeline.cursor = timeline.seek(displayed);
        Ok(timeline)
    }

    pub fn records(&self) -> &[GoalRecord] {
        &self.records
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Always false; a timeline holds at least one version.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn effective(&self) -> &GoalRecord {
        &self.records[self.cursor]
    }

    pub fn amount(&self) -> Decimal {
        self.effective().amount
    }

    pub fn version_for(&self, period: Period) -> Option<&GoalRecord> {
        self.records.iter().find(|r| r.period == period)
    }

    /// Index of the newest version at or before `displayed`, or the oldest
    /// version when every version lies after it. This is the full scan the
    /// cursor exists to avoid; it runs at load time and in checks.
    pub fn seek(&self, displayed: Period) -> usize {
        self.records
            .iter()
            .position(|r| r.period <= displayed)
            .unwrap_or(self.records.len() - 1)
    }

    /// Records `amount` as the goal for `period`, inserting next to the
    /// cursor. Edits are expected to target the period on screen, so the
    /// insertion point is always the cursor or its older neighbour. Anything
    /// else is rejected without touching the timeline.
    pub fn record_goal(
        &mut self,
        period: Period,
        amount: Decimal,
    ) -> Result<GoalChange, EngineError> {
        let effective = self.records[self.cursor].period;

        if effective == period {
            let previous = std::mem::replace(&mut self.records[self.cursor].amount, amount);
            return Ok(GoalChange::Overwritten { previous });
        }

        let index = if period > effective {
            // The new version takes the cursor's slot and becomes effective.
            if let Some(newer) = self.cursor.checked_sub(1).map(|i| &self.records[i]) {
                if newer.period <= period {
                    return Err(misplaced(newer.period, period, effective));
                }
            }
            self.cursor
        } else {
            if let Some(older) = self.records.get(self.cursor + 1) {
                if older.period >= period {
                    return Err(misplaced(older.period, period, effective));
                }
            }
            self.cursor + 1
        };

        self.records.insert(index, GoalRecord::new(period, amount));
        Ok(GoalChange::Inserted { index })
    }

    /// Moves the cursor one version older when the effective version lies
    /// after `displayed` and the next older one does not.
    pub(crate) fn settle(&mut self, displayed: Period) {
        if let Some(older) = self.records.get(self.cursor + 1) {
            if self.records[self.cursor].period > displayed && older.period <= displayed {
                self.cursor += 1;
            }
        }
    }

    /// Re-seeks the cursor with a full scan. Used when an older copy of the
    /// timeline is put back after the displayed period may have moved.
    pub(crate) fn reposition(&mut self, displayed: Period) {
        self.cursor = self.seek(displayed);
    }

    /// Repairs the cursor after the displayed period moved one month in
    /// `direction` to `displayed`. Only the adjacent version is inspected.
    pub(crate) fn step_cursor(&mut self, direction: super::Direction, displayed: Period) {
        match direction {
            super::Direction::Previous => {
                if self.cursor + 1 == self.records.len() {
                    return;
                }
                if self.records[self.cursor].period > displayed {
                    self.cursor += 1;
                }
            }
            super::Direction::Next => {
                if self.cursor == 0 {
                    return;
                }
                if self.records[self.cursor - 1].period == displayed {
                    self.cursor -= 1;
                }
            }
        }
    }

    /// Verifies ordering, bounds and cursor effectiveness for `displayed`.
    pub fn check(&self, displayed: Period) -> Result<(), EngineError> {
        if self.records.is_empty() {
            return Err(EngineError::EmptyTimeline);
        }
        if self.cursor >= self.records.len() {
            return Err(EngineError::CursorOutOfBounds {
                cursor: self.cursor,
                len: self.records.len(),
            });
        }
        for w in self.records.windows(2) {
            if w[0].period == w[1].period {
                return Err(EngineError::DuplicatePeriod(w[0].period));
            }
            if w[0].period < w[1].period {
                return Err(EngineError::OutOfOrder {
                    newer: w[1].period,
                    older: w[0].period,
                });
            }
        }
        let expected = self.seek(displayed);
        if expected != self.cursor {
            return Err(EngineError::MisplacedCursor {
                cursor: self.cursor,
                expected,
            });
        }
        Ok(())
    }
}

fn misplaced(neighbour: Period, period: Period, effective: Period) -> EngineError {
    if neighbour == period {
        EngineError::DuplicatePeriod(period)
    } else {
        EngineError::NonAdjacentEdit { period, effective }
    }
}

pub const MAX_GOAL: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Range and precision check for an edited goal amount.
pub fn validate_amount(amount: Decimal) -> Result<Decimal, ValidationError> {
    if amount.is_sign_negative() && !amount.is_zero() {
        return Err(ValidationError::NegativeAmount(amount));
    }
    if amount > MAX_GOAL {
        return Err(ValidationError::AmountTooLarge(amount));
    }
    if amount.normalize().scale() > 2 {
        return Err(ValidationError::TooPrecise(amount));
    }
    Ok(amount)
}
