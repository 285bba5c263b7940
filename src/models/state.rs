use rust_decimal::Decimal;
use std::collections::HashSet;
use tracing::{debug, trace};

use super::{
    BudgetCategory, CategoryId, CategoryType, Direction, GoalChange, GoalTimeline, Period,
};
use crate::error::EngineError;

/// The main category of one type and its ordered subcategories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeGroup {
    pub main: BudgetCategory,
    pub subcategories: Vec<BudgetCategory>,
}

impl TypeGroup {
    pub fn new(main: BudgetCategory) -> Self {
        Self {
            main,
            subcategories: Vec::new(),
        }
    }

    /// Sum of the subcategories' effective goals.
    pub fn subcategory_total(&self) -> Decimal {
        self.subcategories.iter().map(BudgetCategory::goal).sum()
    }

    /// Part of the main goal not yet assigned to a subcategory. Negative
    /// when the subcategories overshoot it.
    pub fn unallocated(&self) -> Decimal {
        self.main.goal() - self.subcategory_total()
    }

    fn position(&self, id: CategoryId) -> Option<usize> {
        self.subcategories.iter().position(|c| c.id == id)
    }

    fn renumber(&mut self) {
        for (order, category) in self.subcategories.iter_mut().enumerate() {
            category.order = order;
        }
    }

    fn all(&self) -> impl Iterator<Item = &BudgetCategory> {
        std::iter::once(&self.main).chain(self.subcategories.iter())
    }

    fn all_mut(&mut self) -> impl Iterator<Item = &mut BudgetCategory> {
        std::iter::once(&mut self.main).chain(self.subcategories.iter_mut())
    }
}

/// Outcome of a single navigation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Navigation {
    Moved(Period),
    /// Refused: the step would go past the real-world current month or
    /// the end of the supported calendar.
    Blocked,
}

/// Where a category lives inside the state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Main(CategoryType),
    Sub(CategoryType, usize),
}

/// Every category of both types plus the month on screen. A plain value:
/// cloning it is how callers keep a rollback snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrganizedBudgetState {
    pub income: TypeGroup,
    pub expenses: TypeGroup,
    displayed: Period,
}

impl OrganizedBudgetState {
    /// Assembles a state and verifies that every timeline and cursor is
    /// consistent with `displayed`.
    pub fn new(
        income: TypeGroup,
        expenses: TypeGroup,
        displayed: Period,
    ) -> Result<Self, EngineError> {
        let state = Self {
            income,
            expenses,
            displayed,
        };
        state.check()?;
        Ok(state)
    }

    pub fn displayed(&self) -> Period {
        self.displayed
    }

    pub fn group(&self, kind: CategoryType) -> &TypeGroup {
        match kind {
            CategoryType::Income => &self.income,
            CategoryType::Expenses => &self.expenses,
        }
    }

    fn group_mut(&mut self, kind: CategoryType) -> &mut TypeGroup {
        match kind {
            CategoryType::Income => &mut self.income,
            CategoryType::Expenses => &mut self.expenses,
        }
    }

    pub fn categories(&self) -> impl Iterator<Item = &BudgetCategory> {
        self.income.all().chain(self.expenses.all())
    }

    fn categories_mut(&mut self) -> impl Iterator<Item = &mut BudgetCategory> {
        self.income.all_mut().chain(self.expenses.all_mut())
    }

    pub fn category(&self, id: CategoryId) -> Option<&BudgetCategory> {
        self.categories().find(|c| c.id == id)
    }

    /// Find a category by name (case-insensitive) across both types.
    pub fn find_by_name(&self, name: &str) -> Option<&BudgetCategory> {
        let lower = name.trim().to_lowercase();
        self.categories().find(|c| c.name.to_lowercase() == lower)
    }

    pub fn locate(&self, id: CategoryId) -> Option<Slot> {
        CategoryType::all().iter().find_map(|&kind| {
            let group = self.group(kind);
            if group.main.id == id {
                Some(Slot::Main(kind))
            } else {
                group.position(id).map(|i| Slot::Sub(kind, i))
            }
        })
    }

    fn category_mut(&mut self, id: CategoryId) -> Result<&mut BudgetCategory, EngineError> {
        match self.locate(id) {
            Some(Slot::Main(kind)) => Ok(&mut self.group_mut(kind).main),
            Some(Slot::Sub(kind, i)) => Ok(&mut self.group_mut(kind).subcategories[i]),
            None => Err(EngineError::CategoryNotFound(id)),
        }
    }

    // ── Goals ─────────────────────────────────────────────────

    /// Records `amount` as the goal of category `id` for the displayed month.
    pub fn record_goal(
        &mut self,
        id: CategoryId,
        amount: Decimal,
    ) -> Result<GoalChange, EngineError> {
        let displayed = self.displayed;
        let category = self.category_mut(id)?;
        let change = category.timeline.record_goal(displayed, amount)?;
        if let GoalChange::Inserted { .. } = change {
            category.timeline.settle(displayed);
        }
        trace!(category = id, %displayed, ?change, "goal recorded");
        Ok(change)
    }

    /// Puts back an earlier copy of a category's timeline, positioned for
    /// the month now on screen. Everything else about the category stays.
    pub fn restore_timeline(
        &mut self,
        id: CategoryId,
        mut timeline: GoalTimeline,
    ) -> Result<(), EngineError> {
        let displayed = self.displayed;
        timeline.reposition(displayed);
        self.category_mut(id)?.timeline = timeline;
        Ok(())
    }

    // ── Navigation ────────────────────────────────────────────

    /// Moves the displayed month one step and repairs every cursor. `today`
    /// is the real-world current month; browsing past it is refused.
    pub fn navigate(&mut self, direction: Direction, today: Period) -> Navigation {
        if direction == Direction::Next && self.displayed >= today {
            debug!(displayed = %self.displayed, %today, "navigation past current month ignored");
            return Navigation::Blocked;
        }
        let from = self.displayed;
        let to = from.advance(direction);
        if to == from {
            return Navigation::Blocked;
        }
        self.displayed = to;
        for category in self.categories_mut() {
            category.timeline.step_cursor(direction, to);
        }
        debug!(%from, %to, "navigated");
        Navigation::Moved(to)
    }

    /// Steps one month at a time toward `target`. Returns the number of
    /// steps taken, which is short of the distance when the current month
    /// blocks the way.
    pub fn jump_to(&mut self, target: Period, today: Period) -> usize {
        let mut steps = 0;
        while self.displayed != target {
            let direction = if target > self.displayed {
                Direction::Next
            } else {
                Direction::Previous
            };
            if self.navigate(direction, today) == Navigation::Blocked {
                break;
            }
            steps += 1;
        }
        steps
    }

    // ── Registry ──────────────────────────────────────────────

    /// Appends a subcategory to its type. Its goal timeline must already be
    /// positioned for the displayed month.
    pub fn add_subcategory(&mut self, mut category: BudgetCategory) -> Result<(), EngineError> {
        if self.locate(category.id).is_some() {
            return Err(EngineError::DuplicateCategory(category.id));
        }
        category.timeline.check(self.displayed)?;
        let group = self.group_mut(category.kind);
        category.order = group.subcategories.len();
        group.subcategories.push(category);
        Ok(())
    }

    /// Renames a category and returns its previous name.
    pub fn rename(&mut self, id: CategoryId, name: String) -> Result<String, EngineError> {
        let category = self.category_mut(id)?;
        Ok(std::mem::replace(&mut category.name, name))
    }

    /// Moves a subcategory to the end of `kind`'s sequence. Returns false
    /// when it already belongs to `kind`.
    pub fn retype(&mut self, id: CategoryId, kind: CategoryType) -> Result<bool, EngineError> {
        let (from, index) = match self.locate(id) {
            Some(Slot::Sub(from, index)) => (from, index),
            Some(Slot::Main(_)) => return Err(EngineError::MainCategoryImmutable(id)),
            None => return Err(EngineError::CategoryNotFound(id)),
        };
        if from == kind {
            return Ok(false);
        }
        let source = self.group_mut(from);
        let mut category = source.subcategories.remove(index);
        source.renumber();

        let target = self.group_mut(kind);
        category.kind = kind;
        category.order = target.subcategories.len();
        target.subcategories.push(category);
        Ok(true)
    }

    /// Replaces `kind`'s subcategory sequence with the permutation given by
    /// `ids` and returns the previous sequence for rollback.
    pub fn reorder(
        &mut self,
        kind: CategoryType,
        ids: &[CategoryId],
    ) -> Result<Vec<BudgetCategory>, EngineError> {
        let group = self.group_mut(kind);
        if ids.len() != group.subcategories.len() {
            return Err(EngineError::InvalidPermutation(format!(
                "expected {} {kind} subcategories, got {}",
                group.subcategories.len(),
                ids.len()
            )));
        }
        let mut seen = HashSet::with_capacity(ids.len());
        let mut reordered = Vec::with_capacity(ids.len());
        for &id in ids {
            if !seen.insert(id) {
                return Err(EngineError::InvalidPermutation(format!(
                    "category {id} listed twice"
                )));
            }
            let category = group
                .subcategories
                .iter()
                .find(|c| c.id == id)
                .ok_or_else(|| {
                    EngineError::InvalidPermutation(format!("category {id} is not a {kind} subcategory"))
                })?;
            reordered.push(category.clone());
        }
        let previous = std::mem::replace(&mut group.subcategories, reordered);
        group.renumber();
        Ok(previous)
    }

    /// Puts back a sequence returned by [`reorder`](Self::reorder).
    pub fn restore_subcategories(&mut self, kind: CategoryType, previous: Vec<BudgetCategory>) {
        self.group_mut(kind).subcategories = previous;
    }

    /// Deletes a subcategory together with its whole goal timeline.
    pub fn remove(&mut self, id: CategoryId) -> Result<BudgetCategory, EngineError> {
        match self.locate(id) {
            Some(Slot::Sub(kind, index)) => {
                let group = self.group_mut(kind);
                let removed = group.subcategories.remove(index);
                group.renumber();
                Ok(removed)
            }
            Some(Slot::Main(_)) => Err(EngineError::MainCategoryImmutable(id)),
            None => Err(EngineError::CategoryNotFound(id)),
        }
    }

    // ── Invariants ────────────────────────────────────────────

    /// Verifies every timeline against the displayed month, plus the type
    /// tags, dense ordering and id uniqueness of the registry.
    pub fn check(&self) -> Result<(), EngineError> {
        let mut ids = HashSet::new();
        for &kind in CategoryType::all() {
            let group = self.group(kind);
            for (order, category) in group.all().enumerate() {
                if !ids.insert(category.id) {
                    return Err(EngineError::DuplicateCategory(category.id));
                }
                if category.kind != kind {
                    return Err(EngineError::MisfiledCategory {
                        id: category.id,
                        kind: category.kind,
                    });
                }
                // The main category is first in `all()`; subcategories follow
                // at order 0, 1, 2, ...
                if order > 0 && category.order != order - 1 {
                    return Err(EngineError::OrderGap {
                        id: category.id,
                        order: category.order,
                        expected: order - 1,
                    });
                }
                category.timeline.check(self.displayed)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
