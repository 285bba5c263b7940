//! Sends engine mutations to the backing store and rolls the in-memory state
//! back when the store refuses them.

use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use crate::error::{EngineError, SyncError, ValidationError};
use crate::models::{
    validate_amount, validate_name, BudgetCategory, CategoryId, CategoryType, GoalChange,
    GoalTimeline, OrganizedBudgetState, Period,
};

/// How a goal edit reaches the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteVerb {
    /// A version was inserted for a period that had none.
    Create,
    /// The period already had a version; its amount was replaced.
    Overwrite,
}

impl WriteVerb {
    pub fn method(&self) -> &'static str {
        match self {
            Self::Create => "POST",
            Self::Overwrite => "PUT",
        }
    }

    /// Status a remote store answers with on success.
    pub fn success_status(&self) -> u16 {
        match self {
            Self::Create => 201,
            Self::Overwrite => 204,
        }
    }
}

impl From<&GoalChange> for WriteVerb {
    fn from(change: &GoalChange) -> Self {
        match change {
            GoalChange::Overwritten { .. } => Self::Overwrite,
            GoalChange::Inserted { .. } => Self::Create,
        }
    }
}

impl std::fmt::Display for WriteVerb {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Create => write!(f, "create goal version"),
            Self::Overwrite => write!(f, "overwrite goal version"),
        }
    }
}

/// Request body of a goal write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalBody {
    pub year: i32,
    pub month: u32,
    pub goal: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GoalWrite {
    pub category_id: CategoryId,
    pub verb: WriteVerb,
    pub period: Period,
    pub goal: Decimal,
}

impl GoalWrite {
    pub fn body(&self) -> GoalBody {
        GoalBody {
            year: self.period.year(),
            month: self.period.month(),
            goal: self.goal,
        }
    }
}

/// A category about to be created; the store assigns its id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCategory {
    pub name: String,
    pub kind: CategoryType,
    pub order: usize,
    pub period: Period,
    pub goal: Decimal,
}

/// The persistence side of the engine. Goal writes are versioned; category
/// operations are plain CRUD.
pub trait BudgetStore {
    fn write_goal(&mut self, write: &GoalWrite) -> anyhow::Result<()>;
    fn create_category(&mut self, category: &NewCategory) -> anyhow::Result<CategoryId>;
    /// Persists name, type and order.
    fn update_category(&mut self, category: &BudgetCategory) -> anyhow::Result<()>;
    fn delete_category(&mut self, id: CategoryId) -> anyhow::Result<()>;
    /// Persists the order of `kind`'s subcategories as listed.
    fn reorder_categories(&mut self, kind: CategoryType, ids: &[CategoryId])
        -> anyhow::Result<()>;
}

/// A goal edit applied locally and awaiting the store's answer. Hand it back
/// to [`Synchronizer::resolve`] with the outcome.
#[derive(Debug)]
#[must_use]
pub struct PendingGoalWrite {
    ticket: u64,
    /// The edited category's timeline before the edit.
    previous: GoalTimeline,
    request: GoalWrite,
}

impl PendingGoalWrite {
    pub fn request(&self) -> &GoalWrite {
        &self.request
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    Confirmed(WriteVerb),
    /// The ticket is no longer the category's outstanding write, or the
    /// category is gone; the answer was ignored.
    Stale,
}

pub struct Synchronizer<S> {
    store: S,
    next_ticket: u64,
    in_flight: BTreeMap<CategoryId, u64>,
}

impl<S: BudgetStore> Synchronizer<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            next_ticket: 0,
            in_flight: BTreeMap::new(),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn is_in_flight(&self, id: CategoryId) -> bool {
        self.in_flight.contains_key(&id)
    }

    // ── Goals ─────────────────────────────────────────────────

    /// Sets the goal of category `id` for the displayed month and writes it
    /// through. On failure `state` is back where it started.
    pub fn set_goal(
        &mut self,
        state: &mut OrganizedBudgetState,
        id: CategoryId,
        amount: Decimal,
    ) -> Result<WriteVerb, SyncError> {
        let pending = self.stage_goal(state, id, amount)?;
        let verb = pending.request.verb;
        let outcome = self.store.write_goal(&pending.request);
        self.resolve(state, pending, outcome)?;
        Ok(verb)
    }

    /// Validates and applies a goal edit locally, returning the write to
    /// send. The category accepts no further edits until it resolves.
    pub fn stage_goal(
        &mut self,
        state: &mut OrganizedBudgetState,
        id: CategoryId,
        amount: Decimal,
    ) -> Result<PendingGoalWrite, SyncError> {
        let amount = validate_amount(amount)?;
        if self.is_in_flight(id) {
            return Err(SyncError::WriteInFlight(id));
        }
        let previous = match state.category(id) {
            Some(category) => category.timeline.clone(),
            None => return Err(EngineError::CategoryNotFound(id).into()),
        };
        let change = state.record_goal(id, amount)?;

        let ticket = self.next_ticket;
        self.next_ticket += 1;
        self.in_flight.insert(id, ticket);

        let request = GoalWrite {
            category_id: id,
            verb: WriteVerb::from(&change),
            period: state.displayed(),
            goal: amount,
        };
        debug!(ticket, category = id, verb = %request.verb, period = %request.period, "goal write staged");
        Ok(PendingGoalWrite {
            ticket,
            previous,
            request,
        })
    }

    /// Applies the store's answer to a staged write. Success keeps the local
    /// edit. Failure puts back the category's timeline as it was before the
    /// edit, re-positioned for the month now on screen; edits to other
    /// categories and registry changes made in the meantime are kept, since
    /// the store may already have confirmed them.
    pub fn resolve(
        &mut self,
        state: &mut OrganizedBudgetState,
        pending: PendingGoalWrite,
        outcome: anyhow::Result<()>,
    ) -> Result<Resolution, SyncError> {
        let PendingGoalWrite {
            ticket,
            previous,
            request,
        } = pending;
        let id = request.category_id;

        if self.in_flight.get(&id) != Some(&ticket) {
            debug!(ticket, category = id, "stale goal write answer ignored");
            return Ok(Resolution::Stale);
        }
        if state.category(id).is_none() {
            self.in_flight.remove(&id);
            debug!(ticket, category = id, "goal write answer for removed category ignored");
            return Ok(Resolution::Stale);
        }

        match outcome {
            Ok(()) => {
                self.in_flight.remove(&id);
                info!(category = id, verb = %request.verb, period = %request.period, goal = %request.goal, "goal write confirmed");
                Ok(Resolution::Confirmed(request.verb))
            }
            Err(reason) => {
                self.in_flight.remove(&id);
                state.restore_timeline(id, previous)?;
                warn!(category = id, verb = %request.verb, period = %request.period, "goal write failed, rolled back: {reason:#}");
                Err(SyncError::GoalWriteFailed {
                    verb: request.verb,
                    reason,
                })
            }
        }
    }

    // ── Categories ────────────────────────────────────────────

    /// Creates a subcategory with an initial goal for the displayed month.
    /// The store is asked first since it assigns the id.
    pub fn add_subcategory(
        &mut self,
        state: &mut OrganizedBudgetState,
        name: &str,
        kind: CategoryType,
        goal: Decimal,
    ) -> Result<CategoryId, SyncError> {
        let name = validate_name(name)?;
        if state.find_by_name(&name).is_some() {
            return Err(ValidationError::DuplicateName(name).into());
        }
        let goal = validate_amount(goal)?;
        let new = NewCategory {
            name,
            kind,
            order: state.group(kind).subcategories.len(),
            period: state.displayed(),
            goal,
        };
        let id = self
            .store
            .create_category(&new)
            .map_err(|reason| SyncError::Persistence {
                operation: "create category",
                reason,
            })?;
        state.add_subcategory(BudgetCategory::new(id, new.name, kind, new.period, goal))?;
        info!(category = id, %kind, "category created");
        Ok(id)
    }

    pub fn rename(
        &mut self,
        state: &mut OrganizedBudgetState,
        id: CategoryId,
        name: &str,
    ) -> Result<(), SyncError> {
        let name = validate_name(name)?;
        if let Some(other) = state.find_by_name(&name) {
            if other.id != id {
                return Err(ValidationError::DuplicateName(name).into());
            }
        }
        let previous = state.rename(id, name)?;
        let result = match state.category(id) {
            Some(category) => self.store.update_category(category),
            None => Ok(()),
        };
        if let Err(reason) = result {
            state.rename(id, previous)?;
            return Err(rolled_back("rename category", reason));
        }
        Ok(())
    }

    /// Moves a subcategory to `kind`. Returns false when it was already there.
    pub fn retype(
        &mut self,
        state: &mut OrganizedBudgetState,
        id: CategoryId,
        kind: CategoryType,
    ) -> Result<bool, SyncError> {
        let snapshot = state.clone();
        if !state.retype(id, kind)? {
            return Ok(false);
        }
        let from = kind.other();
        let remaining = subcategory_ids(state, from);
        let result = match state.category(id) {
            Some(moved) => self
                .store
                .update_category(moved)
                .and_then(|()| self.store.reorder_categories(from, &remaining)),
            None => Ok(()),
        };
        if let Err(reason) = result {
            *state = snapshot;
            return Err(rolled_back("move category", reason));
        }
        info!(category = id, %from, to = %kind, "category moved");
        Ok(true)
    }

    /// Deletes a subcategory and its goal history.
    pub fn remove(
        &mut self,
        state: &mut OrganizedBudgetState,
        id: CategoryId,
    ) -> Result<BudgetCategory, SyncError> {
        if self.is_in_flight(id) {
            return Err(SyncError::WriteInFlight(id));
        }
        let snapshot = state.clone();
        let removed = state.remove(id)?;
        let remaining = subcategory_ids(state, removed.kind);
        let result = self
            .store
            .delete_category(id)
            .and_then(|()| self.store.reorder_categories(removed.kind, &remaining));
        if let Err(reason) = result {
            *state = snapshot;
            return Err(rolled_back("delete category", reason));
        }
        info!(category = id, "category deleted");
        Ok(removed)
    }

    /// Optimistically reorders `kind`'s subcategories; the previous sequence
    /// is assigned back if the store refuses.
    pub fn reorder(
        &mut self,
        state: &mut OrganizedBudgetState,
        kind: CategoryType,
        ids: &[CategoryId],
    ) -> Result<(), SyncError> {
        let previous = state.reorder(kind, ids)?;
        if let Err(reason) = self.store.reorder_categories(kind, ids) {
            state.restore_subcategories(kind, previous);
            return Err(rolled_back("reorder categories", reason));
        }
        debug!(%kind, count = ids.len(), "categories reordered");
        Ok(())
    }
}

fn rolled_back(operation: &'static str, reason: anyhow::Error) -> SyncError {
    warn!("{operation} failed, rolled back: {reason:#}");
    SyncError::Persistence { operation, reason }
}

fn subcategory_ids(state: &OrganizedBudgetState, kind: CategoryType) -> Vec<CategoryId> {
    state
        .group(kind)
        .subcategories
        .iter()
        .map(|c| c.id)
        .collect()
}

#[cfg(test)]
mod tests;
