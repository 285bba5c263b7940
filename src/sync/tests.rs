#![allow(clippy::unwrap_used)]

use anyhow::bail;
use rust_decimal_macros::dec;

use super::*;
use crate::error::{EngineError, ValidationError};
use crate::models::{Direction, TypeGroup};

/// Records every call and refuses the ones named in `fail`.
#[derive(Default)]
struct FakeStore {
    calls: Vec<String>,
    goal_writes: Vec<GoalWrite>,
    fail: Vec<&'static str>,
    next_id: CategoryId,
}

impl FakeStore {
    fn failing(operation: &'static str) -> Self {
        Self {
            fail: vec![operation],
            ..Self::default()
        }
    }

    fn call(&mut self, operation: &'static str, detail: String) -> anyhow::Result<()> {
        self.calls.push(format!("{operation} {detail}"));
        if self.fail.contains(&operation) {
            bail!("store refused {operation}");
        }
        Ok(())
    }
}

impl BudgetStore for FakeStore {
    fn write_goal(&mut self, write: &GoalWrite) -> anyhow::Result<()> {
        self.goal_writes.push(write.clone());
        self.call("write_goal", format!("{} {} {}", write.verb.method(), write.period, write.goal))
    }

    fn create_category(&mut self, category: &NewCategory) -> anyhow::Result<CategoryId> {
        self.call("create_category", category.name.clone())?;
        self.next_id += 1;
        Ok(100 + self.next_id)
    }

    fn update_category(&mut self, category: &BudgetCategory) -> anyhow::Result<()> {
        self.call(
            "update_category",
            format!("{} {} {} {}", category.id, category.name, category.kind, category.order),
        )
    }

    fn delete_category(&mut self, id: CategoryId) -> anyhow::Result<()> {
        self.call("delete_category", id.to_string())
    }

    fn reorder_categories(&mut self, kind: CategoryType, ids: &[CategoryId]) -> anyhow::Result<()> {
        self.call("reorder_categories", format!("{kind} {ids:?}"))
    }
}

fn p(year: i32, month: u32) -> Period {
    Period::new(month, year).unwrap()
}

fn today() -> Period {
    p(2024, 3)
}

/// Rent and Food under Expenses, Salary under Income, displayed at `today()`.
fn state() -> OrganizedBudgetState {
    let now = today();
    let mut state = OrganizedBudgetState::new(
        TypeGroup::new(BudgetCategory::new(1, "Income".into(), CategoryType::Income, now, dec!(5000))),
        TypeGroup::new(BudgetCategory::new(2, "Expenses".into(), CategoryType::Expenses, now, dec!(4000))),
        now,
    )
    .unwrap();
    for (id, name, kind) in [
        (10, "Rent", CategoryType::Expenses),
        (11, "Food", CategoryType::Expenses),
        (20, "Salary", CategoryType::Income),
    ] {
        state
            .add_subcategory(BudgetCategory::new(id, name.into(), kind, now, dec!(100)))
            .unwrap();
    }
    state
}

// ── Write verbs ───────────────────────────────────────────────

#[test]
fn test_write_verb_wire_form() {
    assert_eq!(WriteVerb::Create.method(), "POST");
    assert_eq!(WriteVerb::Create.success_status(), 201);
    assert_eq!(WriteVerb::Overwrite.method(), "PUT");
    assert_eq!(WriteVerb::Overwrite.success_status(), 204);
    assert_eq!(
        WriteVerb::from(&GoalChange::Inserted { index: 0 }),
        WriteVerb::Create
    );
    assert_eq!(
        WriteVerb::from(&GoalChange::Overwritten { previous: dec!(1) }),
        WriteVerb::Overwrite
    );
}

#[test]
fn test_goal_write_body() {
    let write = GoalWrite {
        category_id: 10,
        verb: WriteVerb::Create,
        period: p(2024, 2),
        goal: dec!(400),
    };
    assert_eq!(
        write.body(),
        GoalBody {
            year: 2024,
            month: 2,
            goal: dec!(400),
        }
    );
}

// ── Goal edits ────────────────────────────────────────────────

#[test]
fn test_overwrite_uses_put() {
    let mut state = state();
    let mut sync = Synchronizer::new(FakeStore::default());

    let verb = sync.set_goal(&mut state, 10, dec!(650)).unwrap();
    assert_eq!(verb, WriteVerb::Overwrite);
    assert_eq!(sync.store().calls, vec!["write_goal PUT 2024-03 650"]);
    assert_eq!(state.category(10).unwrap().goal(), dec!(650));
    assert!(!sync.is_in_flight(10));
}

#[test]
fn test_new_version_uses_post() {
    let mut state = state();
    state.navigate(Direction::Previous, today());
    let mut sync = Synchronizer::new(FakeStore::default());

    let verb = sync.set_goal(&mut state, 10, dec!(400)).unwrap();
    assert_eq!(verb, WriteVerb::Create);
    assert_eq!(
        sync.store().goal_writes,
        vec![GoalWrite {
            category_id: 10,
            verb: WriteVerb::Create,
            period: p(2024, 2),
            goal: dec!(400),
        }]
    );
    assert_eq!(state.category(10).unwrap().timeline.len(), 2);
    assert!(state.check().is_ok());
}

#[test]
fn test_failed_write_rolls_back() {
    let mut state = state();
    state.navigate(Direction::Previous, today());
    let before = state.clone();
    let mut sync = Synchronizer::new(FakeStore::failing("write_goal"));

    let err = sync.set_goal(&mut state, 10, dec!(400)).unwrap_err();
    assert!(matches!(
        err,
        SyncError::GoalWriteFailed {
            verb: WriteVerb::Create,
            ..
        }
    ));
    assert_eq!(state, before);
    assert!(!sync.is_in_flight(10));
}

#[test]
fn test_invalid_amount_never_reaches_store() {
    let mut state = state();
    let before = state.clone();
    let mut sync = Synchronizer::new(FakeStore::default());

    let err = sync.set_goal(&mut state, 10, dec!(-5)).unwrap_err();
    assert!(matches!(
        err,
        SyncError::Validation(ValidationError::NegativeAmount(_))
    ));
    let err = sync.set_goal(&mut state, 10, dec!(0.125)).unwrap_err();
    assert!(matches!(err, SyncError::Validation(ValidationError::TooPrecise(_))));
    assert_eq!(state, before);
    assert!(sync.store().calls.is_empty());
}

#[test]
fn test_unknown_category_is_engine_error() {
    let mut state = state();
    let mut sync = Synchronizer::new(FakeStore::default());
    let err = sync.set_goal(&mut state, 99, dec!(1)).unwrap_err();
    assert!(matches!(err, SyncError::Engine(EngineError::CategoryNotFound(99))));
    assert!(!sync.is_in_flight(99));
}

#[test]
fn test_second_edit_while_in_flight_is_refused() {
    let mut state = state();
    let mut sync = Synchronizer::new(FakeStore::default());

    let pending = sync.stage_goal(&mut state, 10, dec!(200)).unwrap();
    assert!(sync.is_in_flight(10));
    let err = sync.stage_goal(&mut state, 10, dec!(300)).unwrap_err();
    assert!(matches!(err, SyncError::WriteInFlight(10)));

    // Other categories stay editable.
    let other = sync.stage_goal(&mut state, 11, dec!(50)).unwrap();

    assert_eq!(
        sync.resolve(&mut state, pending, Ok(())).unwrap(),
        Resolution::Confirmed(WriteVerb::Overwrite)
    );
    assert_eq!(
        sync.resolve(&mut state, other, Ok(())).unwrap(),
        Resolution::Confirmed(WriteVerb::Overwrite)
    );
    assert_eq!(state.category(10).unwrap().goal(), dec!(200));
    assert_eq!(state.category(11).unwrap().goal(), dec!(50));
}

#[test]
fn test_failed_write_keeps_later_confirmed_write() {
    let mut state = state();
    let mut sync = Synchronizer::new(FakeStore::default());

    let rent = sync.stage_goal(&mut state, 10, dec!(200)).unwrap();
    let food = sync.stage_goal(&mut state, 11, dec!(300)).unwrap();
    assert_eq!(rent.request().category_id, 10);

    assert_eq!(
        sync.resolve(&mut state, food, Ok(())).unwrap(),
        Resolution::Confirmed(WriteVerb::Overwrite)
    );
    let err = sync
        .resolve(&mut state, rent, Err(anyhow::anyhow!("connection reset")))
        .unwrap_err();
    assert!(matches!(err, SyncError::GoalWriteFailed { .. }));

    assert_eq!(state.category(10).unwrap().goal(), dec!(100));
    assert_eq!(state.category(11).unwrap().goal(), dec!(300));
    assert!(!sync.is_in_flight(10));
    assert!(!sync.is_in_flight(11));
    assert!(state.check().is_ok());
}

#[test]
fn test_failed_write_keeps_pending_write_of_other_category() {
    let mut state = state();
    let mut sync = Synchronizer::new(FakeStore::default());

    let rent = sync.stage_goal(&mut state, 10, dec!(200)).unwrap();
    let food = sync.stage_goal(&mut state, 11, dec!(300)).unwrap();

    sync.resolve(&mut state, rent, Err(anyhow::anyhow!("timeout")))
        .unwrap_err();
    assert!(sync.is_in_flight(11));
    assert_eq!(
        sync.resolve(&mut state, food, Ok(())).unwrap(),
        Resolution::Confirmed(WriteVerb::Overwrite)
    );
    assert_eq!(state.category(10).unwrap().goal(), dec!(100));
    assert_eq!(state.category(11).unwrap().goal(), dec!(300));
}

#[test]
fn test_failed_write_keeps_registry_changes_and_navigation() {
    let mut state = state();
    let mut sync = Synchronizer::new(FakeStore::default());

    // A new February version for Rent, then the user keeps working.
    state.navigate(Direction::Previous, today());
    let rent = sync.stage_goal(&mut state, 10, dec!(400)).unwrap();
    assert_eq!(rent.request().verb, WriteVerb::Create);
    sync.rename(&mut state, 10, "Housing").unwrap();
    sync.retype(&mut state, 10, CategoryType::Income).unwrap();
    state.navigate(Direction::Next, today());

    sync.resolve(&mut state, rent, Err(anyhow::anyhow!("refused")))
        .unwrap_err();
    let housing = state.category(10).unwrap();
    assert_eq!(housing.name, "Housing");
    assert_eq!(housing.kind, CategoryType::Income);
    assert_eq!(housing.timeline.len(), 1);
    assert_eq!(housing.goal(), dec!(100));
    assert_eq!(state.displayed(), today());
    assert!(state.check().is_ok());
}

#[test]
fn test_rollback_keeps_earlier_tickets() {
    let mut state = state();
    let mut sync = Synchronizer::new(FakeStore::default());

    let first = sync.stage_goal(&mut state, 10, dec!(200)).unwrap();
    let second = sync.stage_goal(&mut state, 11, dec!(300)).unwrap();

    sync.resolve(&mut state, second, Err(anyhow::anyhow!("timeout")))
        .unwrap_err();
    assert!(sync.is_in_flight(10));
    assert_eq!(state.category(10).unwrap().goal(), dec!(200));
    assert_eq!(state.category(11).unwrap().goal(), dec!(100));

    assert_eq!(
        sync.resolve(&mut state, first, Ok(())).unwrap(),
        Resolution::Confirmed(WriteVerb::Overwrite)
    );
}

#[test]
fn test_answer_for_removed_category_is_stale() {
    let mut state = state();
    let mut sync = Synchronizer::new(FakeStore::default());

    let pending = sync.stage_goal(&mut state, 11, dec!(300)).unwrap();
    state.remove(11).unwrap();
    let before = state.clone();

    assert_eq!(
        sync.resolve(&mut state, pending, Err(anyhow::anyhow!("gone"))).unwrap(),
        Resolution::Stale
    );
    assert_eq!(state, before);
    assert!(!sync.is_in_flight(11));
}

// ── Categories ────────────────────────────────────────────────

#[test]
fn test_add_subcategory_uses_store_id() {
    let mut state = state();
    let mut sync = Synchronizer::new(FakeStore::default());

    let id = sync
        .add_subcategory(&mut state, "  Fuel ", CategoryType::Expenses, dec!(60))
        .unwrap();
    assert_eq!(id, 101);
    let fuel = state.category(id).unwrap();
    assert_eq!(fuel.name, "Fuel");
    assert_eq!(fuel.order, 2);
    assert_eq!(fuel.goal(), dec!(60));
    assert_eq!(fuel.timeline.effective().period, today());
    assert!(state.check().is_ok());
}

#[test]
fn test_add_subcategory_failure_leaves_state() {
    let mut state = state();
    let before = state.clone();
    let mut sync = Synchronizer::new(FakeStore::failing("create_category"));

    let err = sync
        .add_subcategory(&mut state, "Fuel", CategoryType::Expenses, dec!(60))
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::Persistence {
            operation: "create category",
            ..
        }
    ));
    assert_eq!(state, before);

    let err = sync
        .add_subcategory(&mut state, "   ", CategoryType::Expenses, dec!(60))
        .unwrap_err();
    assert!(matches!(err, SyncError::Validation(ValidationError::EmptyName)));
}

#[test]
fn test_add_subcategory_rejects_taken_name() {
    let mut state = state();
    let before = state.clone();
    let mut sync = Synchronizer::new(FakeStore::default());

    for name in ["food", "Salary", " Income ", "EXPENSES"] {
        let err = sync
            .add_subcategory(&mut state, name, CategoryType::Expenses, dec!(1))
            .unwrap_err();
        assert!(
            matches!(err, SyncError::Validation(ValidationError::DuplicateName(_))),
            "{name}"
        );
    }
    assert_eq!(state, before);
    assert!(sync.store().calls.is_empty());
}

#[test]
fn test_rename_rejects_taken_name() {
    let mut state = state();
    let mut sync = Synchronizer::new(FakeStore::default());

    let err = sync.rename(&mut state, 11, "rent").unwrap_err();
    assert!(matches!(
        err,
        SyncError::Validation(ValidationError::DuplicateName(_))
    ));
    assert_eq!(state.category(11).unwrap().name, "Food");

    // Changing only the case of its own name is allowed.
    sync.rename(&mut state, 11, "FOOD").unwrap();
    assert_eq!(state.category(11).unwrap().name, "FOOD");
}

#[test]
fn test_rename_rolls_back() {
    let mut state = state();
    let mut sync = Synchronizer::new(FakeStore::failing("update_category"));

    assert!(sync.rename(&mut state, 11, "Groceries").is_err());
    assert_eq!(state.category(11).unwrap().name, "Food");

    let mut sync = Synchronizer::new(FakeStore::default());
    sync.rename(&mut state, 11, "Groceries").unwrap();
    assert_eq!(state.category(11).unwrap().name, "Groceries");
    assert_eq!(sync.store().calls, vec!["update_category 11 Groceries Expenses 1"]);
}

#[test]
fn test_retype_persists_moved_and_remaining() {
    let mut state = state();
    let mut sync = Synchronizer::new(FakeStore::default());

    assert!(sync.retype(&mut state, 10, CategoryType::Income).unwrap());
    assert_eq!(
        sync.store().calls,
        vec![
            "update_category 10 Rent Income 1",
            "reorder_categories Expenses [11]",
        ]
    );
    assert!(state.check().is_ok());

    assert!(!sync.retype(&mut state, 10, CategoryType::Income).unwrap());
    assert_eq!(sync.store().calls.len(), 2);
}

#[test]
fn test_retype_rolls_back() {
    let mut state = state();
    let before = state.clone();
    let mut sync = Synchronizer::new(FakeStore::failing("reorder_categories"));

    assert!(sync.retype(&mut state, 10, CategoryType::Income).is_err());
    assert_eq!(state, before);
}

#[test]
fn test_remove_rolls_back() {
    let mut state = state();
    let before = state.clone();
    let mut sync = Synchronizer::new(FakeStore::failing("delete_category"));

    assert!(sync.remove(&mut state, 10).is_err());
    assert_eq!(state, before);

    let mut sync = Synchronizer::new(FakeStore::default());
    let removed = sync.remove(&mut state, 10).unwrap();
    assert_eq!(removed.name, "Rent");
    assert_eq!(
        sync.store().calls,
        vec!["delete_category 10", "reorder_categories Expenses [11]"]
    );
    assert_eq!(state.category(11).unwrap().order, 0);
}

#[test]
fn test_remove_refused_while_goal_in_flight() {
    let mut state = state();
    let mut sync = Synchronizer::new(FakeStore::default());

    let pending = sync.stage_goal(&mut state, 10, dec!(1)).unwrap();
    assert!(matches!(
        sync.remove(&mut state, 10),
        Err(SyncError::WriteInFlight(10))
    ));
    sync.resolve(&mut state, pending, Ok(())).unwrap();
    assert!(sync.remove(&mut state, 10).is_ok());
}

#[test]
fn test_remove_main_category_is_refused() {
    let mut state = state();
    let mut sync = Synchronizer::new(FakeStore::default());
    assert!(matches!(
        sync.remove(&mut state, 2),
        Err(SyncError::Engine(EngineError::MainCategoryImmutable(2)))
    ));
    assert!(sync.into_store().calls.is_empty());
}

#[test]
fn test_reorder_restores_previous_sequence() {
    let mut state = state();
    let before = state.clone();
    let mut sync = Synchronizer::new(FakeStore::failing("reorder_categories"));

    let err = sync
        .reorder(&mut state, CategoryType::Expenses, &[11, 10])
        .unwrap_err();
    assert!(matches!(
        err,
        SyncError::Persistence {
            operation: "reorder categories",
            ..
        }
    ));
    assert_eq!(state, before);

    sync.store_mut().fail.clear();
    sync.reorder(&mut state, CategoryType::Expenses, &[11, 10])
        .unwrap();
    let ids: Vec<_> = state.expenses.subcategories.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![11, 10]);
}
