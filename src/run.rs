mod cli;

pub(crate) use cli::as_cli;

use anyhow::{bail, Result};
use rust_decimal::Decimal;
use std::str::FromStr;

use budgetline::db::Database;
use budgetline::models::{BudgetCategory, CategoryType, OrganizedBudgetState, Period, TypeGroup};

/// Loads the state positioned at the current month and walks it back to
/// `month` one step at a time.
pub(crate) fn load_month(db: &Database, month: Period, today: Period) -> Result<OrganizedBudgetState> {
    if month > today {
        bail!("Cannot browse past the current month ({today})");
    }
    let mut state = db.load_state(today)?;
    state.jump_to(month, today);
    Ok(state)
}

/// Accepts `1200`, `1,200.50` and `$1200`.
pub(crate) fn parse_amount(s: &str) -> Result<Decimal> {
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| *c != '$' && *c != ',')
        .collect();
    Decimal::from_str(&cleaned).map_err(|_| anyhow::anyhow!("Invalid amount: {s}"))
}

pub(crate) fn parse_kind(s: &str) -> Result<CategoryType> {
    CategoryType::parse(s).ok_or_else(|| anyhow::anyhow!("Unknown type '{s}' (use income or expenses)"))
}

pub(crate) fn find_category<'a>(
    state: &'a OrganizedBudgetState,
    name: &str,
) -> Result<&'a BudgetCategory> {
    match state.find_by_name(name) {
        Some(category) => Ok(category),
        None => {
            let names: Vec<&str> = state.categories().map(|c| c.name.as_str()).collect();
            bail!("Category '{name}' not found. Available: {}", names.join(", "))
        }
    }
}

pub(crate) fn print_goals(state: &OrganizedBudgetState) {
    println!("BudgetLine — {}", state.displayed());
    println!("{}", "─".repeat(48));
    for kind in CategoryType::all() {
        print_group(state.group(*kind));
    }
}

fn print_group(group: &TypeGroup) {
    println!(
        "{:<30} ${:>12.2}{}",
        group.main.name,
        group.main.goal(),
        since(&group.main)
    );
    for category in &group.subcategories {
        println!(
            "  {:<28} ${:>12.2}{}",
            category.name,
            category.goal(),
            since(category)
        );
    }
    if !group.subcategories.is_empty() {
        println!("  {:<28} ${:>12.2}", "(unallocated)", group.unallocated());
    }
    println!();
}

fn since(category: &BudgetCategory) -> String {
    format!("  since {}", category.timeline.effective().period)
}
