mod run;

use anyhow::{Context, Result};
use budgetline::config::Config;
use budgetline::db::Database;
use budgetline::models::Period;

fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    let config = Config::from_env()?;
    budgetline::logging::init(&config.log_filter);

    let mut db = Database::open(&config.db_path)?;
    let today = Period::current().context("Failed to read the current month")?;
    db.ensure_main_categories(today)
        .context("Failed to create main categories")?;

    run::as_cli(&args, db, today)
}
