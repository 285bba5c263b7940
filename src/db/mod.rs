mod schema;

use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

use crate::models::*;
use crate::sync::{BudgetStore, GoalWrite, NewCategory, WriteVerb};

/// SQLite-backed goal and category store.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .context("Failed to set database pragmas")?;
        let mut db = Self { conn };
        db.migrate().context("Database migration failed")?;
        Ok(db)
    }

    #[cfg(test)]
    pub(crate) fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        let mut db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&mut self) -> Result<()> {
        let has_version_table: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
            [],
            |row| row.get(0),
        )?;

        if !has_version_table {
            // Fresh database
            let tx = self.conn.transaction()?;
            tx.execute_batch(schema::SCHEMA_V1)?;
            tx.execute(
                "INSERT INTO schema_version (version) VALUES (?1)",
                params![schema::CURRENT_VERSION],
            )?;
            tx.commit()?;
            debug!(version = schema::CURRENT_VERSION, "database schema created");
            return Ok(());
        }

        let current: i32 = self
            .conn
            .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
                row.get(0)
            })
            .unwrap_or(0);

        for &(from_version, sql) in schema::MIGRATIONS {
            if current <= from_version {
                self.conn.execute_batch(sql)?;
            }
        }

        if current < schema::CURRENT_VERSION {
            self.conn.execute(
                "UPDATE schema_version SET version = ?1",
                params![schema::CURRENT_VERSION],
            )?;
            debug!(from = current, to = schema::CURRENT_VERSION, "database migrated");
        }

        Ok(())
    }

    /// Creates the Income and Expenses main categories if missing, each with
    /// a zero goal starting at `period`.
    pub fn ensure_main_categories(&mut self, period: Period) -> Result<()> {
        let tx = self.conn.transaction()?;
        for kind in CategoryType::all() {
            let exists: bool = tx.query_row(
                "SELECT EXISTS(SELECT 1 FROM categories WHERE kind = ?1 AND is_main = 1)",
                params![kind.as_str()],
                |row| row.get(0),
            )?;
            if exists {
                continue;
            }
            let id = insert_category(&tx, kind.as_str(), *kind, true, 0)?;
            insert_goal_version(&tx, id, period, Decimal::ZERO)?;
            debug!(category = id, %kind, "main category created");
        }
        tx.commit()?;
        Ok(())
    }

    /// Rebuilds the whole budget state with every cursor positioned for
    /// `displayed`.
    pub fn load_state(&self, displayed: Period) -> Result<OrganizedBudgetState> {
        let mut versions = self.get_goal_versions()?;

        let mut stmt = self.conn.prepare(
            "SELECT id, name, kind, is_main FROM categories ORDER BY sort_order, id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, bool>(3)?,
            ))
        })?;

        let mut mains: HashMap<CategoryType, BudgetCategory> = HashMap::new();
        let mut subs: HashMap<CategoryType, Vec<BudgetCategory>> = HashMap::new();
        for row in rows {
            let (id, name, kind, is_main) = row?;
            let kind = CategoryType::parse(&kind)
                .with_context(|| format!("Category {id} has unknown type '{kind}'"))?;
            let records = versions.remove(&id).unwrap_or_default();
            let timeline = GoalTimeline::from_records(records, displayed)
                .with_context(|| format!("Invalid goal history for category {id}"))?;
            let category = BudgetCategory {
                id,
                name,
                kind,
                order: 0,
                timeline,
            };
            if is_main {
                mains.insert(kind, category);
            } else {
                let group = subs.entry(kind).or_default();
                let mut category = category;
                category.order = group.len();
                group.push(category);
            }
        }

        let mut group = |kind: CategoryType| -> Result<TypeGroup> {
            let main = mains
                .remove(&kind)
                .with_context(|| format!("No main {kind} category in database"))?;
            Ok(TypeGroup {
                main,
                subcategories: subs.remove(&kind).unwrap_or_default(),
            })
        };
        let income = group(CategoryType::Income)?;
        let expenses = group(CategoryType::Expenses)?;
        Ok(OrganizedBudgetState::new(income, expenses, displayed)?)
    }

    fn get_goal_versions(&self) -> Result<HashMap<CategoryId, Vec<GoalRecord>>> {
        let mut stmt = self
            .conn
            .prepare("SELECT category_id, year, month, goal FROM goal_versions")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i32>(1)?,
                row.get::<_, u32>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut versions: HashMap<CategoryId, Vec<GoalRecord>> = HashMap::new();
        for row in rows {
            let (category_id, year, month, goal) = row?;
            let period = Period::new(month, year)?;
            let amount = Decimal::from_str(&goal)
                .with_context(|| format!("Invalid goal '{goal}' for category {category_id}"))?;
            versions
                .entry(category_id)
                .or_default()
                .push(GoalRecord::new(period, amount));
        }
        Ok(versions)
    }
}

fn insert_category(
    conn: &Connection,
    name: &str,
    kind: CategoryType,
    is_main: bool,
    order: usize,
) -> Result<CategoryId> {
    conn.execute(
        "INSERT INTO categories (name, kind, is_main, sort_order, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            name,
            kind.as_str(),
            is_main,
            order as i64,
            chrono::Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

fn insert_goal_version(
    conn: &Connection,
    category_id: CategoryId,
    period: Period,
    goal: Decimal,
) -> Result<()> {
    conn.execute(
        "INSERT INTO goal_versions (category_id, year, month, goal) VALUES (?1, ?2, ?3, ?4)",
        params![category_id, period.year(), period.month(), goal.to_string()],
    )
    .with_context(|| format!("Goal version for {period} of category {category_id} already exists"))?;
    Ok(())
}

impl BudgetStore for Database {
    fn write_goal(&mut self, write: &GoalWrite) -> Result<()> {
        match write.verb {
            WriteVerb::Create => {
                insert_goal_version(&self.conn, write.category_id, write.period, write.goal)?;
            }
            WriteVerb::Overwrite => {
                let changed = self.conn.execute(
                    "UPDATE goal_versions SET goal = ?1
                     WHERE category_id = ?2 AND year = ?3 AND month = ?4",
                    params![
                        write.goal.to_string(),
                        write.category_id,
                        write.period.year(),
                        write.period.month(),
                    ],
                )?;
                if changed == 0 {
                    bail!(
                        "No goal version for {} of category {}",
                        write.period,
                        write.category_id
                    );
                }
            }
        }
        debug!(category = write.category_id, verb = %write.verb, period = %write.period, "goal version stored");
        Ok(())
    }

    fn create_category(&mut self, category: &NewCategory) -> Result<CategoryId> {
        let tx = self.conn.transaction()?;
        let id = insert_category(&tx, &category.name, category.kind, false, category.order)?;
        insert_goal_version(&tx, id, category.period, category.goal)?;
        tx.commit()?;
        Ok(id)
    }

    fn update_category(&mut self, category: &BudgetCategory) -> Result<()> {
        let changed = self.conn.execute(
            "UPDATE categories SET name = ?1, kind = ?2, sort_order = ?3 WHERE id = ?4",
            params![
                category.name,
                category.kind.as_str(),
                category.order as i64,
                category.id,
            ],
        )?;
        if changed == 0 {
            bail!("Category {} not found", category.id);
        }
        Ok(())
    }

    fn delete_category(&mut self, id: CategoryId) -> Result<()> {
        let changed = self.conn.execute(
            "DELETE FROM categories WHERE id = ?1 AND is_main = 0",
            params![id],
        )?;
        if changed == 0 {
            bail!("Subcategory {id} not found");
        }
        Ok(())
    }

    fn reorder_categories(&mut self, kind: CategoryType, ids: &[CategoryId]) -> Result<()> {
        let tx = self.conn.transaction()?;
        for (order, id) in ids.iter().enumerate() {
            let changed = tx.execute(
                "UPDATE categories SET sort_order = ?1 WHERE id = ?2 AND kind = ?3 AND is_main = 0",
                params![order as i64, id, kind.as_str()],
            )?;
            if changed == 0 {
                bail!("Category {id} is not a {kind} subcategory");
            }
        }
        tx.commit()?;
        Ok(())
    }
}
