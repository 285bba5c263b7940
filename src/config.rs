use anyhow::{Context, Result};
use std::path::PathBuf;

pub const DB_ENV: &str = "BUDGETLINE_DB";
pub const LOG_ENV: &str = "BUDGETLINE_LOG";
pub const DEFAULT_LOG_FILTER: &str = "budgetline=warn";

/// Runtime settings for the binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub db_path: PathBuf,
    pub log_filter: String,
}

impl Config {
    /// Reads overrides from the environment and falls back to the platform
    /// data directory.
    pub fn from_env() -> Result<Self> {
        let db = std::env::var(DB_ENV).ok();
        let log = std::env::var(LOG_ENV).ok();
        Self::resolve(db.as_deref(), log.as_deref())
    }

    pub fn resolve(db_override: Option<&str>, log_override: Option<&str>) -> Result<Self> {
        let db_path = match db_override.map(str::trim).filter(|s| !s.is_empty()) {
            Some(path) => PathBuf::from(path),
            None => default_db_path()?,
        };
        let log_filter = log_override
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_LOG_FILTER)
            .to_string();
        Ok(Self {
            db_path,
            log_filter,
        })
    }
}

fn default_db_path() -> Result<PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("com", "budgetline", "BudgetLine")
        .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;
    let data_dir = proj_dirs.data_dir();
    std::fs::create_dir_all(data_dir)
        .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;
    Ok(data_dir.join("budgetline.db"))
}
