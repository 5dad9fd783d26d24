//! Master budget configuration loading from config.toml
//!
//! The `[[master_budgets]]` tables in config.toml describe the category
//! templates seeded for `seed_user_id` at start-up. Existing templates with the
//! same name are left untouched.

use crate::errors::{Error, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;

/// Configuration structure representing the entire config.toml file
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// User that owns the seeded templates
    pub seed_user_id: Option<String>,
    /// Master budget templates to seed
    #[serde(default)]
    pub master_budgets: Vec<MasterBudgetConfig>,
}

/// Configuration for a single master budget template
#[derive(Debug, Deserialize, Clone)]
pub struct MasterBudgetConfig {
    /// Category name copied into each month
    pub name: String,
    /// Baseline monthly amount
    pub budget_amount: Decimal,
    /// Optional description
    #[serde(default)]
    pub description: Option<String>,
    /// Sort key; templates are copied in ascending order
    #[serde(default)]
    pub display_order: i32,
}

/// Loads master budget configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - Required fields are missing
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| Error::Config {
        message: format!("Failed to read config file: {e}"),
    })?;

    toml::from_str(&contents).map_err(|e| Error::Config {
        message: format!("Failed to parse config.toml: {e}"),
    })
}

/// Loads configuration from `BUDGET_BUDDY_CONFIG`, or `./config.toml` when unset.
///
/// A missing file yields an empty configuration.
pub fn load_default_config() -> Result<Config> {
    let path = std::env::var("BUDGET_BUDDY_CONFIG").unwrap_or_else(|_| "config.toml".to_string());
    if !Path::new(&path).exists() {
        tracing::warn!("No configuration found at {}; starting without seed data", path);
        return Ok(Config::default());
    }
    load_config(path)
}
