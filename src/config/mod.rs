/// Database configuration and connection management
pub mod database;

/// Master budget seed configuration from config.toml
pub mod master_budgets;
