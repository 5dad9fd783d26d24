#![allow(clippy::result_large_err)]

use budget_buddy::{
    config::{
        database::{create_connection, create_tables},
        master_budgets::load_default_config,
    },
    core::master_budget::seed_master_budgets,
    errors::Result,
};
use dotenvy::dotenv;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenv().ok();

    // 3. Load seed configuration
    let config = load_default_config()
        .inspect_err(|e| error!("Failed to load configuration: {}", e))?;

    // 4. Connect and make sure every ledger table exists
    let db = create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {}", e))?;
    create_tables(&db)
        .await
        .inspect_err(|e| error!("Failed to create tables: {}", e))?;

    // 5. Seed master budget templates for the configured user
    let seeded = seed_master_budgets(&db, &config)
        .await
        .inspect_err(|e| error!("Failed to seed master budgets: {}", e))?;
    info!("Seeded {} master budget(s)", seeded);

    info!("Budget ledger ready");
    Ok(())
}
