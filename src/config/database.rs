//! Database configuration module for `BudgetBuddy`.
//!
//! This module handles the database connection and table creation using `SeaORM`.
//! Tables are generated with `Schema::create_table_from_entity`, so the schema
//! always matches the entity definitions. Parents are created before children
//! so foreign keys resolve.

use crate::entities::{
    Budget, Expense, FinancialGoal, FinancialSubGoal, GoalContribution, GoalDrawdown,
    IncomeSource, Loan, LoanPayment, MasterBudget, MonthlyOverview, SavingsBucket,
    SavingsTransaction, Subscription, Transfer,
};
use crate::errors::Result;
use sea_orm::{ConnectionTrait, Database, DatabaseConnection, EntityTrait, Schema};
use tracing::{debug, info};

const DEFAULT_DATABASE_URL: &str = "sqlite://data/budget_buddy.sqlite?mode=rwc";

/// Gets the database URL from environment variable or returns default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Establishes a connection to the database named by `DATABASE_URL`.
///
/// Falls back to a local `SQLite` file if no environment variable is set.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let database_url = get_database_url();
    debug!("Connecting to {}", database_url);
    Database::connect(&database_url).await.map_err(Into::into)
}

async fn create_table<E>(db: &DatabaseConnection, schema: &Schema, entity: E) -> Result<()>
where
    E: EntityTrait,
{
    let builder = db.get_database_backend();
    let mut statement = schema.create_table_from_entity(entity);
    statement.if_not_exists();
    db.execute(builder.build(&statement)).await?;
    Ok(())
}

/// Creates every ledger table if it does not exist yet.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let schema = Schema::new(db.get_database_backend());

    create_table(db, &schema, MonthlyOverview).await?;
    create_table(db, &schema, MasterBudget).await?;
    create_table(db, &schema, FinancialGoal).await?;
    create_table(db, &schema, Budget).await?;
    create_table(db, &schema, Expense).await?;
    create_table(db, &schema, IncomeSource).await?;
    create_table(db, &schema, FinancialSubGoal).await?;
    create_table(db, &schema, GoalContribution).await?;
    create_table(db, &schema, GoalDrawdown).await?;
    create_table(db, &schema, Transfer).await?;
    create_table(db, &schema, Loan).await?;
    create_table(db, &schema, LoanPayment).await?;
    create_table(db, &schema, Subscription).await?;
    create_table(db, &schema, SavingsBucket).await?;
    create_table(db, &schema, SavingsTransaction).await?;

    info!("Ledger tables ensured");
    Ok(())
}
