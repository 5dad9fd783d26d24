//! Shared test utilities for `BudgetBuddy`.
//!
//! This module provides common helper functions for setting up test databases
//! and creating ledger rows with sensible defaults.

use crate::{
    core::{
        access::Caller,
        budget::{self, NewBudget},
        expense::{self, NewExpense},
        goal::{self, NewGoal},
        income::{self, NewIncome},
        master_budget::{self, NewMasterBudget},
        monthly_overview::{self, NewMonthlyOverview},
    },
    entities,
    errors::Result,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;

/// Owner of every row created by the helpers below.
pub const TEST_USER: &str = "test_user";

/// Creates an in-memory `SQLite` database with all tables initialized.
/// This is the standard setup for all integration tests.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    crate::config::database::create_tables(&db).await?;
    Ok(db)
}

/// Routes `tracing` output through the test harness. Safe to call repeatedly.
pub fn init_test_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new("debug"))
        .with_test_writer()
        .try_init();
}

/// A caller resolved to [`TEST_USER`].
#[must_use]
pub fn test_caller() -> Caller {
    Caller::user(TEST_USER)
}

/// A day in March 2024, the period used by [`create_test_month`].
///
/// # Panics
/// Panics if `day` is not a valid day of March.
#[must_use]
#[allow(clippy::unwrap_used)]
pub fn march(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, day).unwrap()
}

/// Creates "March 2024" (2024-03-01 to 2024-03-31) for `caller`.
pub async fn create_test_month(
    db: &DatabaseConnection,
    caller: &Caller,
) -> Result<entities::monthly_overview::Model> {
    monthly_overview::create_monthly_overview(
        db,
        caller,
        NewMonthlyOverview {
            name: "March 2024".to_string(),
            start_date: march(1),
            end_date: march(31),
        },
    )
    .await
}

/// Creates an active master budget template.
pub async fn create_test_master_budget(
    db: &DatabaseConnection,
    caller: &Caller,
    name: &str,
    budget_amount: Decimal,
    display_order: i32,
) -> Result<entities::master_budget::Model> {
    master_budget::create_master_budget(
        db,
        caller,
        NewMasterBudget {
            name: name.to_string(),
            budget_amount,
            description: None,
            display_order,
        },
    )
    .await
}

/// Creates a budget without override or template link.
pub async fn create_test_budget(
    db: &DatabaseConnection,
    caller: &Caller,
    monthly_overview_id: i64,
    name: &str,
    budget_amount: Decimal,
) -> Result<entities::budget::Model> {
    budget::create_budget(
        db,
        caller,
        NewBudget {
            monthly_overview_id,
            name: name.to_string(),
            budget_amount,
            ..Default::default()
        },
    )
    .await
}

/// Creates an expense dated 2024-03-15.
pub async fn create_test_expense(
    db: &DatabaseConnection,
    caller: &Caller,
    budget_id: i64,
    amount: Decimal,
    financial_goal_id: Option<i64>,
) -> Result<entities::expense::Model> {
    expense::create_expense(
        db,
        caller,
        NewExpense {
            budget_id,
            amount,
            description: "Test expense".to_string(),
            date: march(15),
            financial_goal_id,
            ..Default::default()
        },
    )
    .await
}

/// Creates an active goal starting 2024-01-01 with `current_amount` as its opening balance.
#[allow(clippy::unwrap_used)]
pub async fn create_test_goal(
    db: &DatabaseConnection,
    caller: &Caller,
    name: &str,
    target_amount: Decimal,
    current_amount: Decimal,
) -> Result<entities::financial_goal::Model> {
    goal::create_goal(
        db,
        caller,
        NewGoal {
            name: name.to_string(),
            description: None,
            target_amount,
            current_amount,
            start_date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            end_date: None,
        },
    )
    .await
}

/// Creates an income paid on 2024-03-01.
pub async fn create_test_income(
    db: &DatabaseConnection,
    caller: &Caller,
    monthly_overview_id: i64,
    amount: Decimal,
    tithe_deduction: bool,
) -> Result<entities::income_source::Model> {
    income::create_income(
        db,
        caller,
        NewIncome {
            monthly_overview_id,
            amount,
            source: "Salary".to_string(),
            person: None,
            date_paid: march(1),
            tithe_deduction,
        },
    )
    .await
}
