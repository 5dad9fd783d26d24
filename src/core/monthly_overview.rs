//! Monthly overview business logic - Budget periods.
//!
//! A month owns its budgets, incomes, goal contributions, drawdowns and
//! transfers. Creating one populates default budgets; deleting one removes
//! everything it owns.

use crate::{
    core::{
        access::{Caller, find_owned},
        budget, goal,
        summary::{self, MonthlyOverviewSummary},
        validation,
    },
    entities::{
        Budget, Expense, GoalContribution, GoalDrawdown, IncomeSource, MonthlyOverview, Transfer,
        budget as budget_entity, expense, goal_contribution, goal_drawdown, income_source,
        monthly_overview, transfer,
    },
    errors::{Result, StoreContext},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use std::collections::BTreeSet;
use tracing::{error, info, instrument};

pub(crate) const RESOURCE: &str = "monthly overview";

/// Input for [`create_monthly_overview`].
#[derive(Debug, Clone)]
pub struct NewMonthlyOverview {
    pub name: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

/// Fields changed by [`update_monthly_overview`].
#[derive(Debug, Clone, Default)]
pub struct MonthlyOverviewPatch {
    pub name: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Creates a month and copies the caller's active master budgets into it.
///
/// Populating default budgets is best-effort: a failure there is logged and
/// the new month is still returned.
#[instrument(skip(db))]
pub async fn create_monthly_overview(
    db: &DatabaseConnection,
    caller: &Caller,
    new: NewMonthlyOverview,
) -> Result<monthly_overview::Model> {
    let user_id = caller.require()?;
    let name = validation::required_text(&new.name, "name")?;
    validation::date_range_order(new.start_date, Some(new.end_date))?;

    let now = Utc::now();
    let model = monthly_overview::ActiveModel {
        user_id: Set(user_id.to_string()),
        name: Set(name),
        start_date: Set(new.start_date),
        end_date: Set(new.end_date),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let created = model
        .insert(db)
        .await
        .context("Failed to create monthly overview")?;
    info!(
        "Created monthly overview '{}' (ID: {}) {} to {}",
        created.name, created.id, created.start_date, created.end_date
    );

    if let Err(e) = budget::populate_default_budgets(db, user_id, created.id).await {
        error!(
            "Failed to create default budgets for month {}: {}",
            created.id, e
        );
    }

    Ok(created)
}

/// Retrieves a month by ID.
pub async fn get_monthly_overview(
    db: &DatabaseConnection,
    caller: &Caller,
    id: i64,
) -> Result<monthly_overview::Model> {
    let user_id = caller.require()?;
    find_owned::<MonthlyOverview, _>(db, user_id, RESOURCE, id).await
}

/// Lists the caller's months, most recent first.
pub async fn get_monthly_overviews(
    db: &DatabaseConnection,
    caller: &Caller,
) -> Result<Vec<monthly_overview::Model>> {
    let user_id = caller.require()?;
    MonthlyOverview::find()
        .filter(monthly_overview::Column::UserId.eq(user_id))
        .order_by_desc(monthly_overview::Column::StartDate)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Renames a month or moves its bounds.
///
/// Rows already dated outside new bounds are left untouched; only later
/// writes are checked against them.
#[instrument(skip(db))]
pub async fn update_monthly_overview(
    db: &DatabaseConnection,
    caller: &Caller,
    id: i64,
    patch: MonthlyOverviewPatch,
) -> Result<monthly_overview::Model> {
    let user_id = caller.require()?;
    let existing = find_owned::<MonthlyOverview, _>(db, user_id, RESOURCE, id).await?;

    let name = patch
        .name
        .as_deref()
        .map(|n| validation::required_text(n, "name"))
        .transpose()?;
    let start_date = patch.start_date.unwrap_or(existing.start_date);
    let end_date = patch.end_date.unwrap_or(existing.end_date);
    validation::date_range_order(start_date, Some(end_date))?;

    let mut active_model: monthly_overview::ActiveModel = existing.into();
    if let Some(name) = name {
        active_model.name = Set(name);
    }
    active_model.start_date = Set(start_date);
    active_model.end_date = Set(end_date);
    active_model.updated_at = Set(Utc::now());

    let updated = active_model
        .update(db)
        .await
        .context("Failed to update monthly overview")?;
    info!("Updated monthly overview '{}' (ID: {})", updated.name, updated.id);
    Ok(updated)
}

/// Deletes a month and every row scoped to it in one transaction.
///
/// Goals that lose linked expenses are recalculated afterwards. Balance moved
/// into goals by the month's contributions stays with the goals.
#[instrument(skip(db))]
pub async fn delete_monthly_overview(db: &DatabaseConnection, caller: &Caller, id: i64) -> Result<()> {
    let user_id = caller.require()?;
    let existing = find_owned::<MonthlyOverview, _>(db, user_id, RESOURCE, id).await?;

    let budget_ids: Vec<i64> = Budget::find()
        .filter(budget_entity::Column::MonthlyOverviewId.eq(id))
        .all(db)
        .await?
        .into_iter()
        .map(|b| b.id)
        .collect();
    let affected_goals: BTreeSet<i64> = Expense::find()
        .filter(expense::Column::BudgetId.is_in(budget_ids.clone()))
        .all(db)
        .await?
        .into_iter()
        .filter_map(|e| e.financial_goal_id)
        .collect();

    let txn = db.begin().await?;
    Expense::delete_many()
        .filter(expense::Column::BudgetId.is_in(budget_ids))
        .exec(&txn)
        .await
        .context("Failed to delete month expenses")?;
    Budget::delete_many()
        .filter(budget_entity::Column::MonthlyOverviewId.eq(id))
        .exec(&txn)
        .await
        .context("Failed to delete month budgets")?;
    IncomeSource::delete_many()
        .filter(income_source::Column::MonthlyOverviewId.eq(id))
        .exec(&txn)
        .await
        .context("Failed to delete month incomes")?;
    GoalContribution::delete_many()
        .filter(goal_contribution::Column::MonthlyOverviewId.eq(id))
        .exec(&txn)
        .await
        .context("Failed to delete month contributions")?;
    GoalDrawdown::delete_many()
        .filter(goal_drawdown::Column::MonthlyOverviewId.eq(id))
        .exec(&txn)
        .await
        .context("Failed to delete month drawdowns")?;
    Transfer::delete_many()
        .filter(transfer::Column::MonthlyOverviewId.eq(id))
        .exec(&txn)
        .await
        .context("Failed to delete month transfers")?;
    existing
        .delete(&txn)
        .await
        .context("Failed to delete monthly overview")?;
    txn.commit().await?;

    info!("Deleted monthly overview {}", id);

    for goal_id in affected_goals {
        goal::recalculate_best_effort(db, goal_id).await;
    }
    Ok(())
}

/// Month-level totals, computed fresh.
pub async fn get_monthly_summary(
    db: &DatabaseConnection,
    caller: &Caller,
    id: i64,
) -> Result<MonthlyOverviewSummary> {
    let user_id = caller.require()?;
    let overview = find_owned::<MonthlyOverview, _>(db, user_id, RESOURCE, id).await?;
    summary::monthly_summary(db, overview).await
}

/// Income left after budgets, subscriptions and goal contributions.
pub async fn get_available_income(
    db: &DatabaseConnection,
    caller: &Caller,
    id: i64,
) -> Result<Decimal> {
    Ok(get_monthly_summary(db, caller, id).await?.available_income)
}
