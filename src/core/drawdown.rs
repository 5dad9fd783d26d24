//! Goal drawdown business logic - Withdrawing money from a goal.
//!
//! Mirrors contributions with the goal's current balance as the ceiling.

use crate::{
    core::{
        access::{Caller, find_owned},
        goal, validation,
    },
    entities::{FinancialGoal, GoalDrawdown, MonthlyOverview, goal_drawdown},
    errors::{Result, StoreContext},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument, warn};

const RESOURCE: &str = "goal drawdown";

/// Input for [`create_drawdown`].
#[derive(Debug, Clone)]
pub struct NewDrawdown {
    pub financial_goal_id: i64,
    pub monthly_overview_id: i64,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub note: Option<String>,
}

/// Fields changed by [`update_drawdown`].
#[derive(Debug, Clone, Default)]
pub struct DrawdownPatch {
    pub amount: Option<Decimal>,
    pub date: Option<NaiveDate>,
    pub note: Option<Option<String>>,
}

/// Takes money out of a goal, up to its current balance.
#[instrument(skip(db))]
pub async fn create_drawdown(
    db: &DatabaseConnection,
    caller: &Caller,
    new: NewDrawdown,
) -> Result<goal_drawdown::Model> {
    let user_id = caller.require()?;
    validation::positive_amount(new.amount, "amount")?;
    find_owned::<FinancialGoal, _>(db, user_id, goal::RESOURCE, new.financial_goal_id).await?;
    let month =
        find_owned::<MonthlyOverview, _>(db, user_id, "monthly overview", new.monthly_overview_id)
            .await?;
    validation::date_in_range(new.date, month.start_date, month.end_date, "Drawdown")?;

    let goal_row = goal::recalculate(db, new.financial_goal_id).await?;
    validation::available_goal_balance_check(
        &goal_row.name,
        goal_row.current_amount,
        Decimal::ZERO,
        new.amount,
    )
    .inspect_err(|_| {
        warn!(
            "Rejected drawdown of {} from goal '{}' holding {}",
            new.amount, goal_row.name, goal_row.current_amount
        );
    })?;

    let now = Utc::now();
    let txn = db.begin().await?;
    let created = goal_drawdown::ActiveModel {
        user_id: Set(user_id.to_string()),
        financial_goal_id: Set(goal_row.id),
        monthly_overview_id: Set(month.id),
        amount: Set(new.amount),
        date: Set(new.date),
        note: Set(new.note),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .context("Failed to create drawdown")?;
    let goal_row = goal::adjust_balance(&txn, created.financial_goal_id, -created.amount).await?;
    txn.commit().await?;

    info!(
        "Drew {} from goal '{}' (now {})",
        created.amount, goal_row.name, goal_row.current_amount
    );
    Ok(created)
}

/// Retrieves a drawdown by ID.
pub async fn get_drawdown(
    db: &DatabaseConnection,
    caller: &Caller,
    id: i64,
) -> Result<goal_drawdown::Model> {
    let user_id = caller.require()?;
    find_owned::<GoalDrawdown, _>(db, user_id, RESOURCE, id).await
}

/// Lists a month's drawdowns by date.
pub async fn get_drawdowns_for_month(
    db: &DatabaseConnection,
    caller: &Caller,
    monthly_overview_id: i64,
) -> Result<Vec<goal_drawdown::Model>> {
    let user_id = caller.require()?;
    find_owned::<MonthlyOverview, _>(db, user_id, "monthly overview", monthly_overview_id).await?;
    GoalDrawdown::find()
        .filter(goal_drawdown::Column::UserId.eq(user_id))
        .filter(goal_drawdown::Column::MonthlyOverviewId.eq(monthly_overview_id))
        .order_by_asc(goal_drawdown::Column::Date)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Lists a goal's drawdowns by date.
pub async fn get_drawdowns_for_goal(
    db: &DatabaseConnection,
    caller: &Caller,
    goal_id: i64,
) -> Result<Vec<goal_drawdown::Model>> {
    let user_id = caller.require()?;
    find_owned::<FinancialGoal, _>(db, user_id, goal::RESOURCE, goal_id).await?;
    GoalDrawdown::find()
        .filter(goal_drawdown::Column::UserId.eq(user_id))
        .filter(goal_drawdown::Column::FinancialGoalId.eq(goal_id))
        .order_by_asc(goal_drawdown::Column::Date)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Applies a patch to a drawdown. The existing amount is added back to the
/// goal balance before the new amount is checked.
#[instrument(skip(db))]
pub async fn update_drawdown(
    db: &DatabaseConnection,
    caller: &Caller,
    id: i64,
    patch: DrawdownPatch,
) -> Result<goal_drawdown::Model> {
    let user_id = caller.require()?;
    let existing = find_owned::<GoalDrawdown, _>(db, user_id, RESOURCE, id).await?;
    let month = find_owned::<MonthlyOverview, _>(
        db,
        user_id,
        "monthly overview",
        existing.monthly_overview_id,
    )
    .await?;

    let amount = patch.amount.unwrap_or(existing.amount);
    validation::positive_amount(amount, "amount")?;
    let date = patch.date.unwrap_or(existing.date);
    validation::date_in_range(date, month.start_date, month.end_date, "Drawdown")?;

    let goal_row = goal::recalculate(db, existing.financial_goal_id).await?;
    validation::available_goal_balance_check(
        &goal_row.name,
        goal_row.current_amount,
        existing.amount,
        amount,
    )?;

    let delta = amount - existing.amount;
    let mut active_model: goal_drawdown::ActiveModel = existing.into();
    active_model.amount = Set(amount);
    active_model.date = Set(date);
    if let Some(note) = patch.note {
        active_model.note = Set(note);
    }
    active_model.updated_at = Set(Utc::now());

    let txn = db.begin().await?;
    let updated = active_model
        .update(&txn)
        .await
        .context("Failed to update drawdown")?;
    goal::adjust_balance(&txn, goal_row.id, -delta).await?;
    txn.commit().await?;

    info!("Updated drawdown {} to {}", updated.id, updated.amount);
    Ok(updated)
}

/// Deletes a drawdown and returns its amount to the goal.
#[instrument(skip(db))]
pub async fn delete_drawdown(db: &DatabaseConnection, caller: &Caller, id: i64) -> Result<()> {
    let user_id = caller.require()?;
    let existing = find_owned::<GoalDrawdown, _>(db, user_id, RESOURCE, id).await?;
    let goal_id = existing.financial_goal_id;
    let amount = existing.amount;

    let txn = db.begin().await?;
    existing
        .delete(&txn)
        .await
        .context("Failed to delete drawdown")?;
    goal::adjust_balance(&txn, goal_id, amount).await?;
    txn.commit().await?;

    info!("Deleted drawdown {} ({} returned to goal {})", id, amount, goal_id);
    Ok(())
}
