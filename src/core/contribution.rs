//! Goal contribution business logic - Funding a goal from a month's income.
//!
//! A contribution is bounded by the month's available income. The row and
//! the goal balance change are written in one database transaction.

use crate::{
    core::{
        access::{Caller, find_owned},
        goal, summary, validation,
    },
    entities::{FinancialGoal, GoalContribution, MonthlyOverview, goal_contribution},
    errors::{Result, StoreContext},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument, warn};

const RESOURCE: &str = "goal contribution";

/// Input for [`create_contribution`].
#[derive(Debug, Clone)]
pub struct NewContribution {
    pub financial_goal_id: i64,
    pub monthly_overview_id: i64,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub note: Option<String>,
}

/// Fields changed by [`update_contribution`].
#[derive(Debug, Clone, Default)]
pub struct ContributionPatch {
    pub amount: Option<Decimal>,
    pub date: Option<NaiveDate>,
    pub note: Option<Option<String>>,
}

/// Checks that the goal still holds `amount`, so taking a contribution back
/// cannot leave it negative.
async fn ensure_goal_can_return(db: &DatabaseConnection, goal_id: i64, amount: Decimal) -> Result<()> {
    let goal_row = goal::recalculate(db, goal_id).await?;
    validation::available_goal_balance_check(
        &goal_row.name,
        goal_row.current_amount,
        Decimal::ZERO,
        amount,
    )
    .inspect_err(|_| {
        warn!(
            "Rejected removing {} from goal '{}' holding {}",
            amount, goal_row.name, goal_row.current_amount
        );
    })
}

/// Moves money from the month into a goal.
#[instrument(skip(db))]
pub async fn create_contribution(
    db: &DatabaseConnection,
    caller: &Caller,
    new: NewContribution,
) -> Result<goal_contribution::Model> {
    let user_id = caller.require()?;
    validation::positive_amount(new.amount, "amount")?;
    let goal_row =
        find_owned::<FinancialGoal, _>(db, user_id, goal::RESOURCE, new.financial_goal_id).await?;
    let month =
        find_owned::<MonthlyOverview, _>(db, user_id, "monthly overview", new.monthly_overview_id)
            .await?;
    validation::date_in_range(new.date, month.start_date, month.end_date, "Contribution")?;

    let totals = summary::monthly_summary(db, month).await?;
    validation::available_income_check(totals.available_income, Decimal::ZERO, new.amount)
        .inspect_err(|_| {
            warn!(
                "Rejected contribution of {} to goal {}: {} available",
                new.amount, goal_row.id, totals.available_income
            );
        })?;

    let now = Utc::now();
    let txn = db.begin().await?;
    let created = goal_contribution::ActiveModel {
        user_id: Set(user_id.to_string()),
        financial_goal_id: Set(goal_row.id),
        monthly_overview_id: Set(new.monthly_overview_id),
        amount: Set(new.amount),
        date: Set(new.date),
        note: Set(new.note),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .context("Failed to create contribution")?;
    let goal_row = goal::adjust_balance(&txn, created.financial_goal_id, created.amount).await?;
    txn.commit().await?;

    info!(
        "Contributed {} to goal '{}' (now {})",
        created.amount, goal_row.name, goal_row.current_amount
    );
    Ok(created)
}

/// Retrieves a contribution by ID.
pub async fn get_contribution(
    db: &DatabaseConnection,
    caller: &Caller,
    id: i64,
) -> Result<goal_contribution::Model> {
    let user_id = caller.require()?;
    find_owned::<GoalContribution, _>(db, user_id, RESOURCE, id).await
}

/// Lists a month's contributions by date.
pub async fn get_contributions_for_month(
    db: &DatabaseConnection,
    caller: &Caller,
    monthly_overview_id: i64,
) -> Result<Vec<goal_contribution::Model>> {
    let user_id = caller.require()?;
    find_owned::<MonthlyOverview, _>(db, user_id, "monthly overview", monthly_overview_id).await?;
    GoalContribution::find()
        .filter(goal_contribution::Column::UserId.eq(user_id))
        .filter(goal_contribution::Column::MonthlyOverviewId.eq(monthly_overview_id))
        .order_by_asc(goal_contribution::Column::Date)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Lists a goal's contributions by date.
pub async fn get_contributions_for_goal(
    db: &DatabaseConnection,
    caller: &Caller,
    goal_id: i64,
) -> Result<Vec<goal_contribution::Model>> {
    let user_id = caller.require()?;
    find_owned::<FinancialGoal, _>(db, user_id, goal::RESOURCE, goal_id).await?;
    GoalContribution::find()
        .filter(goal_contribution::Column::UserId.eq(user_id))
        .filter(goal_contribution::Column::FinancialGoalId.eq(goal_id))
        .order_by_asc(goal_contribution::Column::Date)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Applies a patch to a contribution.
///
/// Only the increase over the existing amount is checked against available
/// income. A decrease must still be covered by the goal's balance.
#[instrument(skip(db))]
pub async fn update_contribution(
    db: &DatabaseConnection,
    caller: &Caller,
    id: i64,
    patch: ContributionPatch,
) -> Result<goal_contribution::Model> {
    let user_id = caller.require()?;
    let existing = find_owned::<GoalContribution, _>(db, user_id, RESOURCE, id).await?;
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
    validation::date_in_range(date, month.start_date, month.end_date, "Contribution")?;

    let totals = summary::monthly_summary(db, month).await?;
    validation::available_income_check(totals.available_income, existing.amount, amount)?;

    let delta = amount - existing.amount;
    let goal_id = existing.financial_goal_id;
    if delta < Decimal::ZERO {
        ensure_goal_can_return(db, goal_id, -delta).await?;
    }

    let mut active_model: goal_contribution::ActiveModel = existing.into();
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
        .context("Failed to update contribution")?;
    goal::adjust_balance(&txn, goal_id, delta).await?;
    txn.commit().await?;

    info!("Updated contribution {} to {}", updated.id, updated.amount);
    Ok(updated)
}

/// Deletes a contribution and takes its amount back out of the goal.
///
/// Rejected when the goal no longer holds the amount, for example after a
/// drawdown spent it.
#[instrument(skip(db))]
pub async fn delete_contribution(db: &DatabaseConnection, caller: &Caller, id: i64) -> Result<()> {
    let user_id = caller.require()?;
    let existing = find_owned::<GoalContribution, _>(db, user_id, RESOURCE, id).await?;
    let goal_id = existing.financial_goal_id;
    let amount = existing.amount;
    ensure_goal_can_return(db, goal_id, amount).await?;

    let txn = db.begin().await?;
    existing
        .delete(&txn)
        .await
        .context("Failed to delete contribution")?;
    goal::adjust_balance(&txn, goal_id, -amount).await?;
    txn.commit().await?;

    info!("Deleted contribution {} ({} removed from goal {})", id, amount, goal_id);
    Ok(())
}
