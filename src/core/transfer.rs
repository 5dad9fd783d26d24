//! Transfer business logic - Moving allocation between budgets and goals.
//!
//! Three kinds of movement exist:
//! - `budget_to_budget` shifts allocation between two budgets of one month
//! - `goal_to_budget` funds a budget from a goal's balance
//! - `goal_drawdown` funds the month's "DrawDown" budget from a goal,
//!   creating that budget on first use
//!
//! The source never goes negative. Each transfer's row and balance changes are
//! written in one database transaction; deleting a transfer reverses it.

use crate::{
    core::{
        access::{Caller, find_owned},
        budget, goal, summary, validation,
    },
    entities::{
        Budget, FinancialGoal, MonthlyOverview, Transfer, TransferType, budget as budget_entity,
        monthly_overview, transfer,
    },
    errors::{Error, Result, StoreContext},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, DatabaseTransaction, QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument, warn};

const RESOURCE: &str = "transfer";

/// Name of the budget that receives `goal_drawdown` transfers.
pub const DRAWDOWN_BUDGET: &str = "DrawDown";
const DRAWDOWN_DESCRIPTION: &str = "Money drawn down from financial goals";

/// Input for [`create_transfer`].
#[derive(Debug, Clone)]
pub struct NewTransfer {
    pub monthly_overview_id: i64,
    pub transfer_type: TransferType,
    pub amount: Decimal,
    pub date: NaiveDate,
    pub from_budget_id: Option<i64>,
    /// Ignored for `goal_drawdown`, which always targets the "DrawDown" budget
    pub to_budget_id: Option<i64>,
    pub from_goal_id: Option<i64>,
    pub description: Option<String>,
}

fn required_id(id: Option<i64>, field: &'static str, kind: TransferType) -> Result<i64> {
    id.ok_or_else(|| Error::validation(format!("A {kind:?} transfer needs {field}"), field))
}

/// Loads a budget the caller owns and checks it belongs to `month`.
async fn budget_in_month<C>(
    db: &C,
    user_id: &str,
    id: i64,
    month: &monthly_overview::Model,
    field: &'static str,
) -> Result<budget_entity::Model>
where
    C: ConnectionTrait,
{
    let row = find_owned::<Budget, _>(db, user_id, budget::RESOURCE, id).await?;
    if row.monthly_overview_id != month.id {
        return Err(Error::validation(
            format!("Budget '{}' does not belong to {}", row.name, month.name),
            field,
        ));
    }
    Ok(row)
}

/// Checks that `source` has at least `amount` left to give away.
async fn ensure_budget_can_give<C>(db: &C, source: &budget_entity::Model, amount: Decimal) -> Result<()>
where
    C: ConnectionTrait,
{
    let source_summary = summary::budget_summary(db, source.clone()).await?;
    if source_summary.amount_left < amount {
        warn!(
            "Rejected transfer of {} from budget '{}' with {} left",
            amount, source.name, source_summary.amount_left
        );
        return Err(Error::validation(
            format!(
                "Transferring €{amount:.2} exceeds what is left in '{}' (available: €{:.2})",
                source.name, source_summary.amount_left
            ),
            "amount",
        ));
    }
    Ok(())
}

async fn insert_row(
    txn: &DatabaseTransaction,
    user_id: &str,
    new: &NewTransfer,
    from_budget_id: Option<i64>,
    to_budget_id: i64,
    from_goal_id: Option<i64>,
) -> Result<transfer::Model> {
    transfer::ActiveModel {
        user_id: Set(user_id.to_string()),
        monthly_overview_id: Set(new.monthly_overview_id),
        transfer_type: Set(new.transfer_type),
        amount: Set(new.amount),
        date: Set(new.date),
        from_budget_id: Set(from_budget_id),
        to_budget_id: Set(Some(to_budget_id)),
        from_goal_id: Set(from_goal_id),
        description: Set(new.description.clone()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(txn)
    .await
    .context("Failed to create transfer")
}

/// Moves money between ledger locations.
///
/// The date is checked against the month before any balance is looked at.
#[instrument(skip(db))]
pub async fn create_transfer(
    db: &DatabaseConnection,
    caller: &Caller,
    new: NewTransfer,
) -> Result<transfer::Model> {
    let user_id = caller.require()?;
    validation::positive_amount(new.amount, "amount")?;
    let month =
        find_owned::<MonthlyOverview, _>(db, user_id, "monthly overview", new.monthly_overview_id)
            .await?;
    validation::date_in_range(new.date, month.start_date, month.end_date, "Transfer")?;

    let created = match new.transfer_type {
        TransferType::BudgetToBudget => {
            let from_id = required_id(new.from_budget_id, "from_budget_id", new.transfer_type)?;
            let to_id = required_id(new.to_budget_id, "to_budget_id", new.transfer_type)?;
            if from_id == to_id {
                return Err(Error::validation(
                    "Cannot transfer a budget to itself",
                    "to_budget_id",
                ));
            }
            let source = budget_in_month(db, user_id, from_id, &month, "from_budget_id").await?;
            let destination = budget_in_month(db, user_id, to_id, &month, "to_budget_id").await?;
            ensure_budget_can_give(db, &source, new.amount).await?;

            let txn = db.begin().await?;
            let row = insert_row(&txn, user_id, &new, Some(source.id), destination.id, None).await?;
            budget::shift_effective_amount(&txn, &source, -new.amount).await?;
            budget::shift_effective_amount(&txn, &destination, new.amount).await?;
            txn.commit().await?;
            row
        }
        TransferType::GoalToBudget | TransferType::GoalDrawdown => {
            let goal_id = required_id(new.from_goal_id, "from_goal_id", new.transfer_type)?;
            find_owned::<FinancialGoal, _>(db, user_id, goal::RESOURCE, goal_id).await?;
            let destination = if new.transfer_type == TransferType::GoalToBudget {
                let to_id = required_id(new.to_budget_id, "to_budget_id", new.transfer_type)?;
                Some(budget_in_month(db, user_id, to_id, &month, "to_budget_id").await?)
            } else {
                None
            };

            let source = goal::recalculate(db, goal_id).await?;
            validation::available_goal_balance_check(
                &source.name,
                source.current_amount,
                Decimal::ZERO,
                new.amount,
            )?;

            let txn = db.begin().await?;
            let destination = match destination {
                Some(destination) => destination,
                None => {
                    budget::find_or_create_named(
                        &txn,
                        user_id,
                        month.id,
                        DRAWDOWN_BUDGET,
                        DRAWDOWN_DESCRIPTION,
                    )
                    .await?
                }
            };
            let row = insert_row(&txn, user_id, &new, None, destination.id, Some(goal_id)).await?;
            goal::adjust_balance(&txn, goal_id, -new.amount).await?;
            budget::shift_effective_amount(&txn, &destination, new.amount).await?;
            txn.commit().await?;
            row
        }
    };

    info!(
        "Created {:?} transfer {} of {} in month {}",
        created.transfer_type, created.id, created.amount, created.monthly_overview_id
    );
    Ok(created)
}

/// Retrieves a transfer by ID.
pub async fn get_transfer(
    db: &DatabaseConnection,
    caller: &Caller,
    id: i64,
) -> Result<transfer::Model> {
    let user_id = caller.require()?;
    find_owned::<Transfer, _>(db, user_id, RESOURCE, id).await
}

/// Lists a month's transfers by date.
pub async fn get_transfers(
    db: &DatabaseConnection,
    caller: &Caller,
    monthly_overview_id: i64,
) -> Result<Vec<transfer::Model>> {
    let user_id = caller.require()?;
    find_owned::<MonthlyOverview, _>(db, user_id, "monthly overview", monthly_overview_id).await?;
    Transfer::find()
        .filter(transfer::Column::UserId.eq(user_id))
        .filter(transfer::Column::MonthlyOverviewId.eq(monthly_overview_id))
        .order_by_asc(transfer::Column::Date)
        .order_by_asc(transfer::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Deletes a transfer and reverses its movement.
///
/// The destination budget must still have the transferred amount left,
/// otherwise [`Error::Overspending`] is returned and nothing changes. Sides
/// that no longer exist are skipped.
#[instrument(skip(db))]
pub async fn delete_transfer(db: &DatabaseConnection, caller: &Caller, id: i64) -> Result<()> {
    let user_id = caller.require()?;
    let existing = find_owned::<Transfer, _>(db, user_id, RESOURCE, id).await?;
    let amount = existing.amount;

    let destination = match existing.to_budget_id {
        Some(to_id) => Budget::find_by_id(to_id).one(db).await?,
        None => None,
    };
    if let Some(destination) = &destination {
        let spent = summary::amount_spent(db, destination.id).await?;
        validation::no_overspend(&destination.name, destination.effective_amount(), spent, amount)?;
    }
    let source_budget = match existing.from_budget_id {
        Some(from_id) => Budget::find_by_id(from_id).one(db).await?,
        None => None,
    };
    let source_goal = match existing.from_goal_id {
        Some(goal_id) => FinancialGoal::find_by_id(goal_id).one(db).await?,
        None => None,
    };

    let txn = db.begin().await?;
    if let Some(destination) = &destination {
        budget::shift_effective_amount(&txn, destination, -amount).await?;
    }
    if let Some(source) = &source_budget {
        budget::shift_effective_amount(&txn, source, amount).await?;
    }
    if let Some(source) = &source_goal {
        goal::adjust_balance(&txn, source.id, amount).await?;
    }
    existing
        .delete(&txn)
        .await
        .context("Failed to delete transfer")?;
    txn.commit().await?;

    info!("Deleted transfer {} and reversed {}", id, amount);
    Ok(())
}
