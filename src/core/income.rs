//! Income business logic - Money coming into a month.
//!
//! Income flagged with `tithe_deduction` funds the month's "Tithe" and
//! "Offering" budgets. That rebalancing, like the default budget population
//! on first income, is secondary: failures are logged and the income write
//! still succeeds.

use crate::{
    core::{
        access::{Caller, find_owned},
        budget, validation,
    },
    entities::{IncomeSource, MonthlyOverview, income_source},
    errors::{Result, StoreContext},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, QueryOrder, Set, prelude::*};
use tracing::{debug, error, info, instrument};

const RESOURCE: &str = "income source";

/// Budgets funded from tithed income: name, share of the income, and the
/// description used when the budget has to be created from scratch.
const TITHE_BUDGETS: [(&str, Decimal, &str); 2] = [
    ("Tithe", Decimal::from_parts(10, 0, 0, false, 2), "Tithe (10% of income)"),
    ("Offering", Decimal::from_parts(5, 0, 0, false, 2), "Offering (5% of income)"),
];

/// Input for [`create_income`].
#[derive(Debug, Clone)]
pub struct NewIncome {
    pub monthly_overview_id: i64,
    pub amount: Decimal,
    pub source: String,
    pub person: Option<String>,
    pub date_paid: NaiveDate,
    pub tithe_deduction: bool,
}

/// Fields changed by [`update_income`].
#[derive(Debug, Clone, Default)]
pub struct IncomePatch {
    pub amount: Option<Decimal>,
    pub source: Option<String>,
    pub person: Option<Option<String>>,
    pub date_paid: Option<NaiveDate>,
    pub tithe_deduction: Option<bool>,
}

/// Part of an income that counts towards the tithe budgets.
fn tithed(amount: Decimal, tithe_deduction: bool) -> Decimal {
    if tithe_deduction { amount } else { Decimal::ZERO }
}

/// Moves the tithe budgets by their share of `income_delta`, never below zero.
///
/// Increases create a missing budget; decreases only touch budgets that
/// still exist.
async fn rebalance_tithe<C>(
    db: &C,
    user_id: &str,
    monthly_overview_id: i64,
    income_delta: Decimal,
) -> Result<()>
where
    C: ConnectionTrait,
{
    for (name, rate, description) in TITHE_BUDGETS {
        let target = if income_delta > Decimal::ZERO {
            budget::find_or_create_named(db, user_id, monthly_overview_id, name, description)
                .await?
        } else {
            let Some(found) = budget::find_named(db, user_id, monthly_overview_id, name).await?
            else {
                debug!("No '{}' budget in month {}; nothing to decrease", name, monthly_overview_id);
                continue;
            };
            found
        };
        let share = (income_delta * rate).round_dp(2);
        let new_amount = (target.budget_amount + share).max(Decimal::ZERO);

        let mut active_model: crate::entities::budget::ActiveModel = target.into();
        active_model.budget_amount = Set(new_amount);
        active_model.updated_at = Set(Utc::now());
        let updated = active_model
            .update(db)
            .await
            .context(format!("Failed to rebalance '{name}' budget"))?;
        info!(
            "Moved '{}' budget by {} to {} in month {}",
            name, share, updated.budget_amount, monthly_overview_id
        );
    }
    Ok(())
}

async fn rebalance_tithe_best_effort<C>(
    db: &C,
    user_id: &str,
    monthly_overview_id: i64,
    income_delta: Decimal,
) where
    C: ConnectionTrait,
{
    if income_delta.is_zero() {
        return;
    }
    if let Err(e) = rebalance_tithe(db, user_id, monthly_overview_id, income_delta).await {
        error!(
            "Failed to rebalance tithe budgets for month {}: {}",
            monthly_overview_id, e
        );
    }
}

/// Records income for a month.
///
/// The first income of a month populates its default budgets. Tithed income
/// then raises "Tithe" by 10% and "Offering" by 5% of the amount, creating
/// either budget when missing.
#[instrument(skip(db))]
pub async fn create_income(
    db: &DatabaseConnection,
    caller: &Caller,
    new: NewIncome,
) -> Result<income_source::Model> {
    let user_id = caller.require()?;
    validation::positive_amount(new.amount, "amount")?;
    let source = validation::required_text(&new.source, "source")?;
    let month =
        find_owned::<MonthlyOverview, _>(db, user_id, "monthly overview", new.monthly_overview_id)
            .await?;

    let model = income_source::ActiveModel {
        user_id: Set(user_id.to_string()),
        monthly_overview_id: Set(month.id),
        amount: Set(new.amount),
        source: Set(source),
        person: Set(new.person),
        date_paid: Set(new.date_paid),
        tithe_deduction: Set(new.tithe_deduction),
        created_at: Set(Utc::now()),
        ..Default::default()
    };
    let created = model.insert(db).await.context("Failed to create income")?;
    info!(
        "Created income {} of {} from '{}' in month {}",
        created.id, created.amount, created.source, month.id
    );

    if let Err(e) = budget::populate_default_budgets(db, user_id, month.id).await {
        error!("Failed to create default budgets for month {}: {}", month.id, e);
    }
    rebalance_tithe_best_effort(
        db,
        user_id,
        month.id,
        tithed(created.amount, created.tithe_deduction),
    )
    .await;

    Ok(created)
}

/// Retrieves an income by ID.
pub async fn get_income(
    db: &DatabaseConnection,
    caller: &Caller,
    id: i64,
) -> Result<income_source::Model> {
    let user_id = caller.require()?;
    find_owned::<IncomeSource, _>(db, user_id, RESOURCE, id).await
}

/// Lists a month's income in payment order.
pub async fn get_incomes(
    db: &DatabaseConnection,
    caller: &Caller,
    monthly_overview_id: i64,
) -> Result<Vec<income_source::Model>> {
    let user_id = caller.require()?;
    find_owned::<MonthlyOverview, _>(db, user_id, "monthly overview", monthly_overview_id).await?;
    IncomeSource::find()
        .filter(income_source::Column::UserId.eq(user_id))
        .filter(income_source::Column::MonthlyOverviewId.eq(monthly_overview_id))
        .order_by_asc(income_source::Column::DatePaid)
        .order_by_asc(income_source::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Applies a patch to an income.
///
/// When the amount or the tithe flag changes, the tithe budgets move by the
/// difference in their share.
#[instrument(skip(db))]
pub async fn update_income(
    db: &DatabaseConnection,
    caller: &Caller,
    id: i64,
    patch: IncomePatch,
) -> Result<income_source::Model> {
    let user_id = caller.require()?;
    let existing = find_owned::<IncomeSource, _>(db, user_id, RESOURCE, id).await?;

    if let Some(amount) = patch.amount {
        validation::positive_amount(amount, "amount")?;
    }
    let source = patch
        .source
        .as_deref()
        .map(|s| validation::required_text(s, "source"))
        .transpose()?;

    let before = tithed(existing.amount, existing.tithe_deduction);
    let month_id = existing.monthly_overview_id;

    let mut active_model: income_source::ActiveModel = existing.into();
    if let Some(amount) = patch.amount {
        active_model.amount = Set(amount);
    }
    if let Some(source) = source {
        active_model.source = Set(source);
    }
    if let Some(person) = patch.person {
        active_model.person = Set(person);
    }
    if let Some(date_paid) = patch.date_paid {
        active_model.date_paid = Set(date_paid);
    }
    if let Some(tithe_deduction) = patch.tithe_deduction {
        active_model.tithe_deduction = Set(tithe_deduction);
    }

    let updated = active_model.update(db).await.context("Failed to update income")?;
    info!("Updated income {} to {}", updated.id, updated.amount);

    let after = tithed(updated.amount, updated.tithe_deduction);
    rebalance_tithe_best_effort(db, user_id, month_id, after - before).await;
    Ok(updated)
}

/// Deletes an income and takes its share back out of the tithe budgets,
/// flooring each at zero.
#[instrument(skip(db))]
pub async fn delete_income(db: &DatabaseConnection, caller: &Caller, id: i64) -> Result<()> {
    let user_id = caller.require()?;
    let existing = find_owned::<IncomeSource, _>(db, user_id, RESOURCE, id).await?;
    let month_id = existing.monthly_overview_id;
    let share = tithed(existing.amount, existing.tithe_deduction);

    existing.delete(db).await.context("Failed to delete income")?;
    info!("Deleted income {}", id);

    rebalance_tithe_best_effort(db, user_id, month_id, -share).await;
    Ok(())
}
