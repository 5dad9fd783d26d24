//! Financial goal business logic - Savings targets and their sub-goals.
//!
//! A goal's balance is `current_amount = base_amount + Σ linked expenses`.
//! Expenses change the sum; contributions, drawdowns and goal-funded
//! transfers change `base_amount`. Every path that touches either side
//! rewrites `current_amount` so the identity holds.

use crate::{
    core::{
        access::{Caller, find_owned},
        validation,
    },
    entities::{
        Expense, FinancialGoal, FinancialSubGoal, GoalContribution, GoalDrawdown, GoalStatus,
        SavingsBucket, Transfer, expense, financial_goal, financial_sub_goal, goal_contribution,
        goal_drawdown, savings_bucket, transfer,
    },
    errors::{Error, Result, StoreContext},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ConnectionTrait, PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use tracing::{debug, error, info, instrument};

pub(crate) const RESOURCE: &str = "financial goal";
const SUB_GOAL: &str = "financial sub-goal";

/// Input for [`create_goal`].
#[derive(Debug, Clone)]
pub struct NewGoal {
    pub name: String,
    pub description: Option<String>,
    pub target_amount: Decimal,
    /// Opening balance, stored as both `current_amount` and `base_amount`
    pub current_amount: Decimal,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
}

/// Fields changed by [`update_goal`]. Clearable fields use `Some(None)`.
#[derive(Debug, Clone, Default)]
pub struct GoalPatch {
    pub name: Option<String>,
    pub description: Option<Option<String>>,
    pub target_amount: Option<Decimal>,
    pub current_amount: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<Option<NaiveDate>>,
    pub status: Option<GoalStatus>,
}

/// Input for [`create_sub_goal`].
#[derive(Debug, Clone, Default)]
pub struct NewSubGoal {
    pub financial_goal_id: i64,
    pub name: String,
    pub progress: i32,
    pub estimated_cost: Option<Decimal>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

/// Fields changed by [`update_sub_goal`].
#[derive(Debug, Clone, Default)]
pub struct SubGoalPatch {
    pub name: Option<String>,
    pub progress: Option<i32>,
    pub estimated_cost: Option<Option<Decimal>>,
    pub start_date: Option<Option<NaiveDate>>,
    pub end_date: Option<Option<NaiveDate>>,
}

/// Share of the target reached, in percent, capped at 100.
#[must_use]
pub fn progress_percent(goal: &financial_goal::Model) -> Decimal {
    if goal.target_amount <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    let percent = (goal.current_amount / goal.target_amount * Decimal::ONE_HUNDRED).round_dp(2);
    percent.clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
}

fn sub_goal_dates(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<()> {
    match start {
        Some(start) => validation::date_range_order(start, end),
        None => Ok(()),
    }
}

async fn linked_expense_sum<C>(db: &C, goal_id: i64) -> Result<Decimal>
where
    C: ConnectionTrait,
{
    let expenses = Expense::find()
        .filter(expense::Column::FinancialGoalId.eq(goal_id))
        .all(db)
        .await?;
    Ok(expenses.iter().map(|e| e.amount).sum())
}

/// Base amount for rows written before `base_amount` was tracked.
fn legacy_base(current_amount: Decimal, linked_sum: Decimal) -> Decimal {
    (current_amount - linked_sum).max(Decimal::ZERO)
}

async fn store_balance<C>(
    db: &C,
    goal: financial_goal::Model,
    base_amount: Decimal,
    linked_sum: Decimal,
) -> Result<financial_goal::Model>
where
    C: ConnectionTrait,
{
    let current_amount = base_amount + linked_sum;
    if goal.base_amount == Some(base_amount) && goal.current_amount == current_amount {
        return Ok(goal);
    }

    let mut active_model: financial_goal::ActiveModel = goal.into();
    active_model.base_amount = Set(Some(base_amount));
    active_model.current_amount = Set(current_amount);
    active_model.updated_at = Set(Utc::now());
    active_model
        .update(db)
        .await
        .context("Failed to store goal balance")
}

/// Recomputes `current_amount` from `base_amount` and linked expenses.
///
/// Idempotent. A missing `base_amount` is derived once as
/// `max(0, current_amount - Σ linked expenses)` and stored from then on.
pub(crate) async fn recalculate<C>(db: &C, goal_id: i64) -> Result<financial_goal::Model>
where
    C: ConnectionTrait,
{
    let goal = FinancialGoal::find_by_id(goal_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(RESOURCE, goal_id))?;
    let linked_sum = linked_expense_sum(db, goal_id).await?;
    let base_amount = goal
        .base_amount
        .unwrap_or_else(|| legacy_base(goal.current_amount, linked_sum));

    let goal = store_balance(db, goal, base_amount, linked_sum).await?;
    debug!(
        "Recalculated goal {}: base {} + linked {} = {}",
        goal.id, base_amount, linked_sum, goal.current_amount
    );
    Ok(goal)
}

/// [`recalculate`] for secondary updates: failures are logged, not returned.
pub(crate) async fn recalculate_best_effort<C>(db: &C, goal_id: i64)
where
    C: ConnectionTrait,
{
    if let Err(e) = recalculate(db, goal_id).await {
        error!("Failed to recalculate goal {}: {}", goal_id, e);
    }
}

/// Moves a goal's base (and therefore current) balance by `delta`.
pub(crate) async fn adjust_balance<C>(
    db: &C,
    goal_id: i64,
    delta: Decimal,
) -> Result<financial_goal::Model>
where
    C: ConnectionTrait,
{
    let goal = FinancialGoal::find_by_id(goal_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(RESOURCE, goal_id))?;
    let linked_sum = linked_expense_sum(db, goal_id).await?;
    let base_amount = goal
        .base_amount
        .unwrap_or_else(|| legacy_base(goal.current_amount, linked_sum))
        + delta;

    store_balance(db, goal, base_amount, linked_sum).await
}

/// Creates a goal with its opening balance.
#[instrument(skip(db))]
pub async fn create_goal(
    db: &DatabaseConnection,
    caller: &Caller,
    new: NewGoal,
) -> Result<financial_goal::Model> {
    let user_id = caller.require()?;
    let name = validation::required_text(&new.name, "name")?;
    validation::positive_amount(new.target_amount, "target_amount")?;
    validation::non_negative_amount(new.current_amount, "current_amount")?;
    validation::date_range_order(new.start_date, new.end_date)?;

    let now = Utc::now();
    let model = financial_goal::ActiveModel {
        user_id: Set(user_id.to_string()),
        name: Set(name),
        description: Set(new.description),
        target_amount: Set(new.target_amount),
        base_amount: Set(Some(new.current_amount)),
        current_amount: Set(new.current_amount),
        start_date: Set(new.start_date),
        end_date: Set(new.end_date),
        status: Set(GoalStatus::Active),
        has_sub_goals: Set(false),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let created = model.insert(db).await.context("Failed to create goal")?;
    info!(
        "Created goal '{}' (ID: {}) targeting {}",
        created.name, created.id, created.target_amount
    );
    Ok(created)
}

/// Retrieves a goal with a freshly reconciled balance.
pub async fn get_goal(
    db: &DatabaseConnection,
    caller: &Caller,
    id: i64,
) -> Result<financial_goal::Model> {
    let user_id = caller.require()?;
    find_owned::<FinancialGoal, _>(db, user_id, RESOURCE, id).await?;
    recalculate(db, id).await
}

/// Lists the caller's goals ordered by name, each reconciled.
pub async fn get_goals(
    db: &DatabaseConnection,
    caller: &Caller,
) -> Result<Vec<financial_goal::Model>> {
    let user_id = caller.require()?;
    let goals = FinancialGoal::find()
        .filter(financial_goal::Column::UserId.eq(user_id))
        .order_by_asc(financial_goal::Column::Name)
        .all(db)
        .await?;

    let mut reconciled = Vec::with_capacity(goals.len());
    for goal in goals {
        reconciled.push(recalculate(db, goal.id).await?);
    }
    Ok(reconciled)
}

/// Recomputes a goal's balance on request.
#[instrument(skip(db))]
pub async fn recalculate_current_amount(
    db: &DatabaseConnection,
    caller: &Caller,
    id: i64,
) -> Result<financial_goal::Model> {
    let user_id = caller.require()?;
    find_owned::<FinancialGoal, _>(db, user_id, RESOURCE, id).await?;
    recalculate(db, id).await
}

/// Applies a patch to a goal.
///
/// Setting `current_amount` directly rebases the goal:
/// `base_amount = max(0, current_amount - Σ linked expenses)`.
#[instrument(skip(db))]
pub async fn update_goal(
    db: &DatabaseConnection,
    caller: &Caller,
    id: i64,
    patch: GoalPatch,
) -> Result<financial_goal::Model> {
    let user_id = caller.require()?;
    let existing = find_owned::<FinancialGoal, _>(db, user_id, RESOURCE, id).await?;

    let name = patch
        .name
        .as_deref()
        .map(|n| validation::required_text(n, "name"))
        .transpose()?;
    if let Some(target) = patch.target_amount {
        validation::positive_amount(target, "target_amount")?;
    }
    if let Some(current) = patch.current_amount {
        validation::non_negative_amount(current, "current_amount")?;
    }
    let start_date = patch.start_date.unwrap_or(existing.start_date);
    let end_date = patch.end_date.unwrap_or(existing.end_date);
    validation::date_range_order(start_date, end_date)?;

    let mut active_model: financial_goal::ActiveModel = existing.into();
    if let Some(name) = name {
        active_model.name = Set(name);
    }
    if let Some(description) = patch.description {
        active_model.description = Set(description);
    }
    if let Some(target) = patch.target_amount {
        active_model.target_amount = Set(target);
    }
    if let Some(status) = patch.status {
        active_model.status = Set(status);
    }
    if let Some(current) = patch.current_amount {
        let linked_sum = linked_expense_sum(db, id).await?;
        let base = legacy_base(current, linked_sum);
        active_model.base_amount = Set(Some(base));
        active_model.current_amount = Set(base + linked_sum);
    }
    active_model.start_date = Set(start_date);
    active_model.end_date = Set(end_date);
    active_model.updated_at = Set(Utc::now());

    let updated = active_model.update(db).await.context("Failed to update goal")?;
    info!("Updated goal '{}' (ID: {})", updated.name, updated.id);
    Ok(updated)
}

/// Deletes a goal with its sub-goals, contributions and drawdowns.
///
/// Linked expenses, savings buckets and transfers stay and lose the link.
#[instrument(skip(db))]
pub async fn delete_goal(db: &DatabaseConnection, caller: &Caller, id: i64) -> Result<()> {
    let user_id = caller.require()?;
    let existing = find_owned::<FinancialGoal, _>(db, user_id, RESOURCE, id).await?;

    let txn = db.begin().await?;
    Expense::update_many()
        .col_expr(
            expense::Column::FinancialGoalId,
            Expr::value(Option::<i64>::None),
        )
        .filter(expense::Column::FinancialGoalId.eq(id))
        .exec(&txn)
        .await
        .context("Failed to unlink goal expenses")?;
    SavingsBucket::update_many()
        .col_expr(
            savings_bucket::Column::LinkedGoalId,
            Expr::value(Option::<i64>::None),
        )
        .filter(savings_bucket::Column::LinkedGoalId.eq(id))
        .exec(&txn)
        .await
        .context("Failed to unlink savings buckets")?;
    Transfer::update_many()
        .col_expr(transfer::Column::FromGoalId, Expr::value(Option::<i64>::None))
        .filter(transfer::Column::FromGoalId.eq(id))
        .exec(&txn)
        .await
        .context("Failed to unlink goal transfers")?;
    FinancialSubGoal::delete_many()
        .filter(financial_sub_goal::Column::FinancialGoalId.eq(id))
        .exec(&txn)
        .await
        .context("Failed to delete sub-goals")?;
    GoalContribution::delete_many()
        .filter(goal_contribution::Column::FinancialGoalId.eq(id))
        .exec(&txn)
        .await
        .context("Failed to delete goal contributions")?;
    GoalDrawdown::delete_many()
        .filter(goal_drawdown::Column::FinancialGoalId.eq(id))
        .exec(&txn)
        .await
        .context("Failed to delete goal drawdowns")?;
    existing.delete(&txn).await.context("Failed to delete goal")?;
    txn.commit().await?;

    info!("Deleted goal {}", id);
    Ok(())
}

async fn sync_has_sub_goals<C>(db: &C, goal_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let remaining = FinancialSubGoal::find()
        .filter(financial_sub_goal::Column::FinancialGoalId.eq(goal_id))
        .count(db)
        .await?;
    FinancialGoal::update_many()
        .col_expr(
            financial_goal::Column::HasSubGoals,
            Expr::value(remaining > 0),
        )
        .filter(financial_goal::Column::Id.eq(goal_id))
        .exec(db)
        .await
        .context("Failed to sync sub-goal flag")?;
    Ok(())
}

/// Adds a sub-goal and marks the parent as having sub-goals.
#[instrument(skip(db))]
pub async fn create_sub_goal(
    db: &DatabaseConnection,
    caller: &Caller,
    new: NewSubGoal,
) -> Result<financial_sub_goal::Model> {
    let user_id = caller.require()?;
    find_owned::<FinancialGoal, _>(db, user_id, RESOURCE, new.financial_goal_id).await?;

    let name = validation::required_text(&new.name, "name")?;
    validation::progress_in_range(new.progress)?;
    if let Some(cost) = new.estimated_cost {
        validation::non_negative_amount(cost, "estimated_cost")?;
    }
    sub_goal_dates(new.start_date, new.end_date)?;

    let now = Utc::now();
    let txn = db.begin().await?;
    let created = financial_sub_goal::ActiveModel {
        user_id: Set(user_id.to_string()),
        financial_goal_id: Set(new.financial_goal_id),
        name: Set(name),
        progress: Set(new.progress),
        estimated_cost: Set(new.estimated_cost),
        start_date: Set(new.start_date),
        end_date: Set(new.end_date),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .context("Failed to create sub-goal")?;
    sync_has_sub_goals(&txn, created.financial_goal_id).await?;
    txn.commit().await?;

    info!(
        "Created sub-goal '{}' (ID: {}) under goal {}",
        created.name, created.id, created.financial_goal_id
    );
    Ok(created)
}

/// Lists a goal's sub-goals in creation order.
pub async fn get_sub_goals(
    db: &DatabaseConnection,
    caller: &Caller,
    goal_id: i64,
) -> Result<Vec<financial_sub_goal::Model>> {
    let user_id = caller.require()?;
    find_owned::<FinancialGoal, _>(db, user_id, RESOURCE, goal_id).await?;
    FinancialSubGoal::find()
        .filter(financial_sub_goal::Column::FinancialGoalId.eq(goal_id))
        .order_by_asc(financial_sub_goal::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Applies a patch to a sub-goal.
#[instrument(skip(db))]
pub async fn update_sub_goal(
    db: &DatabaseConnection,
    caller: &Caller,
    id: i64,
    patch: SubGoalPatch,
) -> Result<financial_sub_goal::Model> {
    let user_id = caller.require()?;
    let existing = find_owned::<FinancialSubGoal, _>(db, user_id, SUB_GOAL, id).await?;

    let name = patch
        .name
        .as_deref()
        .map(|n| validation::required_text(n, "name"))
        .transpose()?;
    if let Some(progress) = patch.progress {
        validation::progress_in_range(progress)?;
    }
    if let Some(Some(cost)) = patch.estimated_cost {
        validation::non_negative_amount(cost, "estimated_cost")?;
    }
    let start_date = patch.start_date.unwrap_or(existing.start_date);
    let end_date = patch.end_date.unwrap_or(existing.end_date);
    sub_goal_dates(start_date, end_date)?;

    let mut active_model: financial_sub_goal::ActiveModel = existing.into();
    if let Some(name) = name {
        active_model.name = Set(name);
    }
    if let Some(progress) = patch.progress {
        active_model.progress = Set(progress);
    }
    if let Some(cost) = patch.estimated_cost {
        active_model.estimated_cost = Set(cost);
    }
    active_model.start_date = Set(start_date);
    active_model.end_date = Set(end_date);
    active_model.updated_at = Set(Utc::now());

    let updated = active_model
        .update(db)
        .await
        .context("Failed to update sub-goal")?;
    info!("Updated sub-goal {} to {}%", updated.id, updated.progress);
    Ok(updated)
}

/// Deletes a sub-goal and clears the parent flag when it was the last one.
#[instrument(skip(db))]
pub async fn delete_sub_goal(db: &DatabaseConnection, caller: &Caller, id: i64) -> Result<()> {
    let user_id = caller.require()?;
    let existing = find_owned::<FinancialSubGoal, _>(db, user_id, SUB_GOAL, id).await?;
    let goal_id = existing.financial_goal_id;

    let txn = db.begin().await?;
    existing
        .delete(&txn)
        .await
        .context("Failed to delete sub-goal")?;
    sync_has_sub_goals(&txn, goal_id).await?;
    txn.commit().await?;

    info!("Deleted sub-goal {} from goal {}", id, goal_id);
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::expense::{self, ExpensePatch};
    use crate::core::transfer::{self, NewTransfer};
    use crate::entities::TransferType;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_goal_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let caller = test_caller();

        let zero_target = create_goal(
            &db,
            &caller,
            NewGoal {
                name: "Car".to_string(),
                description: None,
                target_amount: Decimal::ZERO,
                current_amount: Decimal::ZERO,
                start_date: march(1),
                end_date: None,
            },
        )
        .await;
        assert!(matches!(
            zero_target,
            Err(Error::Validation {
                field: Some("target_amount"),
                ..
            })
        ));

        let backwards = create_goal(
            &db,
            &caller,
            NewGoal {
                name: "Car".to_string(),
                description: None,
                target_amount: Decimal::new(100, 0),
                current_amount: Decimal::ZERO,
                start_date: march(10),
                end_date: Some(march(9)),
            },
        )
        .await;
        assert!(matches!(
            backwards,
            Err(Error::Validation {
                field: Some("end_date"),
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_create_goal_stores_opening_balance_as_base() -> Result<()> {
        let db = setup_test_db().await?;
        let goal = create_test_goal(&db, &test_caller(), "Car", Decimal::new(5000, 0), Decimal::new(250, 0)).await?;
        assert_eq!(goal.base_amount, Some(Decimal::new(250, 0)));
        assert_eq!(goal.current_amount, Decimal::new(250, 0));
        assert_eq!(goal.status, GoalStatus::Active);
        Ok(())
    }

    #[tokio::test]
    async fn test_goal_balance_tracks_expense_lifecycle() -> Result<()> {
        let db = setup_test_db().await?;
        let caller = test_caller();
        let month = create_test_month(&db, &caller).await?;
        let car = create_test_budget(&db, &caller, month.id, "Car", Decimal::new(1000, 0)).await?;
        let goal = create_test_goal(&db, &caller, "Car fund", Decimal::new(5000, 0), Decimal::new(100, 0)).await?;

        let first = create_test_expense(&db, &caller, car.id, Decimal::new(200, 0), Some(goal.id)).await?;
        let second = create_test_expense(&db, &caller, car.id, Decimal::new(50, 0), Some(goal.id)).await?;
        assert_eq!(get_goal(&db, &caller, goal.id).await?.current_amount, Decimal::new(350, 0));

        expense::update_expense(
            &db,
            &caller,
            first.id,
            ExpensePatch {
                amount: Some(Decimal::new(120, 0)),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(get_goal(&db, &caller, goal.id).await?.current_amount, Decimal::new(270, 0));

        expense::update_expense(
            &db,
            &caller,
            second.id,
            ExpensePatch {
                financial_goal_id: Some(None),
                ..Default::default()
            },
        )
        .await?;
        expense::delete_expense(&db, &caller, first.id).await?;

        let reconciled = recalculate_current_amount(&db, &caller, goal.id).await?;
        assert_eq!(reconciled.base_amount, Some(Decimal::new(100, 0)));
        assert_eq!(reconciled.current_amount, Decimal::new(100, 0));
        Ok(())
    }

    #[tokio::test]
    async fn test_recalculate_migrates_missing_base() -> Result<()> {
        let db = setup_test_db().await?;
        let caller = test_caller();
        let month = create_test_month(&db, &caller).await?;
        let budget = create_test_budget(&db, &caller, month.id, "Car", Decimal::new(1000, 0)).await?;
        let goal = create_test_goal(&db, &caller, "Legacy", Decimal::new(5000, 0), Decimal::ZERO).await?;
        create_test_expense(&db, &caller, budget.id, Decimal::new(40, 0), Some(goal.id)).await?;

        // Simulate a row written before base_amount existed
        let mut legacy: financial_goal::ActiveModel = FinancialGoal::find_by_id(goal.id)
            .one(&db)
            .await?
            .unwrap()
            .into();
        legacy.base_amount = Set(None);
        legacy.current_amount = Set(Decimal::new(300, 0));
        legacy.update(&db).await?;

        let first = recalculate_current_amount(&db, &caller, goal.id).await?;
        assert_eq!(first.base_amount, Some(Decimal::new(260, 0)));
        assert_eq!(first.current_amount, Decimal::new(300, 0));

        let second = recalculate_current_amount(&db, &caller, goal.id).await?;
        assert_eq!(second, first);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_current_amount_rebases() -> Result<()> {
        let db = setup_test_db().await?;
        let caller = test_caller();
        let month = create_test_month(&db, &caller).await?;
        let budget = create_test_budget(&db, &caller, month.id, "Car", Decimal::new(1000, 0)).await?;
        let goal = create_test_goal(&db, &caller, "Car", Decimal::new(5000, 0), Decimal::ZERO).await?;
        create_test_expense(&db, &caller, budget.id, Decimal::new(80, 0), Some(goal.id)).await?;

        let updated = update_goal(
            &db,
            &caller,
            goal.id,
            GoalPatch {
                current_amount: Some(Decimal::new(500, 0)),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(updated.base_amount, Some(Decimal::new(420, 0)));
        assert_eq!(updated.current_amount, Decimal::new(500, 0));

        // Below the linked sum the base floors at zero
        let floored = update_goal(
            &db,
            &caller,
            goal.id,
            GoalPatch {
                current_amount: Some(Decimal::new(30, 0)),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(floored.base_amount, Some(Decimal::ZERO));
        assert_eq!(floored.current_amount, Decimal::new(80, 0));
        Ok(())
    }

    #[tokio::test]
    async fn test_adjust_balance_moves_base() -> Result<()> {
        let db = setup_test_db().await?;
        let goal = create_test_goal(&db, &test_caller(), "Car", Decimal::new(5000, 0), Decimal::new(100, 0)).await?;

        let raised = adjust_balance(&db, goal.id, Decimal::new(50, 0)).await?;
        assert_eq!(raised.current_amount, Decimal::new(150, 0));
        let lowered = adjust_balance(&db, goal.id, Decimal::new(-150, 0)).await?;
        assert_eq!(lowered.current_amount, Decimal::ZERO);
        assert_eq!(lowered.base_amount, Some(Decimal::ZERO));
        Ok(())
    }

    #[tokio::test]
    async fn test_sub_goal_flag_sync() -> Result<()> {
        let db = setup_test_db().await?;
        let caller = test_caller();
        let goal = create_test_goal(&db, &caller, "House", Decimal::new(20000, 0), Decimal::ZERO).await?;

        let bad = create_sub_goal(
            &db,
            &caller,
            NewSubGoal {
                financial_goal_id: goal.id,
                name: "Deposit".to_string(),
                progress: 120,
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(bad, Err(Error::Validation { field: Some("progress"), .. })));

        let first = create_sub_goal(
            &db,
            &caller,
            NewSubGoal {
                financial_goal_id: goal.id,
                name: "Deposit".to_string(),
                progress: 40,
                ..Default::default()
            },
        )
        .await?;
        let second = create_sub_goal(
            &db,
            &caller,
            NewSubGoal {
                financial_goal_id: goal.id,
                name: "Solicitor".to_string(),
                progress: 0,
                estimated_cost: Some(Decimal::new(1500, 0)),
                ..Default::default()
            },
        )
        .await?;
        assert!(get_goal(&db, &caller, goal.id).await?.has_sub_goals);

        let updated = update_sub_goal(
            &db,
            &caller,
            first.id,
            SubGoalPatch {
                progress: Some(100),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(updated.progress, 100);

        delete_sub_goal(&db, &caller, first.id).await?;
        assert!(get_goal(&db, &caller, goal.id).await?.has_sub_goals);
        delete_sub_goal(&db, &caller, second.id).await?;
        assert!(!get_goal(&db, &caller, goal.id).await?.has_sub_goals);
        assert!(get_sub_goals(&db, &caller, goal.id).await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_goal_unlinks_expenses() -> Result<()> {
        let db = setup_test_db().await?;
        let caller = test_caller();
        let month = create_test_month(&db, &caller).await?;
        let budget = create_test_budget(&db, &caller, month.id, "Car", Decimal::new(1000, 0)).await?;
        let goal = create_test_goal(&db, &caller, "Car", Decimal::new(5000, 0), Decimal::ZERO).await?;
        let spent = create_test_expense(&db, &caller, budget.id, Decimal::new(80, 0), Some(goal.id)).await?;

        delete_goal(&db, &caller, goal.id).await?;

        let kept = expense::get_expense(&db, &caller, spent.id).await?;
        assert_eq!(kept.financial_goal_id, None);
        assert!(matches!(get_goal(&db, &caller, goal.id).await, Err(Error::NotFound { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_goal_unlinks_transfers() -> Result<()> {
        let db = setup_test_db().await?;
        let caller = test_caller();
        let month = create_test_month(&db, &caller).await?;
        let car = create_test_budget(&db, &caller, month.id, "Car", Decimal::new(100, 0)).await?;
        let fund = create_test_goal(&db, &caller, "Car fund", Decimal::new(1000, 0), Decimal::new(400, 0)).await?;
        let moved = transfer::create_transfer(
            &db,
            &caller,
            NewTransfer {
                monthly_overview_id: month.id,
                transfer_type: TransferType::GoalToBudget,
                amount: Decimal::new(250, 0),
                date: march(12),
                from_budget_id: None,
                to_budget_id: Some(car.id),
                from_goal_id: Some(fund.id),
                description: None,
            },
        )
        .await?;

        delete_goal(&db, &caller, fund.id).await?;

        let kept = transfer::get_transfer(&db, &caller, moved.id).await?;
        assert_eq!(kept.from_goal_id, None);
        assert_eq!(kept.to_budget_id, Some(car.id));

        transfer::delete_transfer(&db, &caller, moved.id).await?;
        let car = crate::core::budget::get_budget_by_id(&db, &caller, car.id).await?;
        assert_eq!(car.budget_amount, Decimal::new(100, 0));
        Ok(())
    }

    #[test]
    fn test_progress_percent() {
        let mut goal = financial_goal::Model {
            id: 1,
            user_id: "u".to_string(),
            name: "Car".to_string(),
            description: None,
            target_amount: Decimal::new(400, 0),
            base_amount: Some(Decimal::new(100, 0)),
            current_amount: Decimal::new(100, 0),
            start_date: march(1),
            end_date: None,
            status: GoalStatus::Active,
            has_sub_goals: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(progress_percent(&goal), Decimal::new(25, 0));
        goal.current_amount = Decimal::new(800, 0);
        assert_eq!(progress_percent(&goal), Decimal::ONE_HUNDRED);
    }
}
