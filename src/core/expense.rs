//! Expense business logic - Spending charged against a budget.
//!
//! Every write is validated in full before it reaches the store: the date
//! must fall in the owning month and the budget must not be overspent.
//! Goal-linked expenses trigger a goal recalculation afterwards.

use crate::{
    core::{
        access::{Caller, find_owned},
        goal, summary, validation,
    },
    entities::{
        Budget, Expense, FinancialGoal, Frequency, MonthlyOverview, budget, expense,
        monthly_overview,
    },
    errors::{Error, Result, StoreContext},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, QueryOrder, Set, prelude::*};
use tracing::{info, instrument, warn};

const RESOURCE: &str = "expense";

/// Input for [`create_expense`].
#[derive(Debug, Clone, Default)]
pub struct NewExpense {
    pub budget_id: i64,
    pub amount: Decimal,
    pub description: String,
    pub date: NaiveDate,
    pub financial_goal_id: Option<i64>,
    pub is_recurring: bool,
    pub recurring_frequency: Option<Frequency>,
    pub payment_method: Option<String>,
    pub person: Option<String>,
}

/// Fields changed by [`update_expense`]. Clearable fields use `Some(None)`.
#[derive(Debug, Clone, Default)]
pub struct ExpensePatch {
    pub budget_id: Option<i64>,
    pub amount: Option<Decimal>,
    pub description: Option<String>,
    pub date: Option<NaiveDate>,
    pub financial_goal_id: Option<Option<i64>>,
    pub is_recurring: Option<bool>,
    pub recurring_frequency: Option<Option<Frequency>>,
    pub payment_method: Option<Option<String>>,
    pub person: Option<Option<String>>,
}

fn recurrence(is_recurring: bool, frequency: Option<Frequency>) -> Result<Option<Frequency>> {
    match (is_recurring, frequency) {
        (true, None) => Err(Error::validation(
            "Recurring expenses need a frequency",
            "recurring_frequency",
        )),
        (true, frequency) => Ok(frequency),
        (false, _) => Ok(None),
    }
}

/// Loads a budget the caller owns together with its month.
async fn budget_with_month<C>(
    db: &C,
    user_id: &str,
    budget_id: i64,
) -> Result<(budget::Model, monthly_overview::Model)>
where
    C: ConnectionTrait,
{
    let budget = find_owned::<Budget, _>(db, user_id, "budget", budget_id).await?;
    let month = find_owned::<MonthlyOverview, _>(
        db,
        user_id,
        "monthly overview",
        budget.monthly_overview_id,
    )
    .await?;
    Ok((budget, month))
}

/// Records an expense against a budget.
///
/// Rejects dates outside the budget's month with [`Error::DateOutOfRange`]
/// before looking at the balance, then rejects amounts above what is left
/// with [`Error::Overspending`]. Spending exactly what is left is allowed.
#[instrument(skip(db))]
pub async fn create_expense(
    db: &DatabaseConnection,
    caller: &Caller,
    new: NewExpense,
) -> Result<expense::Model> {
    let user_id = caller.require()?;
    validation::positive_amount(new.amount, "amount")?;
    let description = validation::required_text(&new.description, "description")?;
    let frequency = recurrence(new.is_recurring, new.recurring_frequency)?;

    let (budget, month) = budget_with_month(db, user_id, new.budget_id).await?;
    validation::date_in_range(new.date, month.start_date, month.end_date, "Expense")?;

    if let Some(goal_id) = new.financial_goal_id {
        find_owned::<FinancialGoal, _>(db, user_id, goal::RESOURCE, goal_id).await?;
    }

    let spent = summary::amount_spent(db, budget.id).await?;
    let amount_left = validation::no_overspend(&budget.name, budget.effective_amount(), spent, new.amount)
        .inspect_err(|_| {
            warn!(
                "Rejected expense of {} on budget '{}' (spent {} of {})",
                new.amount,
                budget.name,
                spent,
                budget.effective_amount()
            );
        })?;

    let now = Utc::now();
    let model = expense::ActiveModel {
        user_id: Set(user_id.to_string()),
        budget_id: Set(budget.id),
        amount: Set(new.amount),
        description: Set(description),
        date: Set(new.date),
        financial_goal_id: Set(new.financial_goal_id),
        is_recurring: Set(new.is_recurring),
        recurring_frequency: Set(frequency),
        payment_method: Set(new.payment_method),
        person: Set(new.person),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };
    let created = model.insert(db).await.context("Failed to create expense")?;
    info!(
        "Created expense {} of {} on budget '{}' ({} left)",
        created.id, created.amount, budget.name, amount_left
    );

    if let Some(goal_id) = created.financial_goal_id {
        goal::recalculate_best_effort(db, goal_id).await;
    }
    Ok(created)
}

/// Retrieves an expense by ID.
pub async fn get_expense(db: &DatabaseConnection, caller: &Caller, id: i64) -> Result<expense::Model> {
    let user_id = caller.require()?;
    find_owned::<Expense, _>(db, user_id, RESOURCE, id).await
}

/// Lists a budget's expenses, newest first.
pub async fn get_expenses_for_budget(
    db: &DatabaseConnection,
    caller: &Caller,
    budget_id: i64,
) -> Result<Vec<expense::Model>> {
    let user_id = caller.require()?;
    find_owned::<Budget, _>(db, user_id, "budget", budget_id).await?;
    Expense::find()
        .filter(expense::Column::UserId.eq(user_id))
        .filter(expense::Column::BudgetId.eq(budget_id))
        .order_by_desc(expense::Column::Date)
        .order_by_desc(expense::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Lists the expenses linked to a goal, newest first.
pub async fn get_expenses_for_goal(
    db: &DatabaseConnection,
    caller: &Caller,
    goal_id: i64,
) -> Result<Vec<expense::Model>> {
    let user_id = caller.require()?;
    find_owned::<FinancialGoal, _>(db, user_id, goal::RESOURCE, goal_id).await?;
    Expense::find()
        .filter(expense::Column::UserId.eq(user_id))
        .filter(expense::Column::FinancialGoalId.eq(goal_id))
        .order_by_desc(expense::Column::Date)
        .order_by_desc(expense::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Applies a patch to an expense.
///
/// The overspend check uses the projected balance of the target budget: the
/// old amount is added back when the expense stays in the same budget and
/// ignored when it moves. When the goal link or amount changes, both the old
/// and the new goal are recalculated.
#[instrument(skip(db))]
pub async fn update_expense(
    db: &DatabaseConnection,
    caller: &Caller,
    id: i64,
    patch: ExpensePatch,
) -> Result<expense::Model> {
    let user_id = caller.require()?;
    let existing = find_owned::<Expense, _>(db, user_id, RESOURCE, id).await?;

    let amount = patch.amount.unwrap_or(existing.amount);
    validation::positive_amount(amount, "amount")?;
    let description = patch
        .description
        .as_deref()
        .map(|d| validation::required_text(d, "description"))
        .transpose()?;
    let is_recurring = patch.is_recurring.unwrap_or(existing.is_recurring);
    let frequency = recurrence(
        is_recurring,
        patch
            .recurring_frequency
            .unwrap_or(existing.recurring_frequency),
    )?;

    let budget_id = patch.budget_id.unwrap_or(existing.budget_id);
    let (budget, month) = budget_with_month(db, user_id, budget_id).await?;
    let date = patch.date.unwrap_or(existing.date);
    validation::date_in_range(date, month.start_date, month.end_date, "Expense")?;

    let goal_id = patch.financial_goal_id.unwrap_or(existing.financial_goal_id);
    if let Some(goal_id) = goal_id {
        find_owned::<FinancialGoal, _>(db, user_id, goal::RESOURCE, goal_id).await?;
    }

    let spent = summary::amount_spent(db, budget.id).await?;
    let spent_excluding_this = if budget.id == existing.budget_id {
        spent - existing.amount
    } else {
        spent
    };
    validation::no_overspend(
        &budget.name,
        budget.effective_amount(),
        spent_excluding_this,
        amount,
    )?;

    let old_goal = existing.financial_goal_id;
    let old_amount = existing.amount;

    let mut active_model: expense::ActiveModel = existing.into();
    active_model.budget_id = Set(budget.id);
    active_model.amount = Set(amount);
    if let Some(description) = description {
        active_model.description = Set(description);
    }
    active_model.date = Set(date);
    active_model.financial_goal_id = Set(goal_id);
    active_model.is_recurring = Set(is_recurring);
    active_model.recurring_frequency = Set(frequency);
    if let Some(payment_method) = patch.payment_method {
        active_model.payment_method = Set(payment_method);
    }
    if let Some(person) = patch.person {
        active_model.person = Set(person);
    }
    active_model.updated_at = Set(Utc::now());

    let updated = active_model.update(db).await.context("Failed to update expense")?;
    info!("Updated expense {} on budget '{}'", updated.id, budget.name);

    if old_goal != goal_id || old_amount != amount {
        if let Some(old) = old_goal {
            goal::recalculate_best_effort(db, old).await;
        }
        if let Some(new) = goal_id.filter(|new| Some(*new) != old_goal) {
            goal::recalculate_best_effort(db, new).await;
        }
    }
    Ok(updated)
}

/// Deletes an expense and recalculates its goal, if any.
#[instrument(skip(db))]
pub async fn delete_expense(db: &DatabaseConnection, caller: &Caller, id: i64) -> Result<()> {
    let user_id = caller.require()?;
    let existing = find_owned::<Expense, _>(db, user_id, RESOURCE, id).await?;
    let goal_id = existing.financial_goal_id;

    existing.delete(db).await.context("Failed to delete expense")?;
    info!("Deleted expense {}", id);

    if let Some(goal_id) = goal_id {
        goal::recalculate_best_effort(db, goal_id).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::budget::{self as budget_service, BudgetPatch};
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_expense_validation_before_storage() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let caller = test_caller();

        let zero = create_expense(
            &db,
            &caller,
            NewExpense {
                budget_id: 1,
                amount: Decimal::ZERO,
                description: "Coffee".to_string(),
                date: march(2),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(zero, Err(Error::Validation { field: Some("amount"), .. })));

        let no_frequency = create_expense(
            &db,
            &caller,
            NewExpense {
                budget_id: 1,
                amount: Decimal::new(5, 0),
                description: "Gym".to_string(),
                date: march(2),
                is_recurring: true,
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(
            no_frequency,
            Err(Error::Validation {
                field: Some("recurring_frequency"),
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_create_expense_boundary() -> Result<()> {
        let db = setup_test_db().await?;
        let caller = test_caller();
        let month = create_test_month(&db, &caller).await?;
        let food = create_test_budget(&db, &caller, month.id, "Food", Decimal::new(100, 0)).await?;
        create_test_expense(&db, &caller, food.id, Decimal::new(60, 0), None).await?;

        let over = create_test_expense(&db, &caller, food.id, Decimal::new(4050, 2), None).await;
        match over {
            Err(Error::Overspending {
                budget_name,
                current_spent,
                ..
            }) => {
                assert_eq!(budget_name, "Food");
                assert_eq!(current_spent, Decimal::new(60, 0));
            }
            other => panic!("expected overspending, got {other:?}"),
        }

        create_test_expense(&db, &caller, food.id, Decimal::new(40, 0), None).await?;
        let summary = budget_service::get_budget_summary(&db, &caller, food.id).await?;
        assert_eq!(summary.amount_left, Decimal::ZERO);
        assert_eq!(summary.percent_used, Decimal::ONE_HUNDRED);
        Ok(())
    }

    #[tokio::test]
    async fn test_create_expense_date_out_of_range() -> Result<()> {
        let db = setup_test_db().await?;
        let caller = test_caller();
        let month = create_test_month(&db, &caller).await?;
        let food = create_test_budget(&db, &caller, month.id, "Food", Decimal::new(100, 0)).await?;

        // Out of range and over budget: the date error wins
        let result = create_expense(
            &db,
            &caller,
            NewExpense {
                budget_id: food.id,
                amount: Decimal::new(500, 0),
                description: "Early shop".to_string(),
                date: NaiveDate::from_ymd_opt(2024, 4, 1).unwrap(),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(Error::DateOutOfRange { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_create_expense_respects_override() -> Result<()> {
        let db = setup_test_db().await?;
        let caller = test_caller();
        let month = create_test_month(&db, &caller).await?;
        let fuel = create_test_budget(&db, &caller, month.id, "Fuel", Decimal::new(100, 0)).await?;
        budget_service::update_budget(
            &db,
            &caller,
            fuel.id,
            BudgetPatch {
                override_amount: Some(Some(Decimal::new(150, 0))),
                override_reason: Some(Some("Road trip".to_string())),
                ..Default::default()
            },
        )
        .await?;

        create_test_expense(&db, &caller, fuel.id, Decimal::new(150, 0), None).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_update_expense_projects_same_budget() -> Result<()> {
        let db = setup_test_db().await?;
        let caller = test_caller();
        let month = create_test_month(&db, &caller).await?;
        let food = create_test_budget(&db, &caller, month.id, "Food", Decimal::new(100, 0)).await?;
        let shop = create_test_expense(&db, &caller, food.id, Decimal::new(80, 0), None).await?;

        // 80 -> 100 only needs 20 more
        let updated = update_expense(
            &db,
            &caller,
            shop.id,
            ExpensePatch {
                amount: Some(Decimal::new(100, 0)),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(updated.amount, Decimal::new(100, 0));

        let over = update_expense(
            &db,
            &caller,
            shop.id,
            ExpensePatch {
                amount: Some(Decimal::new(101, 0)),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(over, Err(Error::Overspending { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_expense_moving_budget_counts_full_amount() -> Result<()> {
        let db = setup_test_db().await?;
        let caller = test_caller();
        let month = create_test_month(&db, &caller).await?;
        let food = create_test_budget(&db, &caller, month.id, "Food", Decimal::new(100, 0)).await?;
        let fun = create_test_budget(&db, &caller, month.id, "Fun", Decimal::new(50, 0)).await?;
        create_test_expense(&db, &caller, fun.id, Decimal::new(20, 0), None).await?;
        let shop = create_test_expense(&db, &caller, food.id, Decimal::new(40, 0), None).await?;

        let over = update_expense(
            &db,
            &caller,
            shop.id,
            ExpensePatch {
                budget_id: Some(fun.id),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(over, Err(Error::Overspending { .. })));

        let moved = update_expense(
            &db,
            &caller,
            shop.id,
            ExpensePatch {
                budget_id: Some(fun.id),
                amount: Some(Decimal::new(30, 0)),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(moved.budget_id, fun.id);
        assert_eq!(
            budget_service::get_budget_summary(&db, &caller, fun.id).await?.amount_left,
            Decimal::ZERO
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_update_expense_relinks_goal() -> Result<()> {
        let db = setup_test_db().await?;
        let caller = test_caller();
        let month = create_test_month(&db, &caller).await?;
        let budget = create_test_budget(&db, &caller, month.id, "House", Decimal::new(1000, 0)).await?;
        let first = create_test_goal(&db, &caller, "Roof", Decimal::new(2000, 0), Decimal::ZERO).await?;
        let second = create_test_goal(&db, &caller, "Garden", Decimal::new(500, 0), Decimal::ZERO).await?;
        let spend = create_test_expense(&db, &caller, budget.id, Decimal::new(75, 0), Some(first.id)).await?;

        update_expense(
            &db,
            &caller,
            spend.id,
            ExpensePatch {
                financial_goal_id: Some(Some(second.id)),
                ..Default::default()
            },
        )
        .await?;

        assert_eq!(goal::get_goal(&db, &caller, first.id).await?.current_amount, Decimal::ZERO);
        assert_eq!(
            goal::get_goal(&db, &caller, second.id).await?.current_amount,
            Decimal::new(75, 0)
        );
        assert_eq!(get_expenses_for_goal(&db, &caller, second.id).await?.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_expense_and_listing() -> Result<()> {
        let db = setup_test_db().await?;
        let caller = test_caller();
        let month = create_test_month(&db, &caller).await?;
        let food = create_test_budget(&db, &caller, month.id, "Food", Decimal::new(100, 0)).await?;
        let a = create_test_expense(&db, &caller, food.id, Decimal::new(10, 0), None).await?;
        create_test_expense(&db, &caller, food.id, Decimal::new(15, 0), None).await?;

        delete_expense(&db, &caller, a.id).await?;
        let remaining = get_expenses_for_budget(&db, &caller, food.id).await?;
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].amount, Decimal::new(15, 0));

        let foreign = delete_expense(&db, &Caller::user("other"), remaining[0].id).await;
        assert!(matches!(foreign, Err(Error::Forbidden { .. })));
        Ok(())
    }
}
