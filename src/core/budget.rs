//! Budget business logic - Per-month spending categories.
//!
//! Also owns the single "ensure default budgets" step that copies active
//! master budgets into a month. Month creation and first-income creation both
//! go through it.

use crate::{
    core::{
        access::{Caller, find_owned},
        goal, master_budget,
        summary::{self, BudgetSummary},
        validation,
    },
    entities::{Budget, Expense, MasterBudget, MonthlyOverview, budget, expense},
    errors::{Error, Result, StoreContext},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ConnectionTrait, PaginatorTrait, QueryOrder, Set, TransactionTrait, prelude::*,
    sea_query::Expr,
};
use std::collections::BTreeSet;
use tracing::{debug, info, instrument, warn};

pub(crate) const RESOURCE: &str = "budget";

/// Input for [`create_budget`].
#[derive(Debug, Clone, Default)]
pub struct NewBudget {
    pub monthly_overview_id: i64,
    pub name: String,
    pub budget_amount: Decimal,
    pub override_amount: Option<Decimal>,
    pub override_reason: Option<String>,
    pub description: Option<String>,
    pub master_budget_id: Option<i64>,
}

/// Fields changed by [`update_budget`]. Clearable fields use `Some(None)`.
#[derive(Debug, Clone, Default)]
pub struct BudgetPatch {
    pub name: Option<String>,
    pub budget_amount: Option<Decimal>,
    pub override_amount: Option<Option<Decimal>>,
    pub override_reason: Option<Option<String>>,
    pub description: Option<Option<String>>,
}

async fn name_taken<C>(
    db: &C,
    user_id: &str,
    monthly_overview_id: i64,
    name: &str,
    except_id: Option<i64>,
) -> Result<bool>
where
    C: ConnectionTrait,
{
    let mut query = Budget::find()
        .filter(budget::Column::UserId.eq(user_id))
        .filter(budget::Column::MonthlyOverviewId.eq(monthly_overview_id))
        .filter(budget::Column::Name.eq(name));
    if let Some(id) = except_id {
        query = query.filter(budget::Column::Id.ne(id));
    }
    Ok(query.count(db).await? > 0)
}

/// Creates a budget in a month the caller owns.
///
/// Names are unique within a month (exact match after trimming), and so is
/// the master budget a row was copied from.
#[instrument(skip(db))]
pub async fn create_budget(
    db: &DatabaseConnection,
    caller: &Caller,
    new: NewBudget,
) -> Result<budget::Model> {
    let user_id = caller.require()?;
    let month =
        find_owned::<MonthlyOverview, _>(db, user_id, "monthly overview", new.monthly_overview_id)
            .await?;

    let name = validation::required_text(&new.name, "name")?;
    validation::non_negative_amount(new.budget_amount, "budget_amount")?;
    validation::override_pair(new.override_amount, new.override_reason.as_deref())?;

    if name_taken(db, user_id, month.id, &name, None).await? {
        warn!("Rejected duplicate budget '{}' in month {}", name, month.id);
        return Err(Error::validation(
            format!("A budget named '{name}' already exists for this month"),
            "name",
        ));
    }

    if let Some(master_id) = new.master_budget_id {
        find_owned::<MasterBudget, _>(db, user_id, "master budget", master_id).await?;
        let copies = Budget::find()
            .filter(budget::Column::UserId.eq(user_id))
            .filter(budget::Column::MonthlyOverviewId.eq(month.id))
            .filter(budget::Column::MasterBudgetId.eq(master_id))
            .count(db)
            .await?;
        if copies > 0 {
            return Err(Error::validation(
                "This master budget is already used in this month",
                "master_budget_id",
            ));
        }
    }

    let now = Utc::now();
    let model = budget::ActiveModel {
        user_id: Set(user_id.to_string()),
        monthly_overview_id: Set(month.id),
        name: Set(name),
        budget_amount: Set(new.budget_amount),
        override_amount: Set(new.override_amount),
        override_reason: Set(new.override_reason.map(|r| r.trim().to_string())),
        description: Set(new.description),
        master_budget_id: Set(new.master_budget_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let created = model.insert(db).await.context("Failed to create budget")?;
    info!(
        "Created budget '{}' (ID: {}) with {} in month {}",
        created.name, created.id, created.budget_amount, created.monthly_overview_id
    );
    Ok(created)
}

/// Retrieves a budget by ID.
pub async fn get_budget_by_id(
    db: &DatabaseConnection,
    caller: &Caller,
    id: i64,
) -> Result<budget::Model> {
    let user_id = caller.require()?;
    find_owned::<Budget, _>(db, user_id, RESOURCE, id).await
}

/// Lists a month's budgets ordered by name.
pub async fn get_budgets(
    db: &DatabaseConnection,
    caller: &Caller,
    monthly_overview_id: i64,
) -> Result<Vec<budget::Model>> {
    let user_id = caller.require()?;
    find_owned::<MonthlyOverview, _>(db, user_id, "monthly overview", monthly_overview_id).await?;
    Budget::find()
        .filter(budget::Column::UserId.eq(user_id))
        .filter(budget::Column::MonthlyOverviewId.eq(monthly_overview_id))
        .order_by_asc(budget::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Spending figures for one budget.
pub async fn get_budget_summary(
    db: &DatabaseConnection,
    caller: &Caller,
    id: i64,
) -> Result<BudgetSummary> {
    let user_id = caller.require()?;
    let budget = find_owned::<Budget, _>(db, user_id, RESOURCE, id).await?;
    summary::budget_summary(db, budget).await
}

/// Spending figures for every budget in a month, ordered by name.
pub async fn get_budget_summaries(
    db: &DatabaseConnection,
    caller: &Caller,
    monthly_overview_id: i64,
) -> Result<Vec<BudgetSummary>> {
    let user_id = caller.require()?;
    find_owned::<MonthlyOverview, _>(db, user_id, "monthly overview", monthly_overview_id).await?;
    summary::budget_summaries(db, user_id, monthly_overview_id).await
}

/// Applies a patch to a budget.
///
/// Clearing `override_amount` also clears `override_reason`.
#[instrument(skip(db))]
pub async fn update_budget(
    db: &DatabaseConnection,
    caller: &Caller,
    id: i64,
    patch: BudgetPatch,
) -> Result<budget::Model> {
    let user_id = caller.require()?;
    let existing = find_owned::<Budget, _>(db, user_id, RESOURCE, id).await?;

    let name = patch
        .name
        .as_deref()
        .map(|n| validation::required_text(n, "name"))
        .transpose()?;
    if let Some(amount) = patch.budget_amount {
        validation::non_negative_amount(amount, "budget_amount")?;
    }

    let override_cleared = matches!(patch.override_amount, Some(None));
    let override_amount = patch.override_amount.unwrap_or(existing.override_amount);
    let override_reason = if override_cleared {
        None
    } else {
        patch
            .override_reason
            .unwrap_or_else(|| existing.override_reason.clone())
    };
    validation::override_pair(override_amount, override_reason.as_deref())?;

    if let Some(name) = name.as_deref().filter(|n| *n != existing.name) {
        if name_taken(db, user_id, existing.monthly_overview_id, name, Some(id)).await? {
            return Err(Error::validation(
                format!("A budget named '{name}' already exists for this month"),
                "name",
            ));
        }
    }

    let mut active_model: budget::ActiveModel = existing.into();
    if let Some(name) = name {
        active_model.name = Set(name);
    }
    if let Some(amount) = patch.budget_amount {
        active_model.budget_amount = Set(amount);
    }
    if let Some(description) = patch.description {
        active_model.description = Set(description);
    }
    active_model.override_amount = Set(override_amount);
    active_model.override_reason = Set(override_reason.map(|r| r.trim().to_string()));
    active_model.updated_at = Set(Utc::now());

    let updated = active_model.update(db).await.context("Failed to update budget")?;
    info!("Updated budget '{}' (ID: {})", updated.name, updated.id);
    Ok(updated)
}

/// Deletes a budget together with its expenses.
///
/// Goals that lose linked expenses are recalculated afterwards on a
/// best-effort basis.
#[instrument(skip(db))]
pub async fn delete_budget(db: &DatabaseConnection, caller: &Caller, id: i64) -> Result<()> {
    let user_id = caller.require()?;
    let existing = find_owned::<Budget, _>(db, user_id, RESOURCE, id).await?;

    let expenses = Expense::find()
        .filter(expense::Column::BudgetId.eq(id))
        .all(db)
        .await?;
    let affected_goals: BTreeSet<i64> =
        expenses.iter().filter_map(|e| e.financial_goal_id).collect();

    let txn = db.begin().await?;
    Expense::delete_many()
        .filter(expense::Column::BudgetId.eq(id))
        .exec(&txn)
        .await
        .context("Failed to delete budget expenses")?;
    existing.delete(&txn).await.context("Failed to delete budget")?;
    txn.commit().await?;

    info!("Deleted budget {} and {} expenses", id, expenses.len());

    for goal_id in affected_goals {
        goal::recalculate_best_effort(db, goal_id).await;
    }
    Ok(())
}

/// Copies the caller's active master budgets into a month that has no budgets.
///
/// Returns the number of budgets created; zero when the month already had
/// budgets, so repeated calls never duplicate categories.
#[instrument(skip(db))]
pub async fn ensure_default_budgets(
    db: &DatabaseConnection,
    caller: &Caller,
    monthly_overview_id: i64,
) -> Result<usize> {
    let user_id = caller.require()?;
    find_owned::<MonthlyOverview, _>(db, user_id, "monthly overview", monthly_overview_id).await?;
    populate_default_budgets(db, user_id, monthly_overview_id).await
}

pub(crate) async fn populate_default_budgets<C>(
    db: &C,
    user_id: &str,
    monthly_overview_id: i64,
) -> Result<usize>
where
    C: ConnectionTrait,
{
    let existing = Budget::find()
        .filter(budget::Column::UserId.eq(user_id))
        .filter(budget::Column::MonthlyOverviewId.eq(monthly_overview_id))
        .count(db)
        .await?;
    if existing > 0 {
        debug!(
            "Month {} already has {} budgets; skipping defaults",
            monthly_overview_id, existing
        );
        return Ok(0);
    }

    let templates = master_budget::active_templates(db, user_id).await?;
    let now = Utc::now();
    for template in &templates {
        budget::ActiveModel {
            user_id: Set(user_id.to_string()),
            monthly_overview_id: Set(monthly_overview_id),
            name: Set(template.name.clone()),
            budget_amount: Set(template.budget_amount),
            override_amount: Set(None),
            override_reason: Set(None),
            description: Set(template.description.clone()),
            master_budget_id: Set(Some(template.id)),
            created_at: Set(now),
            updated_at: Set(now),
            ..Default::default()
        }
        .insert(db)
        .await
        .context("Failed to copy master budget into month")?;
    }

    info!(
        "Created {} default budgets for month {}",
        templates.len(),
        monthly_overview_id
    );
    Ok(templates.len())
}

/// Looks up a month's budget by exact name.
pub(crate) async fn find_named<C>(
    db: &C,
    user_id: &str,
    monthly_overview_id: i64,
    name: &str,
) -> Result<Option<budget::Model>>
where
    C: ConnectionTrait,
{
    Budget::find()
        .filter(budget::Column::UserId.eq(user_id))
        .filter(budget::Column::MonthlyOverviewId.eq(monthly_overview_id))
        .filter(budget::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Finds the month's budget called `name`, creating it when missing.
///
/// A new budget is copied from the active master budget of the same name when
/// one exists, otherwise it starts at zero with `default_description`.
pub(crate) async fn find_or_create_named<C>(
    db: &C,
    user_id: &str,
    monthly_overview_id: i64,
    name: &str,
    default_description: &str,
) -> Result<budget::Model>
where
    C: ConnectionTrait,
{
    if let Some(found) = find_named(db, user_id, monthly_overview_id, name).await? {
        return Ok(found);
    }

    let template = master_budget::find_active_template_by_name(db, user_id, name).await?;
    let (amount, description, master_id) = match template {
        Some(t) => (t.budget_amount, t.description, Some(t.id)),
        None => (Decimal::ZERO, Some(default_description.to_string()), None),
    };

    let now = Utc::now();
    let created = budget::ActiveModel {
        user_id: Set(user_id.to_string()),
        monthly_overview_id: Set(monthly_overview_id),
        name: Set(name.to_string()),
        budget_amount: Set(amount),
        override_amount: Set(None),
        override_reason: Set(None),
        description: Set(description),
        master_budget_id: Set(master_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .context(format!("Failed to create '{name}' budget"))?;

    info!(
        "Auto-created budget '{}' (ID: {}) in month {}",
        created.name, created.id, monthly_overview_id
    );
    Ok(created)
}

/// Moves a budget's effective allocation by `delta` in a single statement.
///
/// The override amount is adjusted when one is set, otherwise the base amount.
pub(crate) async fn shift_effective_amount<C>(
    db: &C,
    budget: &budget::Model,
    delta: Decimal,
) -> Result<budget::Model>
where
    C: ConnectionTrait,
{
    let column = if budget.override_amount.is_some() {
        budget::Column::OverrideAmount
    } else {
        budget::Column::BudgetAmount
    };

    Budget::update_many()
        .col_expr(column, Expr::col(column).add(delta))
        .col_expr(budget::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(budget::Column::Id.eq(budget.id))
        .exec(db)
        .await
        .context("Failed to move budget allocation")?;

    Budget::find_by_id(budget.id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(RESOURCE, budget.id))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_budget_requires_identity() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let result = create_budget(&db, &Caller::anonymous(), NewBudget::default()).await;
        assert!(matches!(result, Err(Error::Unauthorized)));
        Ok(())
    }

    #[tokio::test]
    async fn test_create_budget_rejects_duplicate_name() -> Result<()> {
        let db = setup_test_db().await?;
        let caller = test_caller();
        let month = create_test_month(&db, &caller).await?;
        create_test_budget(&db, &caller, month.id, "Groceries", Decimal::new(300, 0)).await?;

        let result =
            create_test_budget(&db, &caller, month.id, "  Groceries ", Decimal::new(100, 0)).await;
        assert!(matches!(result, Err(Error::Validation { field: Some("name"), .. })));

        // Exact match only
        create_test_budget(&db, &caller, month.id, "groceries", Decimal::new(100, 0)).await?;
        Ok(())
    }

    #[tokio::test]
    async fn test_create_budget_rejects_duplicate_master_link() -> Result<()> {
        let db = setup_test_db().await?;
        let caller = test_caller();
        let template = create_test_master_budget(&db, &caller, "Rent", Decimal::new(900, 0), 1).await?;
        let month = create_test_month(&db, &caller).await?;

        let result = create_budget(
            &db,
            &caller,
            NewBudget {
                monthly_overview_id: month.id,
                name: "Rent again".to_string(),
                budget_amount: Decimal::new(900, 0),
                master_budget_id: Some(template.id),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(
            result,
            Err(Error::Validation {
                field: Some("master_budget_id"),
                ..
            })
        ));
        Ok(())
    }

    #[tokio::test]
    async fn test_create_budget_override_pair() -> Result<()> {
        let db = setup_test_db().await?;
        let caller = test_caller();
        let month = create_test_month(&db, &caller).await?;

        let result = create_budget(
            &db,
            &caller,
            NewBudget {
                monthly_overview_id: month.id,
                name: "Fuel".to_string(),
                budget_amount: Decimal::new(100, 0),
                override_amount: Some(Decimal::new(150, 0)),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(
            result,
            Err(Error::Validation {
                field: Some("override_reason"),
                ..
            })
        ));

        let created = create_budget(
            &db,
            &caller,
            NewBudget {
                monthly_overview_id: month.id,
                name: "Fuel".to_string(),
                budget_amount: Decimal::new(100, 0),
                override_amount: Some(Decimal::new(150, 0)),
                override_reason: Some("Road trip".to_string()),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(created.effective_amount(), Decimal::new(150, 0));
        Ok(())
    }

    #[tokio::test]
    async fn test_update_budget_clearing_override_clears_reason() -> Result<()> {
        let db = setup_test_db().await?;
        let caller = test_caller();
        let month = create_test_month(&db, &caller).await?;
        let budget = create_test_budget(&db, &caller, month.id, "Fuel", Decimal::new(100, 0)).await?;

        let overridden = update_budget(
            &db,
            &caller,
            budget.id,
            BudgetPatch {
                override_amount: Some(Some(Decimal::new(150, 0))),
                override_reason: Some(Some("Road trip".to_string())),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(overridden.override_reason.as_deref(), Some("Road trip"));

        let cleared = update_budget(
            &db,
            &caller,
            budget.id,
            BudgetPatch {
                override_amount: Some(None),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(cleared.override_amount, None);
        assert_eq!(cleared.override_reason, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_budget_foreign_owner_is_forbidden() -> Result<()> {
        let db = setup_test_db().await?;
        let caller = test_caller();
        let month = create_test_month(&db, &caller).await?;
        let budget = create_test_budget(&db, &caller, month.id, "Fuel", Decimal::new(100, 0)).await?;

        let result = update_budget(
            &db,
            &Caller::user("intruder"),
            budget.id,
            BudgetPatch {
                budget_amount: Some(Decimal::ZERO),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(Error::Forbidden { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_budget_removes_expenses_and_recalculates_goal() -> Result<()> {
        let db = setup_test_db().await?;
        let caller = test_caller();
        let month = create_test_month(&db, &caller).await?;
        let budget = create_test_budget(&db, &caller, month.id, "Car", Decimal::new(500, 0)).await?;
        let goal = create_test_goal(&db, &caller, "New car", Decimal::new(5000, 0), Decimal::new(100, 0)).await?;
        create_test_expense(&db, &caller, budget.id, Decimal::new(50, 0), Some(goal.id)).await?;

        let goal_before = goal::get_goal(&db, &caller, goal.id).await?;
        assert_eq!(goal_before.current_amount, Decimal::new(150, 0));

        delete_budget(&db, &caller, budget.id).await?;

        assert_eq!(Expense::find().count(&db).await?, 0);
        let goal_after = goal::get_goal(&db, &caller, goal.id).await?;
        assert_eq!(goal_after.current_amount, Decimal::new(100, 0));
        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_default_budgets_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let caller = test_caller();
        create_test_master_budget(&db, &caller, "Rent", Decimal::new(900, 0), 2).await?;
        create_test_master_budget(&db, &caller, "Food", Decimal::new(300, 0), 1).await?;

        let month = create_test_month(&db, &caller).await?;
        assert_eq!(get_budgets(&db, &caller, month.id).await?.len(), 2);

        assert_eq!(ensure_default_budgets(&db, &caller, month.id).await?, 0);
        assert_eq!(get_budgets(&db, &caller, month.id).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_find_or_create_named_prefers_template() -> Result<()> {
        let db = setup_test_db().await?;
        let caller = test_caller();
        let month = create_test_month(&db, &caller).await?;
        create_test_master_budget(&db, &caller, "Tithe", Decimal::new(20, 0), 9).await?;

        let tithe = find_or_create_named(&db, TEST_USER, month.id, "Tithe", "default").await?;
        assert_eq!(tithe.budget_amount, Decimal::new(20, 0));
        assert!(tithe.master_budget_id.is_some());

        let other = find_or_create_named(&db, TEST_USER, month.id, "DrawDown", "Goal money").await?;
        assert_eq!(other.budget_amount, Decimal::ZERO);
        assert_eq!(other.description.as_deref(), Some("Goal money"));

        let again = find_or_create_named(&db, TEST_USER, month.id, "Tithe", "default").await?;
        assert_eq!(again.id, tithe.id);
        Ok(())
    }

    #[tokio::test]
    async fn test_shift_effective_amount_targets_override() -> Result<()> {
        let db = setup_test_db().await?;
        let caller = test_caller();
        let month = create_test_month(&db, &caller).await?;
        let plain = create_test_budget(&db, &caller, month.id, "Plain", Decimal::new(100, 0)).await?;
        let overridden = create_budget(
            &db,
            &caller,
            NewBudget {
                monthly_overview_id: month.id,
                name: "Override".to_string(),
                budget_amount: Decimal::new(100, 0),
                override_amount: Some(Decimal::new(80, 0)),
                override_reason: Some("Cut back".to_string()),
                ..Default::default()
            },
        )
        .await?;

        let plain = shift_effective_amount(&db, &plain, Decimal::new(25, 0)).await?;
        assert_eq!(plain.budget_amount, Decimal::new(125, 0));

        let overridden = shift_effective_amount(&db, &overridden, Decimal::new(-30, 0)).await?;
        assert_eq!(overridden.budget_amount, Decimal::new(100, 0));
        assert_eq!(overridden.override_amount, Some(Decimal::new(50, 0)));
        Ok(())
    }
}
