//! Derived aggregation - Budget and monthly summaries.
//!
//! Summaries are computed from the current rows on every call, so they always
//! reflect the latest write. Services load a summary before validating any
//! mutation that depends on "current state".

use crate::{
    core::subscription,
    entities::{
        Budget, Expense, GoalContribution, GoalDrawdown, IncomeSource, budget, expense,
        goal_contribution, goal_drawdown, income_source, monthly_overview,
    },
    errors::Result,
};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, QueryOrder, prelude::*};
use serde::Serialize;
use std::collections::HashMap;

/// A budget together with its spending figures.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BudgetSummary {
    /// The budget row
    pub budget: budget::Model,
    /// Sum of expenses charged to the budget
    pub amount_spent: Decimal,
    /// Effective amount minus `amount_spent`
    pub amount_left: Decimal,
    /// Share of the effective amount already spent, in percent
    pub percent_used: Decimal,
}

impl BudgetSummary {
    /// Builds the summary for a budget with `amount_spent` already known.
    #[must_use]
    pub fn new(budget: budget::Model, amount_spent: Decimal) -> Self {
        let allocated = budget.effective_amount();
        let amount_left = allocated - amount_spent;
        let percent_used = if allocated > Decimal::ZERO {
            (amount_spent / allocated * Decimal::ONE_HUNDRED).round_dp(2)
        } else if amount_spent > Decimal::ZERO {
            Decimal::ONE_HUNDRED
        } else {
            Decimal::ZERO
        };

        Self {
            budget,
            amount_spent,
            amount_left,
            percent_used,
        }
    }
}

/// Month-level totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MonthlyOverviewSummary {
    /// The month row
    pub overview: monthly_overview::Model,
    /// Sum of income sources
    pub total_income: Decimal,
    /// Sum of effective budget amounts
    pub total_budgeted: Decimal,
    /// Sum of expenses across the month's budgets
    pub total_spent: Decimal,
    /// Monthly cost of active subscriptions
    pub total_subscriptions: Decimal,
    /// Sum of goal contributions made in the month
    pub total_contributions: Decimal,
    /// Sum of goal drawdowns made in the month
    pub total_drawdowns: Decimal,
    /// Income not yet budgeted, subscribed or contributed
    pub available_income: Decimal,
}

/// Sum of expenses charged to `budget_id`.
pub async fn amount_spent<C>(db: &C, budget_id: i64) -> Result<Decimal>
where
    C: ConnectionTrait,
{
    let expenses = Expense::find()
        .filter(expense::Column::BudgetId.eq(budget_id))
        .all(db)
        .await?;
    Ok(expenses.iter().map(|e| e.amount).sum())
}

/// Summary for a single budget row.
pub async fn budget_summary<C>(db: &C, budget: budget::Model) -> Result<BudgetSummary>
where
    C: ConnectionTrait,
{
    let spent = amount_spent(db, budget.id).await?;
    Ok(BudgetSummary::new(budget, spent))
}

/// Summaries for every budget in a month, ordered by name.
pub async fn budget_summaries<C>(
    db: &C,
    user_id: &str,
    monthly_overview_id: i64,
) -> Result<Vec<BudgetSummary>>
where
    C: ConnectionTrait,
{
    let budgets = Budget::find()
        .filter(budget::Column::UserId.eq(user_id))
        .filter(budget::Column::MonthlyOverviewId.eq(monthly_overview_id))
        .order_by_asc(budget::Column::Name)
        .all(db)
        .await?;

    let budget_ids: Vec<i64> = budgets.iter().map(|b| b.id).collect();
    let expenses = Expense::find()
        .filter(expense::Column::UserId.eq(user_id))
        .filter(expense::Column::BudgetId.is_in(budget_ids))
        .all(db)
        .await?;

    let mut spent_by_budget: HashMap<i64, Decimal> = HashMap::new();
    for expense in &expenses {
        *spent_by_budget.entry(expense.budget_id).or_default() += expense.amount;
    }

    Ok(budgets
        .into_iter()
        .map(|b| {
            let spent = spent_by_budget.get(&b.id).copied().unwrap_or_default();
            BudgetSummary::new(b, spent)
        })
        .collect())
}

/// Totals for a month the caller already owns.
pub async fn monthly_summary<C>(
    db: &C,
    overview: monthly_overview::Model,
) -> Result<MonthlyOverviewSummary>
where
    C: ConnectionTrait,
{
    let user_id = overview.user_id.as_str();

    let incomes = IncomeSource::find()
        .filter(income_source::Column::UserId.eq(user_id))
        .filter(income_source::Column::MonthlyOverviewId.eq(overview.id))
        .all(db)
        .await?;
    let total_income: Decimal = incomes.iter().map(|i| i.amount).sum();

    let summaries = budget_summaries(db, user_id, overview.id).await?;
    let total_budgeted: Decimal = summaries.iter().map(|s| s.budget.effective_amount()).sum();
    let total_spent: Decimal = summaries.iter().map(|s| s.amount_spent).sum();

    let contributions = GoalContribution::find()
        .filter(goal_contribution::Column::UserId.eq(user_id))
        .filter(goal_contribution::Column::MonthlyOverviewId.eq(overview.id))
        .all(db)
        .await?;
    let total_contributions: Decimal = contributions.iter().map(|c| c.amount).sum();

    let drawdowns = GoalDrawdown::find()
        .filter(goal_drawdown::Column::UserId.eq(user_id))
        .filter(goal_drawdown::Column::MonthlyOverviewId.eq(overview.id))
        .all(db)
        .await?;
    let total_drawdowns: Decimal = drawdowns.iter().map(|d| d.amount).sum();

    let total_subscriptions = subscription::active_monthly_cost(db, user_id).await?;

    let available_income = total_income - total_budgeted - total_subscriptions - total_contributions;

    Ok(MonthlyOverviewSummary {
        overview,
        total_income,
        total_budgeted,
        total_spent,
        total_subscriptions,
        total_contributions,
        total_drawdowns,
        available_income,
    })
}
