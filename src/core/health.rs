//! Financial health score - A 0-100 rating of one month.
//!
//! The score has three parts: savings rate (up to 40 points), debt-to-income
//! (up to 30) and budget adherence (up to 30). [`score`] is pure;
//! [`calculate_for_month`] gathers its inputs from storage.

use crate::{
    core::{
        access::{Caller, find_owned},
        loan, monthly_overview,
        summary::{self, BudgetSummary},
    },
    entities::MonthlyOverview,
    errors::Result,
};
use rust_decimal::Decimal;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use std::fmt;
use tracing::{debug, instrument};

/// Qualitative band for an overall score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthLabel {
    Excellent,
    VeryGood,
    Good,
    Fair,
    NeedsImprovement,
    Critical,
}

impl HealthLabel {
    /// Band for an overall score.
    #[must_use]
    pub const fn for_score(score: u32) -> Self {
        match score {
            90.. => Self::Excellent,
            75..=89 => Self::VeryGood,
            60..=74 => Self::Good,
            45..=59 => Self::Fair,
            30..=44 => Self::NeedsImprovement,
            _ => Self::Critical,
        }
    }
}

impl fmt::Display for HealthLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Excellent => "Excellent",
            Self::VeryGood => "Very Good",
            Self::Good => "Good",
            Self::Fair => "Fair",
            Self::NeedsImprovement => "Needs Improvement",
            Self::Critical => "Critical",
        };
        f.write_str(label)
    }
}

/// One part of the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ScoreComponent {
    /// Points awarded
    pub score: u32,
    /// Percentage the points were banded from, when it could be computed
    pub raw_value: Option<Decimal>,
}

/// The full score for a month.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct HealthScore {
    /// Sum of the three parts, at most 100
    pub overall: u32,
    pub label: HealthLabel,
    /// Up to 40 points
    pub savings_rate: ScoreComponent,
    /// Up to 30 points
    pub debt_to_income: ScoreComponent,
    /// Up to 30 points
    pub budget_adherence: ScoreComponent,
}

/// `part` as a percentage of `whole`, or `None` when the result overflows.
fn percent_of(part: Decimal, whole: Decimal) -> Option<Decimal> {
    part.checked_div(whole)?.checked_mul(Decimal::ONE_HUNDRED)
}

const UNSCORED: ScoreComponent = ScoreComponent {
    score: 0,
    raw_value: None,
};

fn savings_rate(total_income: Decimal, total_spent: Decimal) -> ScoreComponent {
    if total_income <= Decimal::ZERO {
        return UNSCORED;
    }
    let Some(rate) = total_income
        .checked_sub(total_spent)
        .and_then(|saved| percent_of(saved, total_income))
    else {
        return UNSCORED;
    };
    let score = if rate >= Decimal::from(20) {
        40
    } else if rate >= Decimal::from(15) {
        35
    } else if rate >= Decimal::TEN {
        30
    } else if rate >= Decimal::from(5) {
        20
    } else if rate >= Decimal::ZERO {
        10
    } else {
        0
    };
    ScoreComponent {
        score,
        raw_value: Some(rate.round_dp(2)),
    }
}

fn debt_to_income(total_income: Decimal, monthly_debt: Decimal) -> ScoreComponent {
    if monthly_debt <= Decimal::ZERO {
        return ScoreComponent {
            score: 30,
            raw_value: (total_income > Decimal::ZERO).then_some(Decimal::ZERO),
        };
    }
    if total_income <= Decimal::ZERO {
        return UNSCORED;
    }
    let Some(dti) = percent_of(monthly_debt, total_income) else {
        return UNSCORED;
    };
    let score = if dti <= Decimal::from(15) {
        30
    } else if dti <= Decimal::from(25) {
        25
    } else if dti <= Decimal::from(35) {
        20
    } else if dti <= Decimal::from(43) {
        10
    } else {
        0
    };
    ScoreComponent {
        score,
        raw_value: Some(dti.round_dp(2)),
    }
}

fn adherence(summary: &BudgetSummary) -> Decimal {
    let budgeted = summary.budget.effective_amount();
    let spent = summary.amount_spent;
    if spent <= Decimal::ZERO {
        Decimal::ONE
    } else if budgeted <= Decimal::ZERO {
        Decimal::ZERO
    } else {
        // A ratio too large to represent is well within budget
        budgeted
            .checked_div(spent)
            .map_or(Decimal::ONE, |ratio| ratio.min(Decimal::ONE))
    }
}

fn budget_adherence(budgets: &[BudgetSummary]) -> ScoreComponent {
    if budgets.is_empty() {
        return UNSCORED;
    }
    let total: Decimal = budgets.iter().map(adherence).sum();
    let Some(average) = percent_of(total, Decimal::from(budgets.len())) else {
        return ScoreComponent {
            score: 5,
            raw_value: None,
        };
    };
    let score = if average >= Decimal::from(95) {
        30
    } else if average >= Decimal::from(85) {
        25
    } else if average >= Decimal::from(75) {
        20
    } else if average >= Decimal::from(60) {
        15
    } else if average >= Decimal::from(50) {
        10
    } else {
        5
    };
    ScoreComponent {
        score,
        raw_value: Some(average.round_dp(2)),
    }
}

/// Scores a month from its aggregated figures.
#[must_use]
pub fn score(
    total_income: Decimal,
    total_spent: Decimal,
    monthly_debt: Decimal,
    budgets: &[BudgetSummary],
) -> HealthScore {
    let savings_rate = savings_rate(total_income, total_spent);
    let debt_to_income = debt_to_income(total_income, monthly_debt);
    let budget_adherence = budget_adherence(budgets);
    let overall = savings_rate.score + debt_to_income.score + budget_adherence.score;

    HealthScore {
        overall,
        label: HealthLabel::for_score(overall),
        savings_rate,
        debt_to_income,
        budget_adherence,
    }
}

/// Scores a month the caller owns using its income, spending, budgets and
/// the caller's active loan payments.
#[instrument(skip(db))]
pub async fn calculate_for_month(
    db: &DatabaseConnection,
    caller: &Caller,
    monthly_overview_id: i64,
) -> Result<HealthScore> {
    let user_id = caller.require()?;
    let month = find_owned::<MonthlyOverview, _>(
        db,
        user_id,
        monthly_overview::RESOURCE,
        monthly_overview_id,
    )
    .await?;

    let totals = summary::monthly_summary(db, month).await?;
    let budgets = summary::budget_summaries(db, user_id, monthly_overview_id).await?;
    let debt = loan::monthly_debt_payments(db, user_id).await?;

    let result = score(totals.total_income, totals.total_spent, debt, &budgets);
    debug!(
        "Month {} scored {} ({})",
        monthly_overview_id, result.overall, result.label
    );
    Ok(result)
}
