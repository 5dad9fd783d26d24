//! Budget entity - A named spending category with an allocation for one month.
//!
//! `override_amount`, when set, replaces `budget_amount` as the effective
//! allocation and must come with an `override_reason`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Budget database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "budgets")]
pub struct Model {
    /// Unique identifier for the budget
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user
    pub user_id: String,
    /// Month this budget belongs to
    pub monthly_overview_id: i64,
    /// Category name, unique within the month
    pub name: String,
    /// Allocated amount
    #[sea_orm(column_type = "Double")]
    pub budget_amount: Decimal,
    /// Month-specific replacement for `budget_amount`
    #[sea_orm(column_type = "Double", nullable)]
    pub override_amount: Option<Decimal>,
    /// Why the override was applied
    pub override_reason: Option<String>,
    /// Free-form description
    pub description: Option<String>,
    /// Template this budget was copied from
    pub master_budget_id: Option<i64>,
    /// When the budget was created
    pub created_at: DateTimeUtc,
    /// When the budget was last modified
    pub updated_at: DateTimeUtc,
}

impl Model {
    /// The allocation expenses are checked against.
    #[must_use]
    pub fn effective_amount(&self) -> Decimal {
        self.override_amount.unwrap_or(self.budget_amount)
    }
}

/// Defines relationships between Budget and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each budget belongs to one month
    #[sea_orm(
        belongs_to = "super::monthly_overview::Entity",
        from = "Column::MonthlyOverviewId",
        to = "super::monthly_overview::Column::Id",
        on_delete = "Cascade"
    )]
    MonthlyOverview,
    /// Each budget may be copied from a template
    #[sea_orm(
        belongs_to = "super::master_budget::Entity",
        from = "Column::MasterBudgetId",
        to = "super::master_budget::Column::Id",
        on_delete = "SetNull"
    )]
    MasterBudget,
    /// One budget has many expenses
    #[sea_orm(has_many = "super::expense::Entity")]
    Expenses,
}

impl Related<super::monthly_overview::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MonthlyOverview.def()
    }
}

impl Related<super::master_budget::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MasterBudget.def()
    }
}

impl Related<super::expense::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
