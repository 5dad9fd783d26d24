//! Expense entity - Money spent against a budget.
//!
//! An expense may also be linked to a financial goal, in which case its amount
//! counts toward the goal's `current_amount`.

use super::enums::Frequency;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Expense database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "expenses")]
pub struct Model {
    /// Unique identifier for the expense
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user
    pub user_id: String,
    /// Budget this expense is charged to
    pub budget_id: i64,
    /// Positive amount spent
    #[sea_orm(column_type = "Double")]
    pub amount: Decimal,
    /// Human-readable description
    pub description: String,
    /// Day the money was spent
    pub date: Date,
    /// Goal this expense counts toward
    pub financial_goal_id: Option<i64>,
    /// Whether the expense repeats
    pub is_recurring: bool,
    /// Repeat period, required when `is_recurring`
    pub recurring_frequency: Option<Frequency>,
    /// Payment method label from settings
    pub payment_method: Option<String>,
    /// Person label from settings
    pub person: Option<String>,
    /// When the expense was recorded
    pub created_at: DateTimeUtc,
    /// When the expense was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Expense and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each expense belongs to one budget
    #[sea_orm(
        belongs_to = "super::budget::Entity",
        from = "Column::BudgetId",
        to = "super::budget::Column::Id",
        on_delete = "Cascade"
    )]
    Budget,
    /// Each expense may count toward one goal
    #[sea_orm(
        belongs_to = "super::financial_goal::Entity",
        from = "Column::FinancialGoalId",
        to = "super::financial_goal::Column::Id",
        on_delete = "SetNull"
    )]
    FinancialGoal,
}

impl Related<super::budget::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Budget.def()
    }
}

impl Related<super::financial_goal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FinancialGoal.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
