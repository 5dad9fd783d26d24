//! Financial goal entity - A savings target with a reconciled balance.
//!
//! `current_amount` is always `base_amount` plus the sum of linked expense
//! amounts. Rows written before `base_amount` existed carry `None` there and
//! are migrated on their first recalculation.

use super::enums::GoalStatus;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Financial goal database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "financial_goals")]
pub struct Model {
    /// Unique identifier for the goal
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user
    pub user_id: String,
    /// Goal name
    pub name: String,
    /// Free-form description
    pub description: Option<String>,
    /// Amount the goal is aiming for
    #[sea_orm(column_type = "Double")]
    pub target_amount: Decimal,
    /// Manually maintained part of the balance
    #[sea_orm(column_type = "Double", nullable)]
    pub base_amount: Option<Decimal>,
    /// Reconciled balance
    #[sea_orm(column_type = "Double")]
    pub current_amount: Decimal,
    /// When saving started
    pub start_date: Date,
    /// Optional deadline
    pub end_date: Option<Date>,
    /// Lifecycle status
    pub status: GoalStatus,
    /// Whether the goal is split into sub-goals
    pub has_sub_goals: bool,
    /// When the goal was created
    pub created_at: DateTimeUtc,
    /// When the goal was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `FinancialGoal` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One goal has many sub-goals
    #[sea_orm(has_many = "super::financial_sub_goal::Entity")]
    SubGoals,
    /// One goal has many linked expenses
    #[sea_orm(has_many = "super::expense::Entity")]
    Expenses,
    /// One goal has many contributions
    #[sea_orm(has_many = "super::goal_contribution::Entity")]
    Contributions,
    /// One goal has many drawdowns
    #[sea_orm(has_many = "super::goal_drawdown::Entity")]
    Drawdowns,
}

impl Related<super::financial_sub_goal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SubGoals.def()
    }
}

impl Related<super::expense::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Expenses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
