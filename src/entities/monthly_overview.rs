//! Monthly overview entity - A budgeting period owned by one user.
//!
//! Budgets, income sources, goal contributions/drawdowns and transfers are all
//! scoped to a monthly overview and are removed with it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Monthly overview database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "monthly_overviews")]
pub struct Model {
    /// Unique identifier for the period
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user
    pub user_id: String,
    /// Display name (e.g. "March 2024")
    pub name: String,
    /// First day of the period (inclusive)
    pub start_date: Date,
    /// Last day of the period (inclusive)
    pub end_date: Date,
    /// When the period was created
    pub created_at: DateTimeUtc,
    /// When the period was last modified
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between `MonthlyOverview` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One period has many budgets
    #[sea_orm(has_many = "super::budget::Entity")]
    Budgets,
    /// One period has many income sources
    #[sea_orm(has_many = "super::income_source::Entity")]
    IncomeSources,
    /// One period has many goal contributions
    #[sea_orm(has_many = "super::goal_contribution::Entity")]
    GoalContributions,
    /// One period has many goal drawdowns
    #[sea_orm(has_many = "super::goal_drawdown::Entity")]
    GoalDrawdowns,
    /// One period has many transfers
    #[sea_orm(has_many = "super::transfer::Entity")]
    Transfers,
}

impl Related<super::budget::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Budgets.def()
    }
}

impl Related<super::income_source::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::IncomeSources.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
