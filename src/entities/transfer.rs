//! Transfer entity - A balance movement between two budgets, or from a goal
//! into a budget, within one month.

use super::enums::TransferType;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Transfer database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transfers")]
pub struct Model {
    /// Unique identifier for the transfer
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Owning user
    pub user_id: String,
    /// Month the transfer happened in
    pub monthly_overview_id: i64,
    /// Which ledger locations are involved
    pub transfer_type: TransferType,
    /// Positive amount moved
    #[sea_orm(column_type = "Double")]
    pub amount: Decimal,
    /// Day of the transfer
    pub date: Date,
    /// Source budget for `budget_to_budget`
    pub from_budget_id: Option<i64>,
    /// Destination budget
    pub to_budget_id: Option<i64>,
    /// Source goal for goal transfers
    pub from_goal_id: Option<i64>,
    /// Free-form description
    pub description: Option<String>,
    /// When the transfer was recorded
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Transfer and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each transfer belongs to one month
    #[sea_orm(
        belongs_to = "super::monthly_overview::Entity",
        from = "Column::MonthlyOverviewId",
        to = "super::monthly_overview::Column::Id",
        on_delete = "Cascade"
    )]
    MonthlyOverview,
}

impl Related<super::monthly_overview::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MonthlyOverview.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
