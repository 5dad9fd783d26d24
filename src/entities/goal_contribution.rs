//! Goal contribution entity - Money moved from a month's income into a goal.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "goal_contributions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: String,
    pub financial_goal_id: i64,
    pub monthly_overview_id: i64,
    #[sea_orm(column_type = "Double")]
    pub amount: Decimal,
    pub date: Date,
    pub note: Option<String>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::financial_goal::Entity",
        from = "Column::FinancialGoalId",
        to = "super::financial_goal::Column::Id",
        on_delete = "Cascade"
    )]
    FinancialGoal,
    #[sea_orm(
        belongs_to = "super::monthly_overview::Entity",
        from = "Column::MonthlyOverviewId",
        to = "super::monthly_overview::Column::Id",
        on_delete = "Cascade"
    )]
    MonthlyOverview,
}

impl Related<super::financial_goal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FinancialGoal.def()
    }
}

impl Related<super::monthly_overview::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MonthlyOverview.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
