//! Financial sub-goal entity - One tracked step of a larger goal.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Financial sub-goal database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "financial_sub_goals")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: String,
    pub financial_goal_id: i64,
    pub name: String,
    /// Completion percentage in `[0, 100]`
    pub progress: i32,
    #[sea_orm(column_type = "Double", nullable)]
    pub estimated_cost: Option<Decimal>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
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
}

impl Related<super::financial_goal::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::FinancialGoal.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
