//! Income source entity - Money received during a month.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Income source database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "income_sources")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: String,
    pub monthly_overview_id: i64,
    /// Positive amount received
    #[sea_orm(column_type = "Double")]
    pub amount: Decimal,
    /// Where the money came from (e.g. "Salary")
    pub source: String,
    /// Who received it
    pub person: Option<String>,
    pub date_paid: Date,
    /// Whether tithe and offering are allocated from this income
    pub tithe_deduction: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
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
