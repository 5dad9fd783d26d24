//! Master budget entity - A reusable category template.
//!
//! Active master budgets are copied into every new month's budgets.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Master budget database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "master_budgets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: String,
    pub name: String,
    /// Baseline amount copied into each month
    #[sea_orm(column_type = "Double")]
    pub budget_amount: Decimal,
    pub description: Option<String>,
    /// Inactive templates are skipped when a month is populated
    pub is_active: bool,
    /// Sort key for listing and copying
    pub display_order: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Budgets copied from this template
    #[sea_orm(has_many = "super::budget::Entity")]
    Budgets,
}

impl Related<super::budget::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Budgets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
