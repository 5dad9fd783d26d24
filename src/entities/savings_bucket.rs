//! Savings bucket entity - A pot of saved money, optionally mirroring a goal.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Savings bucket database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "savings_buckets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: String,
    pub name: String,
    #[sea_orm(column_type = "Double", nullable)]
    pub target_amount: Option<Decimal>,
    #[sea_orm(column_type = "Double")]
    pub current_amount: Decimal,
    /// Goal this bucket mirrors
    pub linked_goal_id: Option<i64>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One bucket has many deposits and withdrawals
    #[sea_orm(has_many = "super::savings_transaction::Entity")]
    Transactions,
}

impl Related<super::savings_transaction::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Transactions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
