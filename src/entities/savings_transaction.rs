//! Savings transaction entity - A deposit into or withdrawal from a bucket.

use super::enums::SavingsTransactionKind;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "savings_transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: String,
    pub savings_bucket_id: i64,
    pub kind: SavingsTransactionKind,
    #[sea_orm(column_type = "Double")]
    pub amount: Decimal,
    pub date: Date,
    pub note: Option<String>,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::savings_bucket::Entity",
        from = "Column::SavingsBucketId",
        to = "super::savings_bucket::Column::Id",
        on_delete = "Cascade"
    )]
    SavingsBucket,
}

impl Related<super::savings_bucket::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::SavingsBucket.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
