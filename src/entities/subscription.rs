//! Subscription entity - A recurring charge that reduces available income.

use super::enums::{Frequency, SubscriptionStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Subscription database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "subscriptions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: String,
    pub name: String,
    /// Amount charged per `frequency` period
    #[sea_orm(column_type = "Double")]
    pub amount: Decimal,
    pub frequency: Frequency,
    pub status: SubscriptionStatus,
    /// Day of month the charge is collected, in `[1, 31]`
    pub collection_day: Option<i32>,
    pub next_collection_date: Option<Date>,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
