//! Loan entity - An outstanding debt paid down through loan payments.

use super::enums::{Frequency, LoanStatus};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Loan database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "loans")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub user_id: String,
    pub name: String,
    pub lender: Option<String>,
    #[sea_orm(column_type = "Double")]
    pub original_amount: Decimal,
    /// Outstanding balance, between zero and `original_amount`
    #[sea_orm(column_type = "Double")]
    pub current_balance: Decimal,
    /// Scheduled payment per `payment_frequency` period
    #[sea_orm(column_type = "Double")]
    pub monthly_payment: Decimal,
    /// Annual interest rate in percent
    #[sea_orm(column_type = "Double")]
    pub interest_rate: Decimal,
    pub payment_frequency: Frequency,
    pub start_date: Date,
    pub status: LoanStatus,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One loan has many payments
    #[sea_orm(has_many = "super::loan_payment::Entity")]
    Payments,
}

impl Related<super::loan_payment::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
