//! Closed value sets stored as strings.
//!
//! Enumerated fields that the ledger rules care about are stored through
//! `DeriveActiveEnum` so invalid values cannot reach the services.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// How money moves in a [`super::transfer`] row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum TransferType {
    /// Allocation moves from one budget to another in the same month
    #[sea_orm(string_value = "budget_to_budget")]
    BudgetToBudget,
    /// A goal's balance funds a budget
    #[sea_orm(string_value = "goal_to_budget")]
    GoalToBudget,
    /// A goal's balance funds the month's `DrawDown` budget
    #[sea_orm(string_value = "goal_drawdown")]
    GoalDrawdown,
}

/// Lifecycle of a financial goal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(15))")]
#[serde(rename_all = "snake_case")]
pub enum GoalStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "paused")]
    Paused,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

/// Lifecycle of a loan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(15))")]
#[serde(rename_all = "snake_case")]
pub enum LoanStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "paid_off")]
    PaidOff,
    #[sea_orm(string_value = "defaulted")]
    Defaulted,
}

/// Lifecycle of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(15))")]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "paused")]
    Paused,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

/// Repeat period shared by loans, subscriptions and recurring expenses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(15))")]
#[serde(rename_all = "snake_case")]
pub enum Frequency {
    #[sea_orm(string_value = "weekly")]
    Weekly,
    #[sea_orm(string_value = "fortnightly")]
    Fortnightly,
    #[sea_orm(string_value = "monthly")]
    Monthly,
    #[sea_orm(string_value = "quarterly")]
    Quarterly,
    #[sea_orm(string_value = "yearly")]
    Yearly,
}

impl Frequency {
    /// Converts an amount charged once per period into its monthly equivalent.
    #[must_use]
    pub fn to_monthly(self, amount: Decimal) -> Decimal {
        match self {
            Self::Weekly => amount * Decimal::from(52) / Decimal::from(12),
            Self::Fortnightly => amount * Decimal::from(26) / Decimal::from(12),
            Self::Monthly => amount,
            Self::Quarterly => amount / Decimal::from(3),
            Self::Yearly => amount / Decimal::from(12),
        }
    }
}

/// Direction of a savings bucket movement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "snake_case")]
pub enum SavingsTransactionKind {
    #[sea_orm(string_value = "deposit")]
    Deposit,
    #[sea_orm(string_value = "withdrawal")]
    Withdrawal,
}
