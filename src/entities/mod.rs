//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.
//! Every row carries the `user_id` of its owner.

pub mod budget;
pub mod enums;
pub mod expense;
pub mod financial_goal;
pub mod financial_sub_goal;
pub mod goal_contribution;
pub mod goal_drawdown;
pub mod income_source;
pub mod loan;
pub mod loan_payment;
pub mod master_budget;
pub mod monthly_overview;
pub mod savings_bucket;
pub mod savings_transaction;
pub mod subscription;
pub mod transfer;

// Re-export specific types to avoid conflicts
pub use budget::{Column as BudgetColumn, Entity as Budget, Model as BudgetModel};
pub use enums::{
    Frequency, GoalStatus, LoanStatus, SavingsTransactionKind, SubscriptionStatus, TransferType,
};
pub use expense::{Column as ExpenseColumn, Entity as Expense, Model as ExpenseModel};
pub use financial_goal::{
    Column as FinancialGoalColumn, Entity as FinancialGoal, Model as FinancialGoalModel,
};
pub use financial_sub_goal::{
    Column as FinancialSubGoalColumn, Entity as FinancialSubGoal, Model as FinancialSubGoalModel,
};
pub use goal_contribution::{
    Column as GoalContributionColumn, Entity as GoalContribution, Model as GoalContributionModel,
};
pub use goal_drawdown::{
    Column as GoalDrawdownColumn, Entity as GoalDrawdown, Model as GoalDrawdownModel,
};
pub use income_source::{
    Column as IncomeSourceColumn, Entity as IncomeSource, Model as IncomeSourceModel,
};
pub use loan::{Column as LoanColumn, Entity as Loan, Model as LoanModel};
pub use loan_payment::{Column as LoanPaymentColumn, Entity as LoanPayment, Model as LoanPaymentModel};
pub use master_budget::{
    Column as MasterBudgetColumn, Entity as MasterBudget, Model as MasterBudgetModel,
};
pub use monthly_overview::{
    Column as MonthlyOverviewColumn, Entity as MonthlyOverview, Model as MonthlyOverviewModel,
};
pub use savings_bucket::{
    Column as SavingsBucketColumn, Entity as SavingsBucket, Model as SavingsBucketModel,
};
pub use savings_transaction::{
    Column as SavingsTransactionColumn, Entity as SavingsTransaction,
    Model as SavingsTransactionModel,
};
pub use subscription::{
    Column as SubscriptionColumn, Entity as Subscription, Model as SubscriptionModel,
};
pub use transfer::{Column as TransferColumn, Entity as Transfer, Model as TransferModel};
