//! Core business logic module - Framework-agnostic ledger rules.
//!
//! Every service function takes a database connection and the [`access::Caller`]
//! it runs for, validates the proposed change completely, then writes.
//! Secondary rebalancing (goal balances, tithe budgets) is best-effort and
//! logged rather than propagated.

pub mod access;
pub mod budget;
pub mod contribution;
pub mod drawdown;
pub mod expense;
pub mod goal;
pub mod health;
pub mod income;
pub mod loan;
pub mod master_budget;
pub mod monthly_overview;
pub mod savings;
pub mod subscription;
pub mod summary;
pub mod transfer;
pub mod validation;
