//! Unified error type for the ledger engine.
//!
//! Every service returns [`Result`]. Validation failures are raised before any
//! write happens; store failures are wrapped with context and re-raised.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use sea_orm::DbErr;
use thiserror::Error;

/// All errors the ledger engine can surface to its callers.
#[derive(Debug, Error)]
pub enum Error {
    /// No resolved caller identity was supplied
    #[error("You must be signed in to do that")]
    Unauthorized,

    /// The row exists but belongs to another user
    #[error("You do not have access to {resource} {id}")]
    Forbidden {
        /// Kind of resource (e.g. `"budget"`)
        resource: &'static str,
        /// Primary key that was requested
        id: i64,
    },

    /// The referenced row does not exist
    #[error("{resource} {id} was not found")]
    NotFound {
        /// Kind of resource (e.g. `"budget"`)
        resource: &'static str,
        /// Primary key that was requested
        id: i64,
    },

    /// A structural invariant was violated
    #[error("{message}")]
    Validation {
        /// End-user message
        message: String,
        /// Offending field, when one can be named
        field: Option<&'static str>,
    },

    /// A date falls outside its owning period
    #[error("{label} date {date} must be between {start} and {end}")]
    DateOutOfRange {
        /// What the date belongs to (e.g. `"Expense"`)
        label: String,
        /// The rejected date
        date: NaiveDate,
        /// First day of the period
        start: NaiveDate,
        /// Last day of the period
        end: NaiveDate,
    },

    /// The write would drive a budget below zero
    #[error(
        "Spending €{attempted_amount:.2} would overspend budget '{budget_name}' (available: €{available:.2})",
        available = remaining(.budget_amount, .current_spent)
    )]
    Overspending {
        /// Name of the budget that would be overspent
        budget_name: String,
        /// Effective amount allocated to the budget
        budget_amount: Decimal,
        /// Amount already spent, excluding the record being replaced
        current_spent: Decimal,
        /// Amount the caller tried to add
        attempted_amount: Decimal,
    },

    /// Configuration could not be loaded
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },

    /// Unexpected store failure
    #[error("Database error: {0}")]
    Database(#[from] DbErr),

    /// Store failure wrapped with the operation that caused it
    #[error("{context}: {source}")]
    Store {
        /// The operation that failed
        context: String,
        /// Underlying store error
        #[source]
        source: DbErr,
    },
}

fn remaining(budget_amount: &Decimal, current_spent: &Decimal) -> Decimal {
    budget_amount - current_spent
}

impl Error {
    /// Builds a [`Error::Validation`] for a specific field.
    pub fn validation(message: impl Into<String>, field: &'static str) -> Self {
        Self::Validation {
            message: message.into(),
            field: Some(field),
        }
    }

    /// Builds a [`Error::NotFound`].
    #[must_use]
    pub const fn not_found(resource: &'static str, id: i64) -> Self {
        Self::NotFound { resource, id }
    }

    /// Stable machine-checkable code for programmatic handling.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized => "UNAUTHORIZED",
            Self::Forbidden { .. } => "FORBIDDEN",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Validation { .. } => "VALIDATION",
            Self::DateOutOfRange { .. } => "DATE_OUT_OF_RANGE",
            Self::Overspending { .. } => "OVERSPENDING",
            Self::Config { .. } => "CONFIG",
            Self::Database(_) | Self::Store { .. } => "STORE",
        }
    }
}

/// Attaches operation context to raw store errors.
pub trait StoreContext<T> {
    /// Wraps a [`DbErr`] into [`Error::Store`] with the given context.
    fn context(self, context: impl Into<String>) -> Result<T>;
}

impl<T> StoreContext<T> for std::result::Result<T, DbErr> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|source| Error::Store {
            context: context.into(),
            source,
        })
    }
}

// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;
