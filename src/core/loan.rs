//! Loan business logic - Debts and the payments made against them.
//!
//! A payment reduces the outstanding balance in the same database
//! transaction that records it. Active loans feed the debt-to-income part of
//! the health score through [`monthly_debt_payments`].

use crate::{
    core::{
        access::{Caller, find_owned},
        validation,
    },
    entities::{Frequency, Loan, LoanPayment, LoanStatus, loan, loan_payment},
    errors::{Error, Result, StoreContext},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument, warn};

const RESOURCE: &str = "loan";

/// Input for [`create_loan`].
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub name: String,
    pub lender: Option<String>,
    pub original_amount: Decimal,
    /// Defaults to `original_amount`
    pub current_balance: Option<Decimal>,
    pub monthly_payment: Decimal,
    pub interest_rate: Decimal,
    pub payment_frequency: Frequency,
    pub start_date: NaiveDate,
}

/// Fields changed by [`update_loan`].
#[derive(Debug, Clone, Default)]
pub struct LoanPatch {
    pub name: Option<String>,
    pub lender: Option<Option<String>>,
    pub monthly_payment: Option<Decimal>,
    pub interest_rate: Option<Decimal>,
    pub payment_frequency: Option<Frequency>,
    pub status: Option<LoanStatus>,
}

/// Input for [`record_payment`].
#[derive(Debug, Clone)]
pub struct NewLoanPayment {
    pub amount: Decimal,
    pub date: NaiveDate,
    pub note: Option<String>,
}

fn balance_within_original(balance: Decimal, original: Decimal) -> Result<()> {
    validation::non_negative_amount(balance, "current_balance")?;
    if balance > original {
        return Err(Error::validation(
            format!("Current balance €{balance:.2} cannot exceed the original amount €{original:.2}"),
            "current_balance",
        ));
    }
    Ok(())
}

/// Scheduled payments on `user_id`'s active loans, per month.
pub(crate) async fn monthly_debt_payments<C>(db: &C, user_id: &str) -> Result<Decimal>
where
    C: ConnectionTrait,
{
    let loans = Loan::find()
        .filter(loan::Column::UserId.eq(user_id))
        .filter(loan::Column::Status.eq(LoanStatus::Active))
        .all(db)
        .await?;
    let total: Decimal = loans
        .iter()
        .map(|l| l.payment_frequency.to_monthly(l.monthly_payment))
        .sum();
    Ok(total.round_dp(2))
}

/// Records a new loan.
#[instrument(skip(db))]
pub async fn create_loan(
    db: &DatabaseConnection,
    caller: &Caller,
    new: NewLoan,
) -> Result<loan::Model> {
    let user_id = caller.require()?;
    let name = validation::required_text(&new.name, "name")?;
    validation::positive_amount(new.original_amount, "original_amount")?;
    let current_balance = new.current_balance.unwrap_or(new.original_amount);
    balance_within_original(current_balance, new.original_amount)?;
    validation::positive_amount(new.monthly_payment, "monthly_payment")?;
    validation::non_negative_amount(new.interest_rate, "interest_rate")?;

    let status = if current_balance.is_zero() {
        LoanStatus::PaidOff
    } else {
        LoanStatus::Active
    };

    let now = Utc::now();
    let created = loan::ActiveModel {
        user_id: Set(user_id.to_string()),
        name: Set(name),
        lender: Set(new.lender),
        original_amount: Set(new.original_amount),
        current_balance: Set(current_balance),
        monthly_payment: Set(new.monthly_payment),
        interest_rate: Set(new.interest_rate),
        payment_frequency: Set(new.payment_frequency),
        start_date: Set(new.start_date),
        status: Set(status),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .context("Failed to create loan")?;

    info!(
        "Created loan '{}' (ID: {}) with balance {}",
        created.name, created.id, created.current_balance
    );
    Ok(created)
}

/// Retrieves a loan by ID.
pub async fn get_loan(db: &DatabaseConnection, caller: &Caller, id: i64) -> Result<loan::Model> {
    let user_id = caller.require()?;
    find_owned::<Loan, _>(db, user_id, RESOURCE, id).await
}

/// Lists the caller's loans ordered by start date.
pub async fn get_loans(db: &DatabaseConnection, caller: &Caller) -> Result<Vec<loan::Model>> {
    let user_id = caller.require()?;
    Loan::find()
        .filter(loan::Column::UserId.eq(user_id))
        .order_by_asc(loan::Column::StartDate)
        .order_by_asc(loan::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Monthly total of the caller's scheduled loan payments.
pub async fn get_monthly_debt_payments(db: &DatabaseConnection, caller: &Caller) -> Result<Decimal> {
    let user_id = caller.require()?;
    monthly_debt_payments(db, user_id).await
}

/// Applies a patch to a loan's terms. The balance only moves through payments.
#[instrument(skip(db))]
pub async fn update_loan(
    db: &DatabaseConnection,
    caller: &Caller,
    id: i64,
    patch: LoanPatch,
) -> Result<loan::Model> {
    let user_id = caller.require()?;
    let existing = find_owned::<Loan, _>(db, user_id, RESOURCE, id).await?;

    let name = patch
        .name
        .as_deref()
        .map(|n| validation::required_text(n, "name"))
        .transpose()?;
    if let Some(payment) = patch.monthly_payment {
        validation::positive_amount(payment, "monthly_payment")?;
    }
    if let Some(rate) = patch.interest_rate {
        validation::non_negative_amount(rate, "interest_rate")?;
    }

    let mut active_model: loan::ActiveModel = existing.into();
    if let Some(name) = name {
        active_model.name = Set(name);
    }
    if let Some(lender) = patch.lender {
        active_model.lender = Set(lender);
    }
    if let Some(payment) = patch.monthly_payment {
        active_model.monthly_payment = Set(payment);
    }
    if let Some(rate) = patch.interest_rate {
        active_model.interest_rate = Set(rate);
    }
    if let Some(frequency) = patch.payment_frequency {
        active_model.payment_frequency = Set(frequency);
    }
    if let Some(status) = patch.status {
        active_model.status = Set(status);
    }
    active_model.updated_at = Set(Utc::now());

    let updated = active_model
        .update(db)
        .await
        .context("Failed to update loan")?;
    info!("Updated loan '{}' (ID: {})", updated.name, updated.id);
    Ok(updated)
}

/// Deletes a loan along with its payment history.
#[instrument(skip(db))]
pub async fn delete_loan(db: &DatabaseConnection, caller: &Caller, id: i64) -> Result<()> {
    let user_id = caller.require()?;
    let existing = find_owned::<Loan, _>(db, user_id, RESOURCE, id).await?;

    let txn = db.begin().await?;
    let payments = LoanPayment::delete_many()
        .filter(loan_payment::Column::LoanId.eq(id))
        .exec(&txn)
        .await
        .context("Failed to delete loan payments")?;
    existing
        .delete(&txn)
        .await
        .context("Failed to delete loan")?;
    txn.commit().await?;

    info!(
        "Deleted loan {} and {} payment(s)",
        id, payments.rows_affected
    );
    Ok(())
}

/// Pays down a loan. The payment cannot exceed the outstanding balance, and
/// a loan paid down to zero is marked paid off.
#[instrument(skip(db))]
pub async fn record_payment(
    db: &DatabaseConnection,
    caller: &Caller,
    loan_id: i64,
    payment: NewLoanPayment,
) -> Result<(loan_payment::Model, loan::Model)> {
    let user_id = caller.require()?;
    validation::positive_amount(payment.amount, "amount")?;
    let existing = find_owned::<Loan, _>(db, user_id, RESOURCE, loan_id).await?;

    if payment.amount > existing.current_balance {
        warn!(
            "Rejected payment of {} on loan '{}' with balance {}",
            payment.amount, existing.name, existing.current_balance
        );
        return Err(Error::validation(
            format!(
                "Payment of €{:.2} exceeds the outstanding balance of '{}' (€{:.2})",
                payment.amount, existing.name, existing.current_balance
            ),
            "amount",
        ));
    }

    let remaining = existing.current_balance - payment.amount;
    let now = Utc::now();

    let txn = db.begin().await?;
    let recorded = loan_payment::ActiveModel {
        user_id: Set(user_id.to_string()),
        loan_id: Set(loan_id),
        amount: Set(payment.amount),
        date: Set(payment.date),
        note: Set(payment.note),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .context("Failed to record loan payment")?;

    let mut active_model: loan::ActiveModel = existing.into();
    active_model.current_balance = Set(remaining);
    if remaining.is_zero() {
        active_model.status = Set(LoanStatus::PaidOff);
    }
    active_model.updated_at = Set(now);
    let updated = active_model
        .update(&txn)
        .await
        .context("Failed to update loan balance")?;
    txn.commit().await?;

    info!(
        "Paid {} on loan '{}' ({} outstanding)",
        recorded.amount, updated.name, updated.current_balance
    );
    Ok((recorded, updated))
}

/// Lists a loan's payments by date.
pub async fn get_payments(
    db: &DatabaseConnection,
    caller: &Caller,
    loan_id: i64,
) -> Result<Vec<loan_payment::Model>> {
    let user_id = caller.require()?;
    find_owned::<Loan, _>(db, user_id, RESOURCE, loan_id).await?;
    LoanPayment::find()
        .filter(loan_payment::Column::LoanId.eq(loan_id))
        .order_by_asc(loan_payment::Column::Date)
        .all(db)
        .await
        .map_err(Into::into)
}
