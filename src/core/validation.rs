//! Pure invariant checks shared by every service.
//!
//! None of these functions touch storage. Each either returns `Ok` or the
//! specific error kind for the violated rule, so services can run them all
//! before the first write.
//!
//! Ceilings are inclusive: a mutation that leaves exactly zero headroom is
//! accepted, anything below zero is rejected.

use crate::errors::{Error, Result};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Checks that `date` falls within `[start, end]` at day granularity.
pub fn date_in_range(date: NaiveDate, start: NaiveDate, end: NaiveDate, label: &str) -> Result<()> {
    if date < start || date > end {
        return Err(Error::DateOutOfRange {
            label: label.to_string(),
            date,
            start,
            end,
        });
    }
    Ok(())
}

/// Checks that adding `new_amount` keeps the budget at or above zero.
///
/// `spent_excluding_this` must not include the record being replaced.
/// Returns the amount left after the write.
pub fn no_overspend(
    budget_name: &str,
    budget_amount: Decimal,
    spent_excluding_this: Decimal,
    new_amount: Decimal,
) -> Result<Decimal> {
    let amount_left = budget_amount - spent_excluding_this - new_amount;
    if amount_left < Decimal::ZERO {
        return Err(Error::Overspending {
            budget_name: budget_name.to_string(),
            budget_amount,
            current_spent: spent_excluding_this,
            attempted_amount: new_amount,
        });
    }
    Ok(amount_left)
}

/// Rejects zero and negative amounts.
pub fn positive_amount(amount: Decimal, field: &'static str) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::validation(
            format!("{} must be greater than zero", field_label(field)),
            field,
        ));
    }
    Ok(())
}

/// Rejects negative amounts.
pub fn non_negative_amount(amount: Decimal, field: &'static str) -> Result<()> {
    if amount < Decimal::ZERO {
        return Err(Error::validation(
            format!("{} cannot be negative", field_label(field)),
            field,
        ));
    }
    Ok(())
}

/// Rejects an end date that precedes the start date. Equal dates are valid.
pub fn date_range_order(start: NaiveDate, end: Option<NaiveDate>) -> Result<()> {
    if let Some(end) = end.filter(|end| *end < start) {
        return Err(Error::validation(
            format!("End date {end} cannot be before start date {start}"),
            "end_date",
        ));
    }
    Ok(())
}

/// Checks a contribution against the month's available income.
///
/// `available` already has every existing contribution subtracted, including
/// `existing_amount` when the contribution is being edited.
pub fn available_income_check(
    available: Decimal,
    existing_amount: Decimal,
    new_amount: Decimal,
) -> Result<()> {
    let headroom = available + existing_amount;
    if new_amount > headroom {
        return Err(Error::validation(
            format!(
                "Contribution of €{new_amount:.2} exceeds available income (available: €{headroom:.2})"
            ),
            "amount",
        ));
    }
    Ok(())
}

/// Checks a withdrawal against a goal's current balance.
///
/// `existing_amount` is the amount of the drawdown being edited, which was
/// already taken out of `current_amount`.
pub fn available_goal_balance_check(
    goal_name: &str,
    current_amount: Decimal,
    existing_amount: Decimal,
    new_amount: Decimal,
) -> Result<()> {
    let headroom = current_amount + existing_amount;
    if new_amount > headroom {
        return Err(Error::validation(
            format!(
                "Withdrawing €{new_amount:.2} exceeds the balance of goal '{goal_name}' (available: €{headroom:.2})"
            ),
            "amount",
        ));
    }
    Ok(())
}

/// Checks that a sub-goal's progress is a percentage.
pub fn progress_in_range(progress: i32) -> Result<()> {
    if !(0..=100).contains(&progress) {
        return Err(Error::validation(
            format!("Progress must be between 0 and 100, got {progress}"),
            "progress",
        ));
    }
    Ok(())
}

/// Trims `value` and rejects it when nothing is left.
pub fn required_text(value: &str, field: &'static str) -> Result<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(Error::validation(
            format!("{} cannot be empty", field_label(field)),
            field,
        ));
    }
    Ok(trimmed.to_string())
}

/// An override amount needs a reason, and a reason needs an override amount.
pub fn override_pair(override_amount: Option<Decimal>, override_reason: Option<&str>) -> Result<()> {
    let has_reason = override_reason.is_some_and(|reason| !reason.trim().is_empty());
    match (override_amount, has_reason) {
        (Some(amount), true) => non_negative_amount(amount, "override_amount"),
        (Some(_), false) => Err(Error::validation(
            "An override reason is required when overriding the budget amount",
            "override_reason",
        )),
        (None, true) => Err(Error::validation(
            "An override reason can only be given with an override amount",
            "override_amount",
        )),
        (None, false) => Ok(()),
    }
}

fn field_label(field: &str) -> String {
    let spaced = field.replace('_', " ");
    let mut chars = spaced.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_date_in_range_inclusive_bounds() {
        assert!(date_in_range(day(1), day(1), day(31), "Expense").is_ok());
        assert!(date_in_range(day(31), day(1), day(31), "Expense").is_ok());

        let before = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let err = date_in_range(before, day(1), day(31), "Expense").unwrap_err();
        assert!(matches!(err, Error::DateOutOfRange { .. }));
        assert_eq!(
            err.to_string(),
            "Expense date 2024-02-29 must be between 2024-03-01 and 2024-03-31"
        );
    }

    #[test]
    fn test_no_overspend_boundary() {
        let left = no_overspend("Food", Decimal::new(100, 0), Decimal::new(60, 0), Decimal::new(40, 0))
            .unwrap();
        assert_eq!(left, Decimal::ZERO);

        let err = no_overspend(
            "Food",
            Decimal::new(100, 0),
            Decimal::new(60, 0),
            Decimal::new(4001, 2),
        )
        .unwrap_err();
        match err {
            Error::Overspending {
                budget_name,
                current_spent,
                attempted_amount,
                ..
            } => {
                assert_eq!(budget_name, "Food");
                assert_eq!(current_spent, Decimal::new(60, 0));
                assert_eq!(attempted_amount, Decimal::new(4001, 2));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_amount_checks() {
        assert!(positive_amount(Decimal::new(1, 2), "amount").is_ok());
        assert!(positive_amount(Decimal::ZERO, "amount").is_err());
        assert!(non_negative_amount(Decimal::ZERO, "budget_amount").is_ok());

        let err = non_negative_amount(Decimal::new(-1, 0), "budget_amount").unwrap_err();
        assert_eq!(err.to_string(), "Budget amount cannot be negative");
    }

    #[test]
    fn test_date_range_order_allows_equal_dates() {
        assert!(date_range_order(day(5), Some(day(5))).is_ok());
        assert!(date_range_order(day(5), None).is_ok());
        assert!(date_range_order(day(5), Some(day(4))).is_err());
    }

    #[test]
    fn test_available_income_check_adds_back_existing() {
        // 300 free before contributions, 100 already contributed
        let available = Decimal::new(200, 0);
        let existing = Decimal::new(100, 0);
        assert!(available_income_check(available, existing, Decimal::new(350, 0)).is_err());
        assert!(available_income_check(available, existing, Decimal::new(300, 0)).is_ok());
        assert!(available_income_check(available, Decimal::ZERO, Decimal::new(201, 0)).is_err());
    }

    #[test]
    fn test_available_goal_balance_check() {
        let current = Decimal::new(200, 0);
        assert!(available_goal_balance_check("Car", current, Decimal::ZERO, Decimal::new(250, 0)).is_err());
        assert!(available_goal_balance_check("Car", current, Decimal::ZERO, current).is_ok());
        assert!(available_goal_balance_check("Car", Decimal::ZERO, Decimal::new(50, 0), Decimal::new(50, 0)).is_ok());
    }

    #[test]
    fn test_override_pair() {
        assert!(override_pair(None, None).is_ok());
        assert!(override_pair(Some(Decimal::new(50, 0)), Some("Holiday")).is_ok());
        assert!(override_pair(Some(Decimal::new(50, 0)), Some("  ")).is_err());
        assert!(override_pair(None, Some("Holiday")).is_err());
        assert!(override_pair(Some(Decimal::new(-5, 0)), Some("Holiday")).is_err());
    }

    #[test]
    fn test_required_text_trims() {
        assert_eq!(required_text("  Rent ", "name").unwrap(), "Rent");
        assert!(required_text("   ", "name").is_err());
    }

    #[test]
    fn test_progress_in_range() {
        assert!(progress_in_range(0).is_ok());
        assert!(progress_in_range(100).is_ok());
        assert!(progress_in_range(101).is_err());
        assert!(progress_in_range(-1).is_err());
    }
}
