//! Subscription business logic - Recurring charges.
//!
//! Active subscriptions count against a month's available income through
//! their monthly-normalised cost.

use crate::{
    core::{
        access::{Caller, find_owned},
        validation,
    },
    entities::{Frequency, Subscription, SubscriptionStatus, subscription},
    errors::{Error, Result, StoreContext},
};
use chrono::{Days, Months, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, QueryOrder, Set, prelude::*};
use tracing::{info, instrument};

const RESOURCE: &str = "subscription";

/// Input for [`create_subscription`].
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub name: String,
    pub amount: Decimal,
    pub frequency: Frequency,
    pub collection_day: Option<i32>,
    pub next_collection_date: Option<NaiveDate>,
}

/// Fields changed by [`update_subscription`]. Clearable fields use `Some(None)`.
#[derive(Debug, Clone, Default)]
pub struct SubscriptionPatch {
    pub name: Option<String>,
    pub amount: Option<Decimal>,
    pub frequency: Option<Frequency>,
    pub status: Option<SubscriptionStatus>,
    pub collection_day: Option<Option<i32>>,
    pub next_collection_date: Option<Option<NaiveDate>>,
}

fn collection_day(day: Option<i32>) -> Result<()> {
    match day {
        Some(day) if !(1..=31).contains(&day) => Err(Error::validation(
            format!("Collection day must be between 1 and 31, got {day}"),
            "collection_day",
        )),
        _ => Ok(()),
    }
}

/// What a subscription costs per month.
#[must_use]
pub fn monthly_cost(subscription: &subscription::Model) -> Decimal {
    subscription.frequency.to_monthly(subscription.amount)
}

/// The collection date one period after `date`.
#[must_use]
pub fn next_collection(date: NaiveDate, frequency: Frequency) -> Option<NaiveDate> {
    match frequency {
        Frequency::Weekly => date.checked_add_days(Days::new(7)),
        Frequency::Fortnightly => date.checked_add_days(Days::new(14)),
        Frequency::Monthly => date.checked_add_months(Months::new(1)),
        Frequency::Quarterly => date.checked_add_months(Months::new(3)),
        Frequency::Yearly => date.checked_add_months(Months::new(12)),
    }
}

/// Monthly cost of every active subscription `user_id` has, to the cent.
pub(crate) async fn active_monthly_cost<C>(db: &C, user_id: &str) -> Result<Decimal>
where
    C: ConnectionTrait,
{
    let active = Subscription::find()
        .filter(subscription::Column::UserId.eq(user_id))
        .filter(subscription::Column::Status.eq(SubscriptionStatus::Active))
        .all(db)
        .await?;
    let total: Decimal = active.iter().map(monthly_cost).sum();
    Ok(total.round_dp(2))
}

/// Creates an active subscription.
#[instrument(skip(db))]
pub async fn create_subscription(
    db: &DatabaseConnection,
    caller: &Caller,
    new: NewSubscription,
) -> Result<subscription::Model> {
    let user_id = caller.require()?;
    let name = validation::required_text(&new.name, "name")?;
    validation::positive_amount(new.amount, "amount")?;
    collection_day(new.collection_day)?;

    let now = Utc::now();
    let created = subscription::ActiveModel {
        user_id: Set(user_id.to_string()),
        name: Set(name),
        amount: Set(new.amount),
        frequency: Set(new.frequency),
        status: Set(SubscriptionStatus::Active),
        collection_day: Set(new.collection_day),
        next_collection_date: Set(new.next_collection_date),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .context("Failed to create subscription")?;

    info!(
        "Created subscription '{}' (ID: {}) at {} {:?}",
        created.name, created.id, created.amount, created.frequency
    );
    Ok(created)
}

/// Retrieves a subscription by ID.
pub async fn get_subscription(
    db: &DatabaseConnection,
    caller: &Caller,
    id: i64,
) -> Result<subscription::Model> {
    let user_id = caller.require()?;
    find_owned::<Subscription, _>(db, user_id, RESOURCE, id).await
}

/// Lists the caller's subscriptions ordered by name.
pub async fn get_subscriptions(
    db: &DatabaseConnection,
    caller: &Caller,
    active_only: bool,
) -> Result<Vec<subscription::Model>> {
    let user_id = caller.require()?;
    let mut query = Subscription::find().filter(subscription::Column::UserId.eq(user_id));
    if active_only {
        query = query.filter(subscription::Column::Status.eq(SubscriptionStatus::Active));
    }
    query
        .order_by_asc(subscription::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Monthly cost of the caller's active subscriptions.
pub async fn total_monthly_cost(db: &DatabaseConnection, caller: &Caller) -> Result<Decimal> {
    let user_id = caller.require()?;
    active_monthly_cost(db, user_id).await
}

/// Applies a patch to a subscription.
#[instrument(skip(db))]
pub async fn update_subscription(
    db: &DatabaseConnection,
    caller: &Caller,
    id: i64,
    patch: SubscriptionPatch,
) -> Result<subscription::Model> {
    let user_id = caller.require()?;
    let existing = find_owned::<Subscription, _>(db, user_id, RESOURCE, id).await?;

    let name = patch
        .name
        .as_deref()
        .map(|n| validation::required_text(n, "name"))
        .transpose()?;
    if let Some(amount) = patch.amount {
        validation::positive_amount(amount, "amount")?;
    }
    if let Some(day) = patch.collection_day {
        collection_day(day)?;
    }

    let mut active_model: subscription::ActiveModel = existing.into();
    if let Some(name) = name {
        active_model.name = Set(name);
    }
    if let Some(amount) = patch.amount {
        active_model.amount = Set(amount);
    }
    if let Some(frequency) = patch.frequency {
        active_model.frequency = Set(frequency);
    }
    if let Some(status) = patch.status {
        active_model.status = Set(status);
    }
    if let Some(day) = patch.collection_day {
        active_model.collection_day = Set(day);
    }
    if let Some(next) = patch.next_collection_date {
        active_model.next_collection_date = Set(next);
    }
    active_model.updated_at = Set(Utc::now());

    let updated = active_model
        .update(db)
        .await
        .context("Failed to update subscription")?;
    info!("Updated subscription '{}' (ID: {})", updated.name, updated.id);
    Ok(updated)
}

/// Moves `next_collection_date` forward by one period.
#[instrument(skip(db))]
pub async fn advance_collection(
    db: &DatabaseConnection,
    caller: &Caller,
    id: i64,
) -> Result<subscription::Model> {
    let user_id = caller.require()?;
    let existing = find_owned::<Subscription, _>(db, user_id, RESOURCE, id).await?;

    let current = existing.next_collection_date.ok_or_else(|| {
        Error::validation(
            format!("Subscription '{}' has no next collection date", existing.name),
            "next_collection_date",
        )
    })?;
    let next = next_collection(current, existing.frequency).ok_or_else(|| {
        Error::validation(
            format!("Cannot advance collection date past {current}"),
            "next_collection_date",
        )
    })?;

    let mut active_model: subscription::ActiveModel = existing.into();
    active_model.next_collection_date = Set(Some(next));
    active_model.updated_at = Set(Utc::now());
    let updated = active_model
        .update(db)
        .await
        .context("Failed to advance subscription")?;
    info!("Subscription {} next collects on {}", updated.id, next);
    Ok(updated)
}

/// Deletes a subscription.
#[instrument(skip(db))]
pub async fn delete_subscription(db: &DatabaseConnection, caller: &Caller, id: i64) -> Result<()> {
    let user_id = caller.require()?;
    let existing = find_owned::<Subscription, _>(db, user_id, RESOURCE, id).await?;
    existing
        .delete(db)
        .await
        .context("Failed to delete subscription")?;
    info!("Deleted subscription {}", id);
    Ok(())
}
