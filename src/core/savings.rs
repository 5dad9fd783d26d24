//! Savings bucket business logic - Pots of money outside the monthly plan.
//!
//! Every deposit and withdrawal is kept as a savings transaction row written
//! together with the bucket balance.

use crate::{
    core::{
        access::{Caller, find_owned},
        goal, validation,
    },
    entities::{
        FinancialGoal, SavingsBucket, SavingsTransaction, SavingsTransactionKind, savings_bucket,
        savings_transaction,
    },
    errors::{Error, Result, StoreContext},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument, warn};

const RESOURCE: &str = "savings bucket";

/// Input for [`create_bucket`].
#[derive(Debug, Clone, Default)]
pub struct NewSavingsBucket {
    pub name: String,
    pub target_amount: Option<Decimal>,
    pub linked_goal_id: Option<i64>,
}

/// Fields changed by [`update_bucket`]. Clearable fields use `Some(None)`.
#[derive(Debug, Clone, Default)]
pub struct SavingsBucketPatch {
    pub name: Option<String>,
    pub target_amount: Option<Option<Decimal>>,
    pub linked_goal_id: Option<Option<i64>>,
}

/// A deposit or withdrawal request.
#[derive(Debug, Clone)]
pub struct SavingsMovement {
    pub amount: Decimal,
    pub date: NaiveDate,
    pub note: Option<String>,
}

async fn check_links(
    db: &DatabaseConnection,
    user_id: &str,
    target_amount: Option<Decimal>,
    linked_goal_id: Option<i64>,
) -> Result<()> {
    if let Some(target) = target_amount {
        validation::non_negative_amount(target, "target_amount")?;
    }
    if let Some(goal_id) = linked_goal_id {
        find_owned::<FinancialGoal, _>(db, user_id, goal::RESOURCE, goal_id).await?;
    }
    Ok(())
}

/// Creates an empty savings bucket.
#[instrument(skip(db))]
pub async fn create_bucket(
    db: &DatabaseConnection,
    caller: &Caller,
    new: NewSavingsBucket,
) -> Result<savings_bucket::Model> {
    let user_id = caller.require()?;
    let name = validation::required_text(&new.name, "name")?;
    check_links(db, user_id, new.target_amount, new.linked_goal_id).await?;

    let now = Utc::now();
    let created = savings_bucket::ActiveModel {
        user_id: Set(user_id.to_string()),
        name: Set(name),
        target_amount: Set(new.target_amount),
        current_amount: Set(Decimal::ZERO),
        linked_goal_id: Set(new.linked_goal_id),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await
    .context("Failed to create savings bucket")?;

    info!("Created savings bucket '{}' (ID: {})", created.name, created.id);
    Ok(created)
}

/// Retrieves a bucket by ID.
pub async fn get_bucket(
    db: &DatabaseConnection,
    caller: &Caller,
    id: i64,
) -> Result<savings_bucket::Model> {
    let user_id = caller.require()?;
    find_owned::<SavingsBucket, _>(db, user_id, RESOURCE, id).await
}

/// Lists the caller's buckets ordered by name.
pub async fn get_buckets(
    db: &DatabaseConnection,
    caller: &Caller,
) -> Result<Vec<savings_bucket::Model>> {
    let user_id = caller.require()?;
    SavingsBucket::find()
        .filter(savings_bucket::Column::UserId.eq(user_id))
        .order_by_asc(savings_bucket::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Applies a patch to a bucket. The balance only moves through deposits and
/// withdrawals.
#[instrument(skip(db))]
pub async fn update_bucket(
    db: &DatabaseConnection,
    caller: &Caller,
    id: i64,
    patch: SavingsBucketPatch,
) -> Result<savings_bucket::Model> {
    let user_id = caller.require()?;
    let existing = find_owned::<SavingsBucket, _>(db, user_id, RESOURCE, id).await?;

    let name = patch
        .name
        .as_deref()
        .map(|n| validation::required_text(n, "name"))
        .transpose()?;
    check_links(
        db,
        user_id,
        patch.target_amount.flatten(),
        patch.linked_goal_id.flatten(),
    )
    .await?;

    let mut active_model: savings_bucket::ActiveModel = existing.into();
    if let Some(name) = name {
        active_model.name = Set(name);
    }
    if let Some(target) = patch.target_amount {
        active_model.target_amount = Set(target);
    }
    if let Some(goal_id) = patch.linked_goal_id {
        active_model.linked_goal_id = Set(goal_id);
    }
    active_model.updated_at = Set(Utc::now());

    let updated = active_model
        .update(db)
        .await
        .context("Failed to update savings bucket")?;
    info!("Updated savings bucket '{}' (ID: {})", updated.name, updated.id);
    Ok(updated)
}

/// Deletes a bucket and its transaction history.
#[instrument(skip(db))]
pub async fn delete_bucket(db: &DatabaseConnection, caller: &Caller, id: i64) -> Result<()> {
    let user_id = caller.require()?;
    let existing = find_owned::<SavingsBucket, _>(db, user_id, RESOURCE, id).await?;

    let txn = db.begin().await?;
    SavingsTransaction::delete_many()
        .filter(savings_transaction::Column::SavingsBucketId.eq(id))
        .exec(&txn)
        .await
        .context("Failed to delete savings transactions")?;
    existing
        .delete(&txn)
        .await
        .context("Failed to delete savings bucket")?;
    txn.commit().await?;

    info!("Deleted savings bucket {}", id);
    Ok(())
}

async fn move_money(
    db: &DatabaseConnection,
    user_id: &str,
    bucket: savings_bucket::Model,
    kind: SavingsTransactionKind,
    movement: SavingsMovement,
) -> Result<savings_bucket::Model> {
    let balance = match kind {
        SavingsTransactionKind::Deposit => bucket.current_amount + movement.amount,
        SavingsTransactionKind::Withdrawal => bucket.current_amount - movement.amount,
    };
    let now = Utc::now();

    let txn = db.begin().await?;
    savings_transaction::ActiveModel {
        user_id: Set(user_id.to_string()),
        savings_bucket_id: Set(bucket.id),
        kind: Set(kind),
        amount: Set(movement.amount),
        date: Set(movement.date),
        note: Set(movement.note),
        created_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await
    .context("Failed to record savings transaction")?;

    let mut active_model: savings_bucket::ActiveModel = bucket.into();
    active_model.current_amount = Set(balance);
    active_model.updated_at = Set(now);
    let updated = active_model
        .update(&txn)
        .await
        .context("Failed to update savings bucket balance")?;
    txn.commit().await?;
    Ok(updated)
}

/// Adds money to a bucket.
#[instrument(skip(db))]
pub async fn deposit(
    db: &DatabaseConnection,
    caller: &Caller,
    bucket_id: i64,
    movement: SavingsMovement,
) -> Result<savings_bucket::Model> {
    let user_id = caller.require()?;
    validation::positive_amount(movement.amount, "amount")?;
    let bucket = find_owned::<SavingsBucket, _>(db, user_id, RESOURCE, bucket_id).await?;

    let amount = movement.amount;
    let updated = move_money(db, user_id, bucket, SavingsTransactionKind::Deposit, movement).await?;
    info!(
        "Deposited {} into '{}' (now {})",
        amount, updated.name, updated.current_amount
    );
    Ok(updated)
}

/// Takes money out of a bucket, up to its current balance.
#[instrument(skip(db))]
pub async fn withdraw(
    db: &DatabaseConnection,
    caller: &Caller,
    bucket_id: i64,
    movement: SavingsMovement,
) -> Result<savings_bucket::Model> {
    let user_id = caller.require()?;
    validation::positive_amount(movement.amount, "amount")?;
    let bucket = find_owned::<SavingsBucket, _>(db, user_id, RESOURCE, bucket_id).await?;

    if movement.amount > bucket.current_amount {
        warn!(
            "Rejected withdrawal of {} from '{}' holding {}",
            movement.amount, bucket.name, bucket.current_amount
        );
        return Err(Error::validation(
            format!(
                "Withdrawing €{:.2} exceeds the balance of '{}' (available: €{:.2})",
                movement.amount, bucket.name, bucket.current_amount
            ),
            "amount",
        ));
    }

    let amount = movement.amount;
    let updated =
        move_money(db, user_id, bucket, SavingsTransactionKind::Withdrawal, movement).await?;
    info!(
        "Withdrew {} from '{}' (now {})",
        amount, updated.name, updated.current_amount
    );
    Ok(updated)
}

/// Lists a bucket's deposits and withdrawals by date.
pub async fn get_transactions(
    db: &DatabaseConnection,
    caller: &Caller,
    bucket_id: i64,
) -> Result<Vec<savings_transaction::Model>> {
    let user_id = caller.require()?;
    find_owned::<SavingsBucket, _>(db, user_id, RESOURCE, bucket_id).await?;
    SavingsTransaction::find()
        .filter(savings_transaction::Column::SavingsBucketId.eq(bucket_id))
        .order_by_asc(savings_transaction::Column::Date)
        .order_by_asc(savings_transaction::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    fn movement(amount: Decimal) -> SavingsMovement {
        SavingsMovement {
            amount,
            date: march(12),
            note: None,
        }
    }

    async fn bucket(db: &DatabaseConnection) -> Result<savings_bucket::Model> {
        create_bucket(
            db,
            &test_caller(),
            NewSavingsBucket {
                name: "Rainy day".to_string(),
                target_amount: Some(Decimal::new(1000, 0)),
                ..Default::default()
            },
        )
        .await
    }

    #[tokio::test]
    async fn test_deposit_and_withdraw() -> Result<()> {
        let db = setup_test_db().await?;
        let caller = test_caller();
        let pot = bucket(&db).await?;
        assert_eq!(pot.current_amount, Decimal::ZERO);

        deposit(&db, &caller, pot.id, movement(Decimal::new(300, 0))).await?;
        let after = withdraw(&db, &caller, pot.id, movement(Decimal::new(120, 0))).await?;
        assert_eq!(after.current_amount, Decimal::new(180, 0));

        let history = get_transactions(&db, &caller, pot.id).await?;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].kind, SavingsTransactionKind::Deposit);
        assert_eq!(history[1].kind, SavingsTransactionKind::Withdrawal);
        Ok(())
    }

    #[tokio::test]
    async fn test_withdraw_cannot_exceed_balance() -> Result<()> {
        let db = setup_test_db().await?;
        let caller = test_caller();
        let pot = bucket(&db).await?;
        deposit(&db, &caller, pot.id, movement(Decimal::new(50, 0))).await?;

        let over = withdraw(&db, &caller, pot.id, movement(Decimal::new(5001, 2))).await;
        assert!(matches!(over, Err(Error::Validation { field: Some("amount"), .. })));
        assert_eq!(get_transactions(&db, &caller, pot.id).await?.len(), 1);

        let emptied = withdraw(&db, &caller, pot.id, movement(Decimal::new(50, 0))).await?;
        assert_eq!(emptied.current_amount, Decimal::ZERO);
        Ok(())
    }

    #[tokio::test]
    async fn test_bucket_goal_link_must_be_owned() -> Result<()> {
        let db = setup_test_db().await?;
        let other = Caller::user("other");
        let foreign_goal = create_test_goal(&db, &other, "Theirs", Decimal::new(100, 0), Decimal::ZERO).await?;

        let linked = create_bucket(
            &db,
            &test_caller(),
            NewSavingsBucket {
                name: "Mine".to_string(),
                linked_goal_id: Some(foreign_goal.id),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(linked, Err(Error::Forbidden { .. })));

        let pot = bucket(&db).await?;
        let cleared = update_bucket(
            &db,
            &test_caller(),
            pot.id,
            SavingsBucketPatch {
                target_amount: Some(None),
                ..Default::default()
            },
        )
        .await?;
        assert_eq!(cleared.target_amount, None);
        Ok(())
    }

    #[tokio::test]
    async fn test_delete_bucket_removes_history() -> Result<()> {
        let db = setup_test_db().await?;
        let caller = test_caller();
        let pot = bucket(&db).await?;
        deposit(&db, &caller, pot.id, movement(Decimal::new(10, 0))).await?;

        delete_bucket(&db, &caller, pot.id).await?;
        assert!(get_buckets(&db, &caller).await?.is_empty());
        assert!(SavingsTransaction::find().all(&db).await?.is_empty());
        Ok(())
    }
}
