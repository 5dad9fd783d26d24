//! Caller identity and row ownership checks.
//!
//! Every service entry point resolves the caller with [`Caller::require`]
//! before doing anything else, then loads rows through [`find_owned`], which
//! distinguishes "missing" from "owned by someone else".

use crate::{
    entities::{
        budget, expense, financial_goal, financial_sub_goal, goal_contribution, goal_drawdown,
        income_source, loan, loan_payment, master_budget, monthly_overview, savings_bucket,
        savings_transaction, subscription, transfer,
    },
    errors::{Error, Result},
};
use sea_orm::{ConnectionTrait, EntityTrait, PrimaryKeyTrait};
use tracing::warn;

/// The identity a request runs as, as supplied by the identity provider.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Caller {
    user_id: Option<String>,
}

impl Caller {
    /// A caller resolved to `user_id`.
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
        }
    }

    /// A caller without an identity; every service call fails with
    /// [`Error::Unauthorized`].
    #[must_use]
    pub const fn anonymous() -> Self {
        Self { user_id: None }
    }

    /// Returns the resolved user id, rejecting missing or blank identities.
    pub fn require(&self) -> Result<&str> {
        match self.user_id.as_deref() {
            Some(id) if !id.trim().is_empty() => Ok(id),
            _ => Err(Error::Unauthorized),
        }
    }
}

/// Rows that belong to a single user.
pub trait Owned {
    /// The owning user id.
    fn owner(&self) -> &str;
}

macro_rules! impl_owned {
    ($($module:ident),+ $(,)?) => {
        $(
            impl Owned for $module::Model {
                fn owner(&self) -> &str {
                    &self.user_id
                }
            }
        )+
    };
}

impl_owned!(
    budget,
    expense,
    financial_goal,
    financial_sub_goal,
    goal_contribution,
    goal_drawdown,
    income_source,
    loan,
    loan_payment,
    master_budget,
    monthly_overview,
    savings_bucket,
    savings_transaction,
    subscription,
    transfer,
);

/// Loads a row by primary key and checks that `user_id` owns it.
///
/// Returns [`Error::NotFound`] when the row does not exist and
/// [`Error::Forbidden`] when it belongs to another user.
pub async fn find_owned<E, C>(
    db: &C,
    user_id: &str,
    resource: &'static str,
    id: i64,
) -> Result<E::Model>
where
    E: EntityTrait,
    E::Model: Owned,
    <E::PrimaryKey as PrimaryKeyTrait>::ValueType: From<i64>,
    C: ConnectionTrait,
{
    let row = E::find_by_id(id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found(resource, id))?;

    if row.owner() != user_id {
        warn!(
            "User {} attempted to access {} {} owned by another user",
            user_id, resource, id
        );
        return Err(Error::Forbidden { resource, id });
    }

    Ok(row)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::MonthlyOverview;
    use crate::test_utils::*;

    #[test]
    fn test_require_rejects_missing_identity() {
        assert!(matches!(
            Caller::anonymous().require(),
            Err(Error::Unauthorized)
        ));
        assert!(matches!(Caller::user("  ").require(), Err(Error::Unauthorized)));
        assert_eq!(Caller::user("alice").require().unwrap(), "alice");
    }

    #[tokio::test]
    async fn test_find_owned_distinguishes_missing_and_foreign() -> Result<()> {
        let db = setup_test_db().await?;
        let month = create_test_month(&db, &test_caller()).await?;

        let found =
            find_owned::<MonthlyOverview, _>(&db, TEST_USER, "monthly overview", month.id).await?;
        assert_eq!(found.id, month.id);

        let foreign =
            find_owned::<MonthlyOverview, _>(&db, "someone_else", "monthly overview", month.id)
                .await;
        assert!(matches!(foreign, Err(Error::Forbidden { .. })));

        let missing = find_owned::<MonthlyOverview, _>(&db, TEST_USER, "monthly overview", 999).await;
        assert!(matches!(missing, Err(Error::NotFound { id: 999, .. })));

        Ok(())
    }
}
