//! Master budget business logic - Category templates copied into each month.
//!
//! Provides CRUD for templates and the start-up seeding from config.toml.

use crate::{
    config::master_budgets::Config,
    core::{
        access::{Caller, find_owned},
        validation,
    },
    entities::{MasterBudget, master_budget},
    errors::{Result, StoreContext},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ConnectionTrait, QueryOrder, Set, prelude::*, sea_query::Expr};
use tracing::{debug, info, instrument};

const RESOURCE: &str = "master budget";

/// Input for [`create_master_budget`].
#[derive(Debug, Clone, Default)]
pub struct NewMasterBudget {
    pub name: String,
    pub budget_amount: Decimal,
    pub description: Option<String>,
    pub display_order: i32,
}

/// Fields changed by [`update_master_budget`]; `None` leaves a field as is.
#[derive(Debug, Clone, Default)]
pub struct MasterBudgetPatch {
    pub name: Option<String>,
    pub budget_amount: Option<Decimal>,
    pub description: Option<Option<String>>,
    pub is_active: Option<bool>,
    pub display_order: Option<i32>,
}

/// Creates an active template after validating the name and amount.
#[instrument(skip(db))]
pub async fn create_master_budget(
    db: &DatabaseConnection,
    caller: &Caller,
    new: NewMasterBudget,
) -> Result<master_budget::Model> {
    let user_id = caller.require()?;
    let name = validation::required_text(&new.name, "name")?;
    validation::non_negative_amount(new.budget_amount, "budget_amount")?;

    let now = Utc::now();
    let model = master_budget::ActiveModel {
        user_id: Set(user_id.to_string()),
        name: Set(name),
        budget_amount: Set(new.budget_amount),
        description: Set(new.description),
        is_active: Set(true),
        display_order: Set(new.display_order),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    };

    let created = model.insert(db).await.context("Failed to create master budget")?;
    info!("Created master budget '{}' (ID: {})", created.name, created.id);
    Ok(created)
}

/// Retrieves one template owned by the caller.
pub async fn get_master_budget(
    db: &DatabaseConnection,
    caller: &Caller,
    id: i64,
) -> Result<master_budget::Model> {
    let user_id = caller.require()?;
    find_owned::<MasterBudget, _>(db, user_id, RESOURCE, id).await
}

/// Lists the caller's templates ordered by `display_order`, then name.
pub async fn get_master_budgets(
    db: &DatabaseConnection,
    caller: &Caller,
    active_only: bool,
) -> Result<Vec<master_budget::Model>> {
    let user_id = caller.require()?;
    let mut query = MasterBudget::find().filter(master_budget::Column::UserId.eq(user_id));
    if active_only {
        query = query.filter(master_budget::Column::IsActive.eq(true));
    }
    query
        .order_by_asc(master_budget::Column::DisplayOrder)
        .order_by_asc(master_budget::Column::Name)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Active templates for `user_id` in copy order.
pub(crate) async fn active_templates<C>(db: &C, user_id: &str) -> Result<Vec<master_budget::Model>>
where
    C: ConnectionTrait,
{
    MasterBudget::find()
        .filter(master_budget::Column::UserId.eq(user_id))
        .filter(master_budget::Column::IsActive.eq(true))
        .order_by_asc(master_budget::Column::DisplayOrder)
        .order_by_asc(master_budget::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// The caller's active template called exactly `name`, if any.
pub(crate) async fn find_active_template_by_name<C>(
    db: &C,
    user_id: &str,
    name: &str,
) -> Result<Option<master_budget::Model>>
where
    C: ConnectionTrait,
{
    MasterBudget::find()
        .filter(master_budget::Column::UserId.eq(user_id))
        .filter(master_budget::Column::IsActive.eq(true))
        .filter(master_budget::Column::Name.eq(name))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Applies a patch to a template.
#[instrument(skip(db))]
pub async fn update_master_budget(
    db: &DatabaseConnection,
    caller: &Caller,
    id: i64,
    patch: MasterBudgetPatch,
) -> Result<master_budget::Model> {
    let user_id = caller.require()?;
    let existing = find_owned::<MasterBudget, _>(db, user_id, RESOURCE, id).await?;

    let name = patch
        .name
        .as_deref()
        .map(|n| validation::required_text(n, "name"))
        .transpose()?;
    if let Some(amount) = patch.budget_amount {
        validation::non_negative_amount(amount, "budget_amount")?;
    }

    let mut active_model: master_budget::ActiveModel = existing.into();
    if let Some(name) = name {
        active_model.name = Set(name);
    }
    if let Some(amount) = patch.budget_amount {
        active_model.budget_amount = Set(amount);
    }
    if let Some(description) = patch.description {
        active_model.description = Set(description);
    }
    if let Some(is_active) = patch.is_active {
        active_model.is_active = Set(is_active);
    }
    if let Some(display_order) = patch.display_order {
        active_model.display_order = Set(display_order);
    }
    active_model.updated_at = Set(Utc::now());

    let updated = active_model
        .update(db)
        .await
        .context("Failed to update master budget")?;
    info!("Updated master budget '{}' (ID: {})", updated.name, updated.id);
    Ok(updated)
}

/// Deletes a template. Budgets copied from it keep their values and lose the link.
#[instrument(skip(db))]
pub async fn delete_master_budget(db: &DatabaseConnection, caller: &Caller, id: i64) -> Result<()> {
    let user_id = caller.require()?;
    let existing = find_owned::<MasterBudget, _>(db, user_id, RESOURCE, id).await?;

    crate::entities::Budget::update_many()
        .col_expr(
            crate::entities::budget::Column::MasterBudgetId,
            Expr::value(Option::<i64>::None),
        )
        .filter(crate::entities::budget::Column::MasterBudgetId.eq(id))
        .exec(db)
        .await
        .context("Failed to unlink budgets from master budget")?;

    existing
        .delete(db)
        .await
        .context("Failed to delete master budget")?;
    info!("Deleted master budget {}", id);
    Ok(())
}

/// Seeds templates from configuration for `seed_user_id`.
///
/// Templates whose name already exists for that user are skipped, so running
/// this on every start-up is safe. Returns the number of templates inserted.
#[instrument(skip(db, config))]
pub async fn seed_master_budgets(db: &DatabaseConnection, config: &Config) -> Result<usize> {
    let Some(seed_user) = config.seed_user_id.as_deref() else {
        debug!("No seed_user_id configured; skipping master budget seeding");
        return Ok(0);
    };
    let caller = Caller::user(seed_user);

    let mut inserted = 0;
    for template in &config.master_budgets {
        let exists = MasterBudget::find()
            .filter(master_budget::Column::UserId.eq(seed_user))
            .filter(master_budget::Column::Name.eq(template.name.trim()))
            .one(db)
            .await?
            .is_some();
        if exists {
            debug!("Master budget '{}' already exists. Skipping.", template.name);
            continue;
        }

        create_master_budget(
            db,
            &caller,
            NewMasterBudget {
                name: template.name.clone(),
                budget_amount: template.budget_amount,
                description: template.description.clone(),
                display_order: template.display_order,
            },
        )
        .await?;
        inserted += 1;
    }

    info!("Seeded {} master budgets for {}", inserted, seed_user);
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::config::master_budgets::MasterBudgetConfig;
    use crate::errors::Error;
    use crate::test_utils::*;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_master_budget_validation() -> Result<()> {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();

        let result = create_master_budget(
            &db,
            &test_caller(),
            NewMasterBudget {
                name: "  ".to_string(),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(result, Err(Error::Validation { field: Some("name"), .. })));

        let result = create_master_budget(
            &db,
            &test_caller(),
            NewMasterBudget {
                name: "Rent".to_string(),
                budget_amount: Decimal::new(-1, 0),
                ..Default::default()
            },
        )
        .await;
        assert!(matches!(
            result,
            Err(Error::Validation {
                field: Some("budget_amount"),
                ..
            })
        ));

        let result = create_master_budget(&db, &Caller::anonymous(), NewMasterBudget::default()).await;
        assert!(matches!(result, Err(Error::Unauthorized)));

        Ok(())
    }

    #[tokio::test]
    async fn test_get_master_budgets_ordering_and_filter() -> Result<()> {
        let db = setup_test_db().await?;
        let caller = test_caller();
        create_test_master_budget(&db, &caller, "Rent", Decimal::new(900, 0), 2).await?;
        let food = create_test_master_budget(&db, &caller, "Food", Decimal::new(300, 0), 1).await?;
        update_master_budget(
            &db,
            &caller,
            food.id,
            MasterBudgetPatch {
                is_active: Some(false),
                ..Default::default()
            },
        )
        .await?;

        let all = get_master_budgets(&db, &caller, false).await?;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].name, "Food");
        assert_eq!(all[1].name, "Rent");

        let active = get_master_budgets(&db, &caller, true).await?;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "Rent");

        let other = get_master_budgets(&db, &Caller::user("someone_else"), false).await?;
        assert!(other.is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn test_seed_master_budgets_is_idempotent() -> Result<()> {
        let db = setup_test_db().await?;
        let config = Config {
            seed_user_id: Some(TEST_USER.to_string()),
            master_budgets: vec![
                MasterBudgetConfig {
                    name: "Groceries".to_string(),
                    budget_amount: Decimal::new(400, 0),
                    description: None,
                    display_order: 1,
                },
                MasterBudgetConfig {
                    name: "Fuel".to_string(),
                    budget_amount: Decimal::new(120, 0),
                    description: Some("Car".to_string()),
                    display_order: 2,
                },
            ],
        };

        assert_eq!(seed_master_budgets(&db, &config).await?, 2);
        assert_eq!(seed_master_budgets(&db, &config).await?, 0);

        let seeded = get_master_budgets(&db, &test_caller(), true).await?;
        assert_eq!(seeded.len(), 2);
        assert_eq!(seeded[1].description.as_deref(), Some("Car"));

        Ok(())
    }

    #[tokio::test]
    async fn test_delete_master_budget_unlinks_budgets() -> Result<()> {
        let db = setup_test_db().await?;
        let caller = test_caller();
        create_test_master_budget(&db, &caller, "Rent", Decimal::new(900, 0), 1).await?;
        let month = create_test_month(&db, &caller).await?;
        let budgets = crate::core::budget::get_budgets(&db, &caller, month.id).await?;
        let template_id = budgets[0].master_budget_id.unwrap();

        delete_master_budget(&db, &caller, template_id).await?;

        let budgets = crate::core::budget::get_budgets(&db, &caller, month.id).await?;
        assert_eq!(budgets.len(), 1);
        assert_eq!(budgets[0].master_budget_id, None);
        assert_eq!(budgets[0].budget_amount, Decimal::new(900, 0));

        Ok(())
    }
}
