//! Advisory, time-boxed edit lock on a single material record.
//!
//! The lock is a flag-and-timestamp convention carried in three columns of
//! the material row, modelled here as an explicit state machine: a lock is
//! `Unlocked`, `Held`, or `Expired`, and every operation decides by
//! matching on that state. A holder may always re-acquire; a stale holder
//! is silently overridden. The lock gates only the seller-edit path;
//! allocation and transfer mutate stock without consulting it.

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::entities::material::{self, Entity as MaterialEntity, InventoryType, ListingType};
use crate::errors::ServiceError;

/// How long a lock holder keeps exclusivity without finishing the edit.
pub const EDIT_LOCK_TIMEOUT_MINUTES: i64 = 15;

/// Lock state of a material at a given instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Unlocked,
    Held { by: Uuid, since: DateTime<Utc> },
    Expired { by: Uuid, since: DateTime<Utc> },
}

impl LockState {
    /// Derives the state from the material's lock columns. A set flag with
    /// missing holder or timestamp is treated as stale, i.e. unlocked.
    pub fn of(material: &material::Model, now: DateTime<Utc>) -> Self {
        match (
            material.is_being_edited,
            material.edited_by,
            material.edit_started_at,
        ) {
            (true, Some(by), Some(since)) => {
                if now - since >= Duration::minutes(EDIT_LOCK_TIMEOUT_MINUTES) {
                    LockState::Expired { by, since }
                } else {
                    LockState::Held { by, since }
                }
            }
            _ => LockState::Unlocked,
        }
    }

    /// Whether `user_id` may take or keep the lock right now.
    pub fn acquirable_by(&self, user_id: Uuid) -> bool {
        match self {
            LockState::Unlocked | LockState::Expired { .. } => true,
            LockState::Held { by, .. } => *by == user_id,
        }
    }
}

/// Lock status as reported to callers.
#[derive(Debug, Clone, Serialize)]
pub struct LockStatus {
    pub locked: bool,
    pub edited_by: Option<Uuid>,
    pub edit_started_at: Option<DateTime<Utc>>,
    pub timed_out: bool,
}

impl LockStatus {
    fn unlocked(timed_out: bool) -> Self {
        Self {
            locked: false,
            edited_by: None,
            edit_started_at: None,
            timed_out,
        }
    }
}

/// Field-wise patch applied by `edit_with_lock`. Absent fields are left
/// untouched.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct MaterialPatch {
    #[validate(length(min = 1, message = "Material name cannot be empty"))]
    pub material: Option<String>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub condition: Option<String>,
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: Option<i32>,
    pub unit: Option<String>,
    pub price_today: Option<Decimal>,
    pub mrp: Option<Decimal>,
    pub price_purchased: Option<Decimal>,
    pub inventory_type: Option<String>,
    pub listing_type: Option<String>,
    pub specs: Option<String>,
    pub dimensions: Option<String>,
    pub weight: Option<String>,
}

#[derive(Clone)]
pub struct EditLockService {
    db: Arc<DatabaseConnection>,
}

impl EditLockService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Takes the edit lock for `user_id`. Succeeds when the lock is free,
    /// expired, or already held by the same user; refreshes the timestamp
    /// in every successful case.
    #[instrument(skip(self))]
    pub async fn acquire(&self, material_id: Uuid, user_id: Uuid) -> Result<LockStatus, ServiceError> {
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let material = MaterialEntity::find_by_id(material_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Material not found".to_string()))?;

        if !LockState::of(&material, now).acquirable_by(user_id) {
            return Err(ServiceError::Conflict(
                "Material is currently being edited by another user".to_string(),
            ));
        }

        let mut active: material::ActiveModel = material.into();
        active.is_being_edited = Set(true);
        active.edited_by = Set(Some(user_id));
        active.edit_started_at = Set(Some(now));
        active.update(&txn).await?;

        txn.commit().await?;

        info!(material_id = %material_id, user_id = %user_id, "Edit lock acquired");

        Ok(LockStatus {
            locked: true,
            edited_by: Some(user_id),
            edit_started_at: Some(now),
            timed_out: false,
        })
    }

    /// Clears the lock if `user_id` holds it (or nobody does). A release
    /// by a non-holder is a no-op success, so stale clients cannot wedge
    /// the UI; the actual holder keeps the lock.
    #[instrument(skip(self))]
    pub async fn release(&self, material_id: Uuid, user_id: Uuid) -> Result<(), ServiceError> {
        MaterialEntity::update_many()
            .col_expr(material::Column::IsBeingEdited, Expr::value(false))
            .col_expr(material::Column::EditedBy, Expr::value(Option::<Uuid>::None))
            .col_expr(
                material::Column::EditStartedAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .filter(material::Column::Id.eq(material_id))
            .filter(
                Condition::any()
                    .add(material::Column::EditedBy.eq(user_id))
                    .add(material::Column::EditedBy.is_null()),
            )
            .exec(&*self.db)
            .await?;

        Ok(())
    }

    /// Reports the current lock state. An expired lock is cleared here as
    /// a side effect and reported as unlocked.
    #[instrument(skip(self))]
    pub async fn check(&self, material_id: Uuid) -> Result<LockStatus, ServiceError> {
        let now = Utc::now();

        let material = MaterialEntity::find_by_id(material_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Material not found".to_string()))?;

        match LockState::of(&material, now) {
            LockState::Unlocked => Ok(LockStatus::unlocked(false)),
            LockState::Held { by, since } => Ok(LockStatus {
                locked: true,
                edited_by: Some(by),
                edit_started_at: Some(since),
                timed_out: false,
            }),
            LockState::Expired { .. } => {
                let mut active: material::ActiveModel = material.into();
                active.is_being_edited = Set(false);
                active.edited_by = Set(None);
                active.edit_started_at = Set(None);
                active.update(&*self.db).await?;

                info!(material_id = %material_id, "Cleared expired edit lock");
                Ok(LockStatus::unlocked(true))
            }
        }
    }

    /// Applies a patch to the material unless another user holds a live
    /// lock. A successful edit clears the lock in the same write.
    #[instrument(skip(self, patch))]
    pub async fn edit_with_lock(
        &self,
        material_id: Uuid,
        user_id: Uuid,
        patch: MaterialPatch,
    ) -> Result<material::Model, ServiceError> {
        patch.validate()?;

        let inventory_type = patch
            .inventory_type
            .as_deref()
            .map(|s| {
                InventoryType::from_str(s).ok_or_else(|| {
                    ServiceError::ValidationError(format!("Unknown inventory type: {}", s))
                })
            })
            .transpose()?;
        let listing_type = patch
            .listing_type
            .as_deref()
            .map(|s| {
                ListingType::from_str(s).ok_or_else(|| {
                    ServiceError::ValidationError(format!("Unknown listing type: {}", s))
                })
            })
            .transpose()?;

        let now = Utc::now();
        let txn = self.db.begin().await?;

        let material = MaterialEntity::find_by_id(material_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Material not found".to_string()))?;

        if let LockState::Held { by, .. } = LockState::of(&material, now) {
            if by != user_id {
                return Err(ServiceError::Conflict(
                    "Material is being edited by another user".to_string(),
                ));
            }
        }

        let quantity = patch.quantity.unwrap_or(material.quantity);
        let price_today = patch.price_today.unwrap_or(material.price_today);

        let mut active: material::ActiveModel = material.into();
        if let Some(name) = patch.material {
            active.material = Set(name);
        }
        if let Some(brand) = patch.brand {
            active.brand = Set(Some(brand));
        }
        if let Some(category) = patch.category {
            active.category = Set(Some(category));
        }
        if let Some(condition) = patch.condition {
            active.condition = Set(Some(condition));
        }
        if let Some(unit) = patch.unit {
            active.unit = Set(Some(unit));
        }
        if let Some(mrp) = patch.mrp {
            active.mrp = Set(Some(mrp));
        }
        if let Some(price_purchased) = patch.price_purchased {
            active.price_purchased = Set(Some(price_purchased));
        }
        if let Some(it) = inventory_type {
            active.inventory_type = Set(it.as_str().to_string());
        }
        if let Some(lt) = listing_type {
            active.listing_type = Set(lt.as_str().to_string());
        }
        if let Some(specs) = patch.specs {
            active.specs = Set(Some(specs));
        }
        if let Some(dimensions) = patch.dimensions {
            active.dimensions = Set(Some(dimensions));
        }
        if let Some(weight) = patch.weight {
            active.weight = Set(Some(weight));
        }

        active.quantity = Set(quantity);
        active.price_today = Set(price_today);
        active.inventory_value = Set(price_today * Decimal::from(quantity));

        // The edit releases the lock as part of the same write.
        active.is_being_edited = Set(false);
        active.edited_by = Set(None);
        active.edit_started_at = Set(None);

        let updated = active.update(&txn).await?;
        txn.commit().await?;

        info!(material_id = %material_id, user_id = %user_id, "Material edited, lock released");

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_material(
        is_being_edited: bool,
        edited_by: Option<Uuid>,
        edit_started_at: Option<DateTime<Utc>>,
    ) -> material::Model {
        material::Model {
            id: Uuid::new_v4(),
            listing_id: "GS-TEST-000001".to_string(),
            seller_id: Uuid::new_v4(),
            project_id: None,
            material: "Cement".to_string(),
            brand: None,
            category: None,
            condition: None,
            quantity: 10,
            unit: Some("bags".to_string()),
            price_today: dec!(350),
            mrp: None,
            price_purchased: None,
            inventory_value: dec!(3500),
            inventory_type: "surplus".to_string(),
            listing_type: "resale".to_string(),
            acquisition_type: "purchased".to_string(),
            specs: None,
            dimensions: None,
            weight: None,
            is_being_edited,
            edited_by,
            edit_started_at,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn unlocked_material_is_acquirable_by_anyone() {
        let material = sample_material(false, None, None);
        let state = LockState::of(&material, Utc::now());
        assert_eq!(state, LockState::Unlocked);
        assert!(state.acquirable_by(Uuid::new_v4()));
    }

    #[test]
    fn live_lock_is_exclusive_to_its_holder() {
        let holder = Uuid::new_v4();
        let since = Utc::now() - Duration::minutes(5);
        let material = sample_material(true, Some(holder), Some(since));

        let state = LockState::of(&material, Utc::now());
        assert_eq!(state, LockState::Held { by: holder, since });
        assert!(state.acquirable_by(holder));
        assert!(!state.acquirable_by(Uuid::new_v4()));
    }

    #[test]
    fn lock_expires_after_fifteen_minutes() {
        let holder = Uuid::new_v4();
        let since = Utc::now() - Duration::minutes(EDIT_LOCK_TIMEOUT_MINUTES) - Duration::seconds(1);
        let material = sample_material(true, Some(holder), Some(since));

        let state = LockState::of(&material, Utc::now());
        assert!(matches!(state, LockState::Expired { .. }));
        assert!(state.acquirable_by(Uuid::new_v4()));
    }

    #[test]
    fn lock_at_exactly_the_timeout_boundary_is_expired() {
        let holder = Uuid::new_v4();
        let now = Utc::now();
        let since = now - Duration::minutes(EDIT_LOCK_TIMEOUT_MINUTES);
        let material = sample_material(true, Some(holder), Some(since));

        assert!(matches!(
            LockState::of(&material, now),
            LockState::Expired { .. }
        ));
    }

    #[test]
    fn flag_without_holder_metadata_counts_as_unlocked() {
        let material = sample_material(true, None, None);
        assert_eq!(LockState::of(&material, Utc::now()), LockState::Unlocked);
    }
}
