//! Material listings: creation, marketplace queries, buyer request
//! submission, and deletion. The allocation and transfer engines own all
//! quantity mutation; this service only creates and removes listings.

use rand::Rng;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::entities::material::{
    self, AcquisitionType, Entity as MaterialEntity, InventoryType, ListingType,
};
use crate::entities::notification::NotificationKind;
use crate::entities::order_request::{self, RequestStatus};
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::notifications;

const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

fn to_base36(mut n: u64) -> String {
    if n == 0 {
        return "0".to_string();
    }
    let mut digits = Vec::new();
    while n > 0 {
        digits.push(BASE36[(n % 36) as usize]);
        n /= 36;
    }
    digits.reverse();
    String::from_utf8(digits).expect("base36 digits are ascii")
}

/// Human-facing listing code: `GS-<base36 ms timestamp>-<6 random base36
/// chars>`, uppercased.
pub fn generate_listing_id() -> String {
    let timestamp = to_base36(chrono::Utc::now().timestamp_millis() as u64);
    let mut rng = rand::thread_rng();
    let random: String = (0..6)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();

    format!("GS-{}-{}", timestamp, random).to_uppercase()
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewMaterial {
    pub seller_id: Uuid,
    pub project_id: Option<Uuid>,
    #[validate(length(min = 1, message = "Material name is required"))]
    pub material: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub condition: Option<String>,
    #[validate(range(min = 0, message = "Quantity cannot be negative"))]
    pub quantity: i32,
    pub unit: Option<String>,
    pub price_today: Decimal,
    pub mrp: Option<Decimal>,
    pub price_purchased: Option<Decimal>,
    pub inventory_type: String,
    pub specs: Option<String>,
    pub dimensions: Option<String>,
    pub weight: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewOrderRequest {
    pub material_id: Uuid,
    pub buyer_id: Uuid,
    #[validate(range(min = 1, message = "Quantity must be greater than 0"))]
    pub quantity: i32,
    pub buyer_company: Option<String>,
    pub buyer_contact_person: Option<String>,
    pub buyer_email: Option<String>,
    pub buyer_phone: Option<String>,
    pub delivery_address: Option<String>,
    pub delivery_notes: Option<String>,
}

#[derive(Clone)]
pub struct MaterialService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<Arc<EventSender>>,
}

impl MaterialService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Creates a new listing with a generated listing code.
    #[instrument(skip(self, new_material), fields(seller_id = %new_material.seller_id))]
    pub async fn create_material(
        &self,
        new_material: NewMaterial,
    ) -> Result<material::Model, ServiceError> {
        new_material.validate()?;

        let inventory_type =
            InventoryType::from_str(&new_material.inventory_type).ok_or_else(|| {
                ServiceError::ValidationError(format!(
                    "Unknown inventory type: {}",
                    new_material.inventory_type
                ))
            })?;

        let inventory_value = new_material.price_today * Decimal::from(new_material.quantity);

        let active = material::ActiveModel {
            listing_id: Set(generate_listing_id()),
            seller_id: Set(new_material.seller_id),
            project_id: Set(new_material.project_id),
            material: Set(new_material.material),
            brand: Set(new_material.brand),
            category: Set(new_material.category),
            condition: Set(new_material.condition),
            quantity: Set(new_material.quantity),
            unit: Set(new_material.unit),
            price_today: Set(new_material.price_today),
            mrp: Set(new_material.mrp),
            price_purchased: Set(new_material.price_purchased),
            inventory_value: Set(inventory_value),
            inventory_type: Set(inventory_type.as_str().to_string()),
            listing_type: Set(ListingType::Resale.as_str().to_string()),
            acquisition_type: Set(AcquisitionType::Purchased.as_str().to_string()),
            specs: Set(new_material.specs),
            dimensions: Set(new_material.dimensions),
            weight: Set(new_material.weight),
            is_being_edited: Set(false),
            ..Default::default()
        };

        let created = active.insert(&*self.db).await?;

        info!(material_id = %created.id, listing_id = %created.listing_id, "Material listed");

        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(Event::MaterialListed(created.id)).await {
                warn!(error = %e, "Failed to send material listed event");
            }
        }

        Ok(created)
    }

    #[instrument(skip(self))]
    pub async fn get_material(
        &self,
        material_id: Uuid,
    ) -> Result<Option<material::Model>, ServiceError> {
        Ok(MaterialEntity::find_by_id(material_id).one(&*self.db).await?)
    }

    /// Buyer-visible marketplace page: in-stock listings only, excluding
    /// sold-out materials and transferred-in stock the seller has not
    /// re-listed.
    #[instrument(skip(self))]
    pub async fn list_marketplace(
        &self,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<material::Model>, u64), ServiceError> {
        if page == 0 {
            return Err(ServiceError::ValidationError(
                "Page number must be greater than 0".to_string(),
            ));
        }

        let paginator = MaterialEntity::find()
            .filter(material::Column::Quantity.gt(0))
            .filter(material::Column::ListingType.ne(ListingType::Sold.as_str()))
            .filter(material::Column::AcquisitionType.ne(AcquisitionType::Acquired.as_str()))
            .order_by_desc(material::Column::CreatedAt)
            .paginate(&*self.db, limit);

        let total = paginator.num_items().await?;
        let materials = paginator.fetch_page(page - 1).await?;

        Ok((materials, total))
    }

    /// Buyer submits an order request against a listing. The unit price is
    /// snapshotted from the material now; approval later never re-reads it.
    #[instrument(skip(self, new_request), fields(material_id = %new_request.material_id, buyer_id = %new_request.buyer_id))]
    pub async fn submit_request(
        &self,
        new_request: NewOrderRequest,
    ) -> Result<order_request::Model, ServiceError> {
        new_request.validate()?;

        let txn = self.db.begin().await?;

        let material = MaterialEntity::find_by_id(new_request.material_id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Material not found".to_string()))?;

        let unit_price = material.price_today;
        let total_amount = unit_price * Decimal::from(new_request.quantity);

        let active = order_request::ActiveModel {
            material_id: Set(new_request.material_id),
            buyer_id: Set(new_request.buyer_id),
            seller_id: Set(material.seller_id),
            quantity: Set(new_request.quantity),
            unit_price: Set(unit_price),
            total_amount: Set(total_amount),
            status: Set(RequestStatus::Pending.as_str().to_string()),
            buyer_company: Set(new_request.buyer_company.clone()),
            buyer_contact_person: Set(new_request.buyer_contact_person.clone()),
            buyer_email: Set(new_request.buyer_email),
            buyer_phone: Set(new_request.buyer_phone),
            delivery_address: Set(new_request.delivery_address),
            delivery_notes: Set(new_request.delivery_notes),
            ..Default::default()
        };

        let created = active.insert(&txn).await?;

        let message = format!(
            "{} from {} wants to purchase {} units of {} ({})",
            new_request
                .buyer_contact_person
                .as_deref()
                .unwrap_or("A buyer"),
            new_request
                .buyer_company
                .as_deref()
                .unwrap_or("Unknown Company"),
            new_request.quantity,
            material.material,
            material.listing_id
        );

        if let Err(e) = notifications::record(
            &txn,
            material.seller_id,
            NotificationKind::NewOrderRequest,
            "New Order Request!",
            &message,
            Some(created.id),
            None,
        )
        .await
        {
            warn!(error = %e, request_id = %created.id, "Failed to create request notification");
        }

        txn.commit().await?;

        info!(request_id = %created.id, "Order request submitted");

        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender
                .send(Event::RequestSubmitted {
                    request_id: created.id,
                    material_id: created.material_id,
                    buyer_id: created.buyer_id,
                })
                .await
            {
                warn!(error = %e, "Failed to send request submitted event");
            }
        }

        Ok(created)
    }

    /// Removes a listing entirely. Only the owning seller may delete.
    #[instrument(skip(self))]
    pub async fn delete_material(
        &self,
        material_id: Uuid,
        seller_id: Uuid,
    ) -> Result<(), ServiceError> {
        let result = MaterialEntity::delete_many()
            .filter(material::Column::Id.eq(material_id))
            .filter(material::Column::SellerId.eq(seller_id))
            .exec(&*self.db)
            .await?;

        if result.rows_affected == 0 {
            return Err(ServiceError::NotFound("Material not found".to_string()));
        }

        info!(material_id = %material_id, "Material deleted");

        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender.send(Event::MaterialDeleted(material_id)).await {
                warn!(error = %e, "Failed to send material deleted event");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_ids_have_the_expected_shape() {
        let listing_id = generate_listing_id();

        let parts: Vec<&str> = listing_id.split('-').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "GS");
        assert!(!parts[1].is_empty());
        assert_eq!(parts[2].len(), 6);
        assert_eq!(listing_id, listing_id.to_uppercase());
        assert!(parts[1..]
            .iter()
            .all(|part| part.chars().all(|c| c.is_ascii_alphanumeric())));
    }

    #[test]
    fn listing_ids_are_unique_enough() {
        let a = generate_listing_id();
        let b = generate_listing_id();
        assert_ne!(a, b);
    }

    #[test]
    fn base36_encodes_known_values() {
        assert_eq!(to_base36(0), "0");
        assert_eq!(to_base36(35), "z");
        assert_eq!(to_base36(36), "10");
        assert_eq!(to_base36(46655), "zzz");
    }
}
