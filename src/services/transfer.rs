//! Internal-transfer engine: moves stock between two projects of the same
//! seller as one atomic operation.
//!
//! The source leg decrements (deleting the record when it hits zero); the
//! destination leg increments an existing matching material or creates a
//! fresh one, hidden from the marketplace until the seller re-lists it.

use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::entities::internal_transfer::{self, Entity as InternalTransferEntity};
use crate::entities::material::{self, AcquisitionType, Entity as MaterialEntity, ListingType};
use crate::entities::notification::NotificationKind;
use crate::entities::project::Entity as ProjectEntity;
use crate::errors::ServiceError;
use crate::events::{Event, EventSender};
use crate::services::materials::generate_listing_id;
use crate::services::{history, notifications};

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TransferRequest {
    pub user_id: Uuid,
    pub material_id: Uuid,
    pub from_project_id: Uuid,
    pub to_project_id: Uuid,
    #[validate(range(min = 1, message = "Transfer quantity must be greater than 0"))]
    pub quantity_transferred: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TransferReceipt {
    pub transfer_id: Uuid,
}

#[derive(Clone)]
pub struct TransferService {
    db: Arc<DatabaseConnection>,
    event_sender: Option<Arc<EventSender>>,
}

impl TransferService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self { db, event_sender }
    }

    /// Moves `quantity_transferred` units of a material between two of the
    /// seller's projects. All preconditions are checked before any write;
    /// every mutation rides a single transaction.
    #[instrument(skip(self, request), fields(material_id = %request.material_id, quantity = request.quantity_transferred))]
    pub async fn transfer(&self, request: TransferRequest) -> Result<TransferReceipt, ServiceError> {
        request.validate()?;

        if request.from_project_id == request.to_project_id {
            return Err(ServiceError::ValidationError(
                "Cannot transfer to the same project".to_string(),
            ));
        }

        let now = chrono::Utc::now();
        let txn = self.db.begin().await?;

        let source = MaterialEntity::find_by_id(request.material_id)
            .filter(material::Column::SellerId.eq(request.user_id))
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Material not found".to_string()))?;

        if source.quantity < request.quantity_transferred {
            return Err(ServiceError::InsufficientStock(
                "Insufficient quantity available".to_string(),
            ));
        }

        // Guarded decrement: a concurrent spender makes the quantity filter
        // miss and the transfer aborts instead of going negative.
        let decremented = MaterialEntity::update_many()
            .col_expr(
                material::Column::Quantity,
                Expr::col(material::Column::Quantity).sub(request.quantity_transferred),
            )
            .col_expr(material::Column::UpdatedAt, Expr::value(now))
            .filter(material::Column::Id.eq(source.id))
            .filter(material::Column::SellerId.eq(request.user_id))
            .filter(material::Column::Quantity.gte(request.quantity_transferred))
            .exec(&txn)
            .await?;

        if decremented.rows_affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "Material {} was modified concurrently",
                source.id
            )));
        }

        // A fully transferred-out source has no listing identity left:
        // delete it rather than keeping a zero-quantity row.
        if source.quantity - request.quantity_transferred <= 0 {
            MaterialEntity::delete_by_id(source.id).exec(&txn).await?;
        }

        let destination = self.find_destination(&txn, &request, &source).await?;
        match destination {
            Some(existing) => {
                MaterialEntity::update_many()
                    .col_expr(
                        material::Column::Quantity,
                        Expr::col(material::Column::Quantity).add(request.quantity_transferred),
                    )
                    .col_expr(material::Column::UpdatedAt, Expr::value(now))
                    .filter(material::Column::Id.eq(existing.id))
                    .exec(&txn)
                    .await?;
            }
            None => {
                let created = material::ActiveModel {
                    listing_id: Set(generate_listing_id()),
                    seller_id: Set(request.user_id),
                    project_id: Set(Some(request.to_project_id)),
                    material: Set(source.material.clone()),
                    brand: Set(source.brand.clone()),
                    category: Set(source.category.clone()),
                    condition: Set(source.condition.clone()),
                    quantity: Set(request.quantity_transferred),
                    unit: Set(source.unit.clone()),
                    price_today: Set(source.price_today),
                    mrp: Set(source.mrp),
                    price_purchased: Set(source.price_purchased),
                    inventory_value: Set(
                        source.price_today * rust_decimal::Decimal::from(request.quantity_transferred)
                    ),
                    inventory_type: Set(source.inventory_type.clone()),
                    // Transferred-in stock stays off the marketplace until
                    // the seller explicitly re-lists it.
                    listing_type: Set(ListingType::Acquired.as_str().to_string()),
                    acquisition_type: Set(AcquisitionType::Acquired.as_str().to_string()),
                    specs: Set(source.specs.clone()),
                    dimensions: Set(source.dimensions.clone()),
                    weight: Set(source.weight.clone()),
                    is_being_edited: Set(false),
                    ..Default::default()
                };
                created.insert(&txn).await?;
            }
        }

        let transfer_id = Uuid::new_v4();
        let transfer_row = internal_transfer::ActiveModel {
            id: Set(transfer_id),
            user_id: Set(request.user_id),
            material_id: Set(request.material_id),
            from_project_id: Set(request.from_project_id),
            to_project_id: Set(request.to_project_id),
            quantity_transferred: Set(request.quantity_transferred),
            notes: Set(request.notes.clone()),
            ..Default::default()
        };
        transfer_row.insert(&txn).await?;

        history::record_transfer(
            &txn,
            history::TransferRecord {
                seller_id: request.user_id,
                material_id: request.material_id,
                listing_id: Some(source.listing_id.clone()),
                from_project_id: request.from_project_id,
                to_project_id: request.to_project_id,
                quantity: request.quantity_transferred,
                material_name: source.material.clone(),
                notes: request.notes.clone(),
            },
        )
        .await?;

        let from_name = self.project_name(&txn, request.from_project_id).await;
        let to_name = self.project_name(&txn, request.to_project_id).await;
        let message = format!(
            "Successfully transferred {} units of {} from {} to {}",
            request.quantity_transferred, source.material, from_name, to_name
        );

        if let Err(e) = notifications::record(
            &txn,
            request.user_id,
            NotificationKind::InternalTransfer,
            "Internal Transfer Completed",
            &message,
            Some(transfer_id),
            None,
        )
        .await
        {
            warn!(error = %e, transfer_id = %transfer_id, "Failed to create transfer notification");
        }

        txn.commit().await?;

        info!(
            transfer_id = %transfer_id,
            material_id = %request.material_id,
            quantity = request.quantity_transferred,
            "Internal transfer completed"
        );

        if let Some(sender) = &self.event_sender {
            if let Err(e) = sender
                .send(Event::StockTransferred {
                    transfer_id,
                    material_id: request.material_id,
                    quantity: request.quantity_transferred,
                })
                .await
            {
                warn!(error = %e, "Failed to send transfer event");
            }
        }

        Ok(TransferReceipt { transfer_id })
    }

    /// Transfer history for a seller, newest first.
    #[instrument(skip(self))]
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
    ) -> Result<Vec<internal_transfer::Model>, ServiceError> {
        let transfers = InternalTransferEntity::find()
            .filter(internal_transfer::Column::UserId.eq(user_id))
            .order_by_desc(internal_transfer::Column::CreatedAt)
            .all(&*self.db)
            .await?;

        Ok(transfers)
    }

    /// A destination material matches on seller, project, name, brand, and
    /// condition. Absent brand/condition only match another absent value.
    async fn find_destination<C: ConnectionTrait>(
        &self,
        conn: &C,
        request: &TransferRequest,
        source: &material::Model,
    ) -> Result<Option<material::Model>, ServiceError> {
        let mut query = MaterialEntity::find()
            .filter(material::Column::SellerId.eq(request.user_id))
            .filter(material::Column::ProjectId.eq(request.to_project_id))
            .filter(material::Column::Material.eq(source.material.clone()))
            .filter(material::Column::Id.ne(source.id));

        query = match &source.brand {
            Some(brand) => query.filter(material::Column::Brand.eq(brand.clone())),
            None => query.filter(material::Column::Brand.is_null()),
        };
        query = match &source.condition {
            Some(condition) => query.filter(material::Column::Condition.eq(condition.clone())),
            None => query.filter(material::Column::Condition.is_null()),
        };

        Ok(query.one(conn).await?)
    }

    async fn project_name<C: ConnectionTrait>(&self, conn: &C, project_id: Uuid) -> String {
        match ProjectEntity::find_by_id(project_id).one(conn).await {
            Ok(Some(project)) => project.name,
            _ => "Unknown Project".to_string(),
        }
    }
}
