//! Append-only transaction history and the seller's unified activity feed.
//!
//! Sales and internal transfers share one audit table; the feed reads it
//! back as typed entries so callers match exhaustively on the activity
//! kind instead of probing nullable columns.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::entities::transaction_history::{self, Entity as HistoryEntity, HistoryKind};
use crate::errors::ServiceError;

pub struct SaleRecord {
    pub seller_id: Uuid,
    pub material_id: Uuid,
    pub listing_id: Option<String>,
    pub buyer_id: Uuid,
    pub order_id: Uuid,
    pub buyer_company: Option<String>,
    pub delivery_address: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_amount: Decimal,
    pub material_name: String,
    pub notes: Option<String>,
}

pub struct TransferRecord {
    pub seller_id: Uuid,
    pub material_id: Uuid,
    pub listing_id: Option<String>,
    pub from_project_id: Uuid,
    pub to_project_id: Uuid,
    pub quantity: i32,
    pub material_name: String,
    pub notes: Option<String>,
}

pub async fn record_sale<C: ConnectionTrait>(
    conn: &C,
    sale: SaleRecord,
) -> Result<transaction_history::Model, DbErr> {
    let active = transaction_history::ActiveModel {
        seller_id: Set(sale.seller_id),
        material_id: Set(sale.material_id),
        listing_id: Set(sale.listing_id),
        kind: Set(HistoryKind::Sale.as_str().to_string()),
        buyer_id: Set(Some(sale.buyer_id)),
        order_id: Set(Some(sale.order_id)),
        buyer_company: Set(sale.buyer_company),
        delivery_address: Set(sale.delivery_address),
        quantity: Set(sale.quantity),
        unit_price: Set(Some(sale.unit_price)),
        total_amount: Set(Some(sale.total_amount)),
        material_name: Set(sale.material_name),
        notes: Set(sale.notes),
        ..Default::default()
    };

    active.insert(conn).await
}

pub async fn record_transfer<C: ConnectionTrait>(
    conn: &C,
    transfer: TransferRecord,
) -> Result<transaction_history::Model, DbErr> {
    let active = transaction_history::ActiveModel {
        seller_id: Set(transfer.seller_id),
        material_id: Set(transfer.material_id),
        listing_id: Set(transfer.listing_id),
        kind: Set(HistoryKind::InternalTransfer.as_str().to_string()),
        from_project_id: Set(Some(transfer.from_project_id)),
        to_project_id: Set(Some(transfer.to_project_id)),
        quantity: Set(transfer.quantity),
        material_name: Set(transfer.material_name),
        notes: Set(transfer.notes),
        ..Default::default()
    };

    active.insert(conn).await
}

/// One entry in the seller's activity feed.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Activity {
    Sale {
        id: Uuid,
        material_name: String,
        listing_id: Option<String>,
        buyer_company: Option<String>,
        order_id: Option<Uuid>,
        quantity: i32,
        unit_price: Option<Decimal>,
        total_amount: Option<Decimal>,
        notes: Option<String>,
        created_at: DateTime<Utc>,
    },
    Transfer {
        id: Uuid,
        material_name: String,
        listing_id: Option<String>,
        from_project_id: Option<Uuid>,
        to_project_id: Option<Uuid>,
        quantity: i32,
        notes: Option<String>,
        created_at: DateTime<Utc>,
    },
}

impl Activity {
    fn from_model(model: transaction_history::Model) -> Option<Self> {
        match model.kind()? {
            HistoryKind::Sale => Some(Activity::Sale {
                id: model.id,
                material_name: model.material_name,
                listing_id: model.listing_id,
                buyer_company: model.buyer_company,
                order_id: model.order_id,
                quantity: model.quantity,
                unit_price: model.unit_price,
                total_amount: model.total_amount,
                notes: model.notes,
                created_at: model.created_at,
            }),
            HistoryKind::InternalTransfer => Some(Activity::Transfer {
                id: model.id,
                material_name: model.material_name,
                listing_id: model.listing_id,
                from_project_id: model.from_project_id,
                to_project_id: model.to_project_id,
                quantity: model.quantity,
                notes: model.notes,
                created_at: model.created_at,
            }),
        }
    }
}

#[derive(Clone)]
pub struct HistoryService {
    db: Arc<DatabaseConnection>,
}

impl HistoryService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Merged sale/transfer feed for a seller, newest first.
    #[instrument(skip(self))]
    pub async fn activity_for_seller(
        &self,
        seller_id: Uuid,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<Activity>, u64), ServiceError> {
        if page == 0 {
            return Err(ServiceError::ValidationError(
                "Page number must be greater than 0".to_string(),
            ));
        }

        let paginator = HistoryEntity::find()
            .filter(transaction_history::Column::SellerId.eq(seller_id))
            .order_by_desc(transaction_history::Column::CreatedAt)
            .paginate(&*self.db, limit);

        let total = paginator.num_items().await?;
        let models = paginator.fetch_page(page - 1).await?;

        let activities = models
            .into_iter()
            .filter_map(|model| {
                let id = model.id;
                let entry = Activity::from_model(model);
                if entry.is_none() {
                    warn!(history_id = %id, "Skipping history row with unknown kind");
                }
                entry
            })
            .collect();

        Ok((activities, total))
    }
}
