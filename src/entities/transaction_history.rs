use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of activity a history row records. Sales and internal
/// transfers share one table so the seller's activity feed is a single
/// ordered query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HistoryKind {
    Sale,
    InternalTransfer,
}

impl HistoryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryKind::Sale => "sale",
            HistoryKind::InternalTransfer => "internal_transfer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "sale" => Some(HistoryKind::Sale),
            "internal_transfer" => Some(HistoryKind::InternalTransfer),
            _ => None,
        }
    }
}

/// Append-only audit row, denormalized for reporting. The referenced
/// material may since have been deleted (fully transferred out), so no
/// foreign key is kept.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "transaction_history")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub seller_id: Uuid,
    pub material_id: Uuid,
    pub listing_id: Option<String>,
    pub kind: String,

    // Sale-only columns.
    pub buyer_id: Option<Uuid>,
    pub order_id: Option<Uuid>,
    pub buyer_company: Option<String>,
    pub delivery_address: Option<String>,

    // Transfer-only columns.
    pub from_project_id: Option<Uuid>,
    pub to_project_id: Option<Uuid>,

    pub quantity: i32,
    pub unit_price: Option<Decimal>,
    pub total_amount: Option<Decimal>,
    pub material_name: String,
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn kind(&self) -> Option<HistoryKind> {
        HistoryKind::from_str(&self.kind)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;

        if insert {
            if let ActiveValue::NotSet = active_model.id {
                active_model.id = Set(Uuid::new_v4());
            }
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(Utc::now());
            }
        }

        Ok(active_model)
    }
}
