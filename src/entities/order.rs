use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Advisory fulfillment pipeline for a confirmed order. The core does not
/// enforce transitions between these states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Confirmed,
    Shipped,
    Delivered,
    Completed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Completed => "completed",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "confirmed" => Some(OrderStatus::Confirmed),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            "completed" => Some(OrderStatus::Completed),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Every order traces back to exactly one originating request.
    #[sea_orm(unique)]
    pub order_request_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub material_id: Uuid,

    /// Fulfilled quantity, which may be less than the request's quantity.
    pub quantity: i32,
    pub unit_price: Decimal,
    /// Proportional to the fulfilled share of the originating request.
    pub total_amount: Decimal,
    pub platform_fee: Decimal,

    pub status: String,

    pub shipping_address: Option<String>,
    pub delivery_notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn status(&self) -> Option<OrderStatus> {
        OrderStatus::from_str(&self.status)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order_request::Entity",
        from = "Column::OrderRequestId",
        to = "super::order_request::Column::Id"
    )]
    OrderRequest,
}

impl Related<super::order_request::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderRequest.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.id {
                active_model.id = Set(Uuid::new_v4());
            }
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
            if let ActiveValue::NotSet = active_model.status {
                active_model.status = Set(OrderStatus::Confirmed.as_str().to_string());
            }
        }

        active_model.updated_at = Set(Some(now));

        Ok(active_model)
    }
}
