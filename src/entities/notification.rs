use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationKind {
    NewOrderRequest,
    OrderApproved,
    OrderDeclined,
    InternalTransfer,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::NewOrderRequest => "new_order_request",
            NotificationKind::OrderApproved => "order_approved",
            NotificationKind::OrderDeclined => "order_declined",
            NotificationKind::InternalTransfer => "internal_transfer",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "new_order_request" => Some(NotificationKind::NewOrderRequest),
            "order_approved" => Some(NotificationKind::OrderApproved),
            "order_declined" => Some(NotificationKind::OrderDeclined),
            "internal_transfer" => Some(NotificationKind::InternalTransfer),
            _ => None,
        }
    }
}

/// Append-only user-facing event record. Only the `read` flag is ever
/// mutated after insertion.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub kind: String,

    pub read: bool,
    #[sea_orm(column_type = "Json", nullable)]
    pub data: Option<Json>,
    pub related_id: Option<Uuid>,

    pub created_at: DateTime<Utc>,
}

impl Model {
    pub fn kind(&self) -> Option<NotificationKind> {
        NotificationKind::from_str(&self.kind)
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
            if let ActiveValue::NotSet = active_model.read {
                active_model.read = Set(false);
            }
        }

        Ok(active_model)
    }
}
