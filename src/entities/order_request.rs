use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a buyer's order request.
///
/// `Pending` is the only non-terminal state; the allocation engine (or a
/// direct decline) moves a request to exactly one of the other three, and
/// there is no way back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RequestStatus {
    Pending,
    Approved,
    PartiallyApproved,
    Declined,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::PartiallyApproved => "partially_approved",
            RequestStatus::Declined => "declined",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "approved" => Some(RequestStatus::Approved),
            "partially_approved" => Some(RequestStatus::PartiallyApproved),
            "declined" => Some(RequestStatus::Declined),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::Pending)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    pub material_id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,

    pub quantity: i32,
    /// Snapshot of the material's `price_today` at submission time. Never
    /// re-read at approval, even if the seller changed the price since.
    pub unit_price: Decimal,
    pub total_amount: Decimal,

    pub status: String,
    /// Set only when the request is approved or partially approved.
    pub fulfilled_quantity: Option<i32>,
    pub seller_notes: Option<String>,

    // Immutable buyer contact snapshot, denormalized at submission.
    pub buyer_company: Option<String>,
    pub buyer_contact_person: Option<String>,
    pub buyer_email: Option<String>,
    pub buyer_phone: Option<String>,
    pub delivery_address: Option<String>,
    pub delivery_notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn status(&self) -> Option<RequestStatus> {
        RequestStatus::from_str(&self.status)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::material::Entity",
        from = "Column::MaterialId",
        to = "super::material::Column::Id"
    )]
    Material,
    #[sea_orm(has_one = "super::order::Entity")]
    Order,
}

impl Related<super::material::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Material.def()
    }
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
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
                active_model.status = Set(RequestStatus::Pending.as_str().to_string());
            }
        }

        active_model.updated_at = Set(Some(now));

        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips() {
        for status in [
            RequestStatus::Pending,
            RequestStatus::Approved,
            RequestStatus::PartiallyApproved,
            RequestStatus::Declined,
        ] {
            assert_eq!(RequestStatus::from_str(status.as_str()), Some(status));
        }
        assert_eq!(RequestStatus::from_str("cancelled"), None);
    }

    #[test]
    fn only_pending_is_non_terminal() {
        assert!(!RequestStatus::Pending.is_terminal());
        assert!(RequestStatus::Approved.is_terminal());
        assert!(RequestStatus::PartiallyApproved.is_terminal());
        assert!(RequestStatus::Declined.is_terminal());
    }
}
