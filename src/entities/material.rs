use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// How the stock entered the seller's inventory in the first place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryType {
    Surplus,
    Damaged,
    Liquidation,
    New,
    Used,
    Manual,
}

impl InventoryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InventoryType::Surplus => "surplus",
            InventoryType::Damaged => "damaged",
            InventoryType::Liquidation => "liquidation",
            InventoryType::New => "new",
            InventoryType::Used => "used",
            InventoryType::Manual => "manual",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "surplus" => Some(InventoryType::Surplus),
            "damaged" => Some(InventoryType::Damaged),
            "liquidation" => Some(InventoryType::Liquidation),
            "new" => Some(InventoryType::New),
            "used" => Some(InventoryType::Used),
            "manual" => Some(InventoryType::Manual),
            _ => None,
        }
    }
}

/// Marketplace visibility state of a listing.
///
/// `Sold` is set by the allocation engine when quantity hits zero.
/// `Acquired` marks transfer-created stock that the seller has not
/// re-listed yet; the marketplace query excludes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ListingType {
    Resale,
    InternalTransfer,
    Sold,
    Acquired,
}

impl ListingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingType::Resale => "resale",
            ListingType::InternalTransfer => "internal_transfer",
            ListingType::Sold => "sold",
            ListingType::Acquired => "acquired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "resale" => Some(ListingType::Resale),
            "internal_transfer" => Some(ListingType::InternalTransfer),
            "sold" => Some(ListingType::Sold),
            "acquired" => Some(ListingType::Acquired),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AcquisitionType {
    Purchased,
    Acquired,
}

impl AcquisitionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AcquisitionType::Purchased => "purchased",
            AcquisitionType::Acquired => "acquired",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "purchased" => Some(AcquisitionType::Purchased),
            "acquired" => Some(AcquisitionType::Acquired),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "materials")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Human-facing listing code, `GS-<base36 ms>-<base36 rand>` uppercased.
    #[sea_orm(unique)]
    pub listing_id: String,

    pub seller_id: Uuid,
    pub project_id: Option<Uuid>,

    pub material: String,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub condition: Option<String>,

    /// The only column the allocation and transfer engines mutate.
    /// Invariant: never negative.
    pub quantity: i32,
    pub unit: Option<String>,

    pub price_today: Decimal,
    pub mrp: Option<Decimal>,
    pub price_purchased: Option<Decimal>,
    pub inventory_value: Decimal,

    pub inventory_type: String,
    pub listing_type: String,
    pub acquisition_type: String,

    pub specs: Option<String>,
    pub dimensions: Option<String>,
    pub weight: Option<String>,

    // Advisory edit lock. See services::edit_lock for the state machine
    // these three columns encode.
    pub is_being_edited: bool,
    pub edited_by: Option<Uuid>,
    pub edit_started_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    pub fn listing_type(&self) -> Option<ListingType> {
        ListingType::from_str(&self.listing_type)
    }

    pub fn acquisition_type(&self) -> Option<AcquisitionType> {
        AcquisitionType::from_str(&self.acquisition_type)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::order_request::Entity")]
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
        }

        active_model.updated_at = Set(Some(now));

        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn listing_type_round_trips() {
        for lt in [
            ListingType::Resale,
            ListingType::InternalTransfer,
            ListingType::Sold,
            ListingType::Acquired,
        ] {
            assert_eq!(ListingType::from_str(lt.as_str()), Some(lt));
        }
        assert_eq!(ListingType::from_str("auction"), None);
    }

    #[test]
    fn inventory_type_round_trips() {
        assert_eq!(
            InventoryType::from_str("liquidation"),
            Some(InventoryType::Liquidation)
        );
        assert_eq!(InventoryType::Surplus.as_str(), "surplus");
        assert_eq!(InventoryType::from_str(""), None);
    }
}
