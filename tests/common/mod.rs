//! Test harness backed by an in-memory SQLite database with the full
//! schema, plus seed helpers for materials, projects, and order requests.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use std::sync::Arc;
use uuid::Uuid;

use surplusyard_api::db;
use surplusyard_api::entities::material::{self, AcquisitionType, InventoryType, ListingType};
use surplusyard_api::entities::order_request::{self, RequestStatus};
use surplusyard_api::entities::{notification, order, project, transaction_history};
use surplusyard_api::services::materials::generate_listing_id;
use surplusyard_api::services::AppServices;

#[allow(dead_code)]
pub struct TestApp {
    pub db: Arc<DatabaseConnection>,
    pub services: AppServices,
}

#[allow(dead_code)]
impl TestApp {
    pub async fn new() -> Self {
        let db = Arc::new(
            db::connect_in_memory()
                .await
                .expect("failed to create in-memory test database"),
        );
        let services = AppServices::new(db.clone(), None);
        Self { db, services }
    }

    pub async fn seed_project(&self, owner_id: Uuid, name: &str) -> project::Model {
        project::ActiveModel {
            owner_id: Set(owner_id),
            name: Set(name.to_string()),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .expect("seed project")
    }

    pub async fn seed_material(
        &self,
        seller_id: Uuid,
        project_id: Option<Uuid>,
        name: &str,
        quantity: i32,
        price_today: Decimal,
    ) -> material::Model {
        material::ActiveModel {
            listing_id: Set(generate_listing_id()),
            seller_id: Set(seller_id),
            project_id: Set(project_id),
            material: Set(name.to_string()),
            brand: Set(None),
            category: Set(Some("Sanitary".to_string())),
            condition: Set(Some("good".to_string())),
            quantity: Set(quantity),
            unit: Set(Some("units".to_string())),
            price_today: Set(price_today),
            mrp: Set(None),
            price_purchased: Set(None),
            inventory_value: Set(price_today * Decimal::from(quantity)),
            inventory_type: Set(InventoryType::Surplus.as_str().to_string()),
            listing_type: Set(ListingType::Resale.as_str().to_string()),
            acquisition_type: Set(AcquisitionType::Purchased.as_str().to_string()),
            is_being_edited: Set(false),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .expect("seed material")
    }

    /// Seeds a pending request with an explicit creation time, so tests
    /// control the FCFS order precisely.
    pub async fn seed_request_at(
        &self,
        material: &material::Model,
        buyer_id: Uuid,
        quantity: i32,
        created_at: DateTime<Utc>,
    ) -> order_request::Model {
        order_request::ActiveModel {
            material_id: Set(material.id),
            buyer_id: Set(buyer_id),
            seller_id: Set(material.seller_id),
            quantity: Set(quantity),
            unit_price: Set(material.price_today),
            total_amount: Set(material.price_today * Decimal::from(quantity)),
            status: Set(RequestStatus::Pending.as_str().to_string()),
            buyer_company: Set(Some("Acme Builders".to_string())),
            buyer_contact_person: Set(Some("Pat".to_string())),
            delivery_address: Set(Some("1 Site Road".to_string())),
            created_at: Set(created_at),
            ..Default::default()
        }
        .insert(&*self.db)
        .await
        .expect("seed order request")
    }

    pub async fn find_material(&self, id: Uuid) -> Option<material::Model> {
        material::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .expect("query material")
    }

    pub async fn find_request(&self, id: Uuid) -> order_request::Model {
        order_request::Entity::find_by_id(id)
            .one(&*self.db)
            .await
            .expect("query request")
            .expect("request should exist")
    }

    pub async fn orders_for_request(&self, request_id: Uuid) -> Vec<order::Model> {
        order::Entity::find()
            .filter(order::Column::OrderRequestId.eq(request_id))
            .all(&*self.db)
            .await
            .expect("query orders")
    }

    pub async fn notifications_for(&self, user_id: Uuid) -> Vec<notification::Model> {
        notification::Entity::find()
            .filter(notification::Column::UserId.eq(user_id))
            .all(&*self.db)
            .await
            .expect("query notifications")
    }

    pub async fn history_for(&self, seller_id: Uuid) -> Vec<transaction_history::Model> {
        transaction_history::Entity::find()
            .filter(transaction_history::Column::SellerId.eq(seller_id))
            .all(&*self.db)
            .await
            .expect("query history")
    }

    pub async fn materials_in_project(&self, project_id: Uuid) -> Vec<material::Model> {
        material::Entity::find()
            .filter(material::Column::ProjectId.eq(project_id))
            .all(&*self.db)
            .await
            .expect("query project materials")
    }
}
