// Core engines
pub mod allocation;
pub mod edit_lock;
pub mod transfer;

// Listings and request intake
pub mod materials;

// Side-effect sinks and read models
pub mod history;
pub mod notifications;

use sea_orm::DatabaseConnection;
use std::sync::Arc;

use crate::events::EventSender;

/// All services wired over one shared connection pool.
#[derive(Clone)]
pub struct AppServices {
    pub allocation: allocation::AllocationService,
    pub transfer: transfer::TransferService,
    pub edit_lock: edit_lock::EditLockService,
    pub materials: materials::MaterialService,
    pub notifications: notifications::NotificationService,
    pub history: history::HistoryService,
}

impl AppServices {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            allocation: allocation::AllocationService::new(db.clone(), event_sender.clone()),
            transfer: transfer::TransferService::new(db.clone(), event_sender.clone()),
            edit_lock: edit_lock::EditLockService::new(db.clone()),
            materials: materials::MaterialService::new(db.clone(), event_sender),
            notifications: notifications::NotificationService::new(db.clone()),
            history: history::HistoryService::new(db),
        }
    }
}
