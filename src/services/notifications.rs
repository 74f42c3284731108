//! Database-backed notification sink.
//!
//! Engines append rows through their own transaction with [`record`]; the
//! service wrapper covers standalone sends and the read side (listing,
//! unread counts, read-flag toggling). Notification failures never fail
//! the business operation that triggered them.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DbErr, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
};
use std::sync::Arc;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::entities::notification::{self, Entity as NotificationEntity, NotificationKind};
use crate::errors::ServiceError;

/// Appends a notification row on the given connection, which may be a
/// live transaction.
pub async fn record<C: ConnectionTrait>(
    conn: &C,
    user_id: Uuid,
    kind: NotificationKind,
    title: &str,
    message: &str,
    related_id: Option<Uuid>,
    data: Option<serde_json::Value>,
) -> Result<notification::Model, DbErr> {
    let active = notification::ActiveModel {
        user_id: Set(user_id),
        kind: Set(kind.as_str().to_string()),
        title: Set(title.to_string()),
        message: Set(message.to_string()),
        related_id: Set(related_id),
        data: Set(data),
        ..Default::default()
    };

    active.insert(conn).await
}

#[derive(Clone)]
pub struct NotificationService {
    db: Arc<DatabaseConnection>,
}

impl NotificationService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Fire-and-forget send. Failures are logged and swallowed: delivery
    /// is never allowed to fail a business operation.
    #[instrument(skip(self, title, message, data))]
    pub async fn notify(
        &self,
        user_id: Uuid,
        kind: NotificationKind,
        title: &str,
        message: &str,
        related_id: Option<Uuid>,
        data: Option<serde_json::Value>,
    ) {
        if let Err(e) = record(&*self.db, user_id, kind, title, message, related_id, data).await {
            warn!(error = %e, user_id = %user_id, "Failed to record notification");
        }
    }

    /// Latest notifications for a user, newest first.
    #[instrument(skip(self))]
    pub async fn list_for_user(
        &self,
        user_id: Uuid,
        limit: u64,
    ) -> Result<Vec<notification::Model>, ServiceError> {
        let notifications = NotificationEntity::find()
            .filter(notification::Column::UserId.eq(user_id))
            .order_by_desc(notification::Column::CreatedAt)
            .limit(limit)
            .all(&*self.db)
            .await?;

        Ok(notifications)
    }

    #[instrument(skip(self))]
    pub async fn unread_count(&self, user_id: Uuid) -> Result<u64, ServiceError> {
        let count = NotificationEntity::find()
            .filter(notification::Column::UserId.eq(user_id))
            .filter(notification::Column::Read.eq(false))
            .count(&*self.db)
            .await?;

        Ok(count)
    }

    #[instrument(skip(self))]
    pub async fn mark_read(&self, notification_id: Uuid) -> Result<(), ServiceError> {
        let notification = NotificationEntity::find_by_id(notification_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Notification {} not found", notification_id))
            })?;

        if notification.read {
            return Ok(());
        }

        let mut active: notification::ActiveModel = notification.into();
        active.read = Set(true);
        active.update(&*self.db).await?;

        Ok(())
    }
}
