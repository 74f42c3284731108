use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::entities::notification;
use crate::{ApiResponse, ApiResult, AppState, ListQuery};

/// `GET /api/notifications/:user_id`: latest notifications, newest first.
pub async fn list(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> ApiResult<Vec<notification::Model>> {
    let notifications = state
        .services
        .notifications
        .list_for_user(user_id, query.limit)
        .await?;

    Ok(Json(ApiResponse::success(notifications)))
}

/// `PUT /api/notifications/:id/read`: flips the read flag.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
) -> ApiResult<bool> {
    state.services.notifications.mark_read(notification_id).await?;
    Ok(Json(ApiResponse::success(true)))
}
