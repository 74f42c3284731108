use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;

use crate::services::history::Activity;
use crate::{ApiResponse, ApiResult, AppState, ListQuery, PaginatedResponse};

/// `GET /api/history/:seller_id`: unified sale/transfer activity feed.
pub async fn activity(
    State(state): State<AppState>,
    Path(seller_id): Path<Uuid>,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<Activity>> {
    let (items, total) = state
        .services
        .history
        .activity_for_seller(seller_id, query.page, query.limit)
        .await?;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page: query.page,
        limit: query.limit,
    })))
}
