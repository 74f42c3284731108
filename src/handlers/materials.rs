use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::material;
use crate::services::edit_lock::{LockStatus, MaterialPatch};
use crate::services::materials::NewMaterial;
use crate::{ApiResponse, ApiResult, AppState, ListQuery, PaginatedResponse};

#[derive(Debug, Deserialize)]
pub struct LockPayload {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct EditPayload {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub patch: MaterialPatch,
}

/// `POST /api/materials`: list a new material for sale.
pub async fn create_material(
    State(state): State<AppState>,
    Json(payload): Json<NewMaterial>,
) -> ApiResult<material::Model> {
    let created = state.services.materials.create_material(payload).await?;
    Ok(Json(ApiResponse::success(created)))
}

/// `GET /api/marketplace`: buyer-visible listings.
pub async fn list_marketplace(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> ApiResult<PaginatedResponse<material::Model>> {
    let (items, total) = state
        .services
        .materials
        .list_marketplace(query.page, query.limit)
        .await?;

    Ok(Json(ApiResponse::success(PaginatedResponse {
        items,
        total,
        page: query.page,
        limit: query.limit,
    })))
}

/// `POST /api/materials/:id/lock`: take the advisory edit lock.
pub async fn lock(
    State(state): State<AppState>,
    Path(material_id): Path<Uuid>,
    Json(payload): Json<LockPayload>,
) -> ApiResult<LockStatus> {
    let status = state
        .services
        .edit_lock
        .acquire(material_id, payload.user_id)
        .await?;

    Ok(Json(ApiResponse::success(status)))
}

/// `POST /api/materials/:id/unlock`: release the lock (idempotent).
pub async fn unlock(
    State(state): State<AppState>,
    Path(material_id): Path<Uuid>,
    Json(payload): Json<LockPayload>,
) -> ApiResult<bool> {
    state
        .services
        .edit_lock
        .release(material_id, payload.user_id)
        .await?;

    Ok(Json(ApiResponse::success(true)))
}

/// `GET /api/materials/:id/lock-status`: current lock holder, if any.
pub async fn lock_status(
    State(state): State<AppState>,
    Path(material_id): Path<Uuid>,
) -> ApiResult<LockStatus> {
    let status = state.services.edit_lock.check(material_id).await?;
    Ok(Json(ApiResponse::success(status)))
}

/// `PUT /api/materials/:id/edit`: apply a patch under the edit lock.
pub async fn edit(
    State(state): State<AppState>,
    Path(material_id): Path<Uuid>,
    Json(payload): Json<EditPayload>,
) -> ApiResult<material::Model> {
    let updated = state
        .services
        .edit_lock
        .edit_with_lock(material_id, payload.user_id, payload.patch)
        .await?;

    Ok(Json(ApiResponse::success(updated)))
}
