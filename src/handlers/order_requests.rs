use axum::{
    extract::{Path, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::services::allocation::ApprovalSummary;
use crate::services::materials::NewOrderRequest;
use crate::{entities::order_request, ApiResponse, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct BulkApprovePayload {
    pub request_ids: Vec<Uuid>,
    pub seller_notes: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SellerNotesPayload {
    pub seller_notes: Option<String>,
}

/// `POST /api/order-requests`: buyer submits a request against a listing.
pub async fn submit_request(
    State(state): State<AppState>,
    Json(payload): Json<NewOrderRequest>,
) -> ApiResult<order_request::Model> {
    let created = state.services.materials.submit_request(payload).await?;
    Ok(Json(ApiResponse::success(created)))
}

/// `PUT /api/order-requests/bulk-approve`: FCFS batch approval.
pub async fn bulk_approve(
    State(state): State<AppState>,
    Json(payload): Json<BulkApprovePayload>,
) -> ApiResult<ApprovalSummary> {
    let summary = state
        .services
        .allocation
        .approve_requests(&payload.request_ids, payload.seller_notes.as_deref())
        .await?;

    let message = format!(
        "Successfully processed {} requests. {} approved.",
        summary.total_processed, summary.total_approved
    );
    Ok(Json(ApiResponse::success_with_message(summary, message)))
}

/// `PUT /api/order-requests/:id/approve`: single-request approval.
pub async fn approve(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<SellerNotesPayload>,
) -> ApiResult<ApprovalSummary> {
    let summary = state
        .services
        .allocation
        .approve_request(request_id, payload.seller_notes.as_deref())
        .await?;

    Ok(Json(ApiResponse::success_with_message(
        summary,
        "Order request approved successfully",
    )))
}

/// `PUT /api/order-requests/:id/decline`: status-only decline.
pub async fn decline(
    State(state): State<AppState>,
    Path(request_id): Path<Uuid>,
    Json(payload): Json<SellerNotesPayload>,
) -> ApiResult<order_request::Model> {
    let declined = state
        .services
        .allocation
        .decline_request(request_id, payload.seller_notes.as_deref())
        .await?;

    Ok(Json(ApiResponse::success_with_message(
        declined,
        "Order request declined",
    )))
}
