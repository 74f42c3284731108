use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::entities::internal_transfer;
use crate::services::transfer::{TransferReceipt, TransferRequest};
use crate::{ApiResponse, ApiResult, AppState};

/// `POST /api/internal-transfers`: atomic project-to-project stock move.
pub async fn create_transfer(
    State(state): State<AppState>,
    Json(payload): Json<TransferRequest>,
) -> ApiResult<TransferReceipt> {
    let receipt = state.services.transfer.transfer(payload).await?;
    Ok(Json(ApiResponse::success_with_message(
        receipt,
        "Transfer completed successfully",
    )))
}

/// `GET /api/internal-transfers/:user_id`: transfer history, newest first.
pub async fn list_transfers(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Vec<internal_transfer::Model>> {
    let transfers = state.services.transfer.list_for_user(user_id).await?;
    Ok(Json(ApiResponse::success(transfers)))
}
