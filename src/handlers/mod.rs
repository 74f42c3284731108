pub mod history;
pub mod materials;
pub mod notifications;
pub mod order_requests;
pub mod transfers;

use axum::{
    routing::{get, post, put},
    Json, Router,
};
use serde_json::{json, Value};

use crate::AppState;

/// All API routes, mounted under `/api` by the server binary.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/order-requests", post(order_requests::submit_request))
        .route(
            "/order-requests/bulk-approve",
            put(order_requests::bulk_approve),
        )
        .route("/order-requests/:id/approve", put(order_requests::approve))
        .route("/order-requests/:id/decline", put(order_requests::decline))
        .route("/internal-transfers", post(transfers::create_transfer))
        .route("/internal-transfers/:user_id", get(transfers::list_transfers))
        .route("/materials", post(materials::create_material))
        .route("/marketplace", get(materials::list_marketplace))
        .route("/materials/:id/lock", post(materials::lock))
        .route("/materials/:id/unlock", post(materials::unlock))
        .route("/materials/:id/lock-status", get(materials::lock_status))
        .route("/materials/:id/edit", put(materials::edit))
        .route("/notifications/:user_id", get(notifications::list))
        .route("/notifications/:id/read", put(notifications::mark_read))
        .route("/history/:seller_id", get(history::activity))
        .route("/health", get(health))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
