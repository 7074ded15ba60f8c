use super::super::{ApiError, ApiState};
use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};
use tracing::error;

pub async fn ping() -> Json<Value> {
    Json(json!({ "message": "ping" }))
}

// Store round trip
pub async fn health(State(state): State<ApiState>) -> (StatusCode, Json<Value>) {
    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({ "ok": true, "message": "Connected to database" })),
        ),
        Err(e) => {
            error!("❌ Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "ok": false, "error": "Database unavailable" })),
            )
        }
    }
}

pub async fn not_found() -> ApiError {
    ApiError::not_found("Route not found")
}
