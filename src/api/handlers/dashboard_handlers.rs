use super::super::{ApiError, ApiState};
use crate::types::{ApiResponse, DashboardView};
use axum::{extract::State, http::HeaderMap, response::Json};

pub async fn get_dashboard(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<DashboardView>>, ApiError> {
    let user = state.current_user(&headers).await?;
    let view = state.dashboard().fetch(user.id).await?;
    Ok(Json(ApiResponse::ok(view)))
}
