use super::super::ApiState;
use crate::config::PublicConfig;
use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use tracing::error;

/// Browser snippet merging the public configuration into `window.__env__`.
pub fn env_script(config: &PublicConfig) -> Result<String, serde_json::Error> {
    let payload = serde_json::to_string(config)?;
    Ok(format!(
        "window.__env__ = Object.assign(window.__env__ || {{}}, {});",
        payload
    ))
}

pub async fn env_js(State(state): State<ApiState>) -> Response {
    let script = match env_script(&state.public_config) {
        Ok(script) => script,
        Err(e) => {
            error!("❌ Failed to serialize public config: {}", e);
            "window.__env__ = window.__env__ || {};".to_string()
        }
    };

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "application/javascript; charset=utf-8"),
            (header::CACHE_CONTROL, "no-store, no-cache, must-revalidate, private"),
        ],
        script,
    )
        .into_response()
}
