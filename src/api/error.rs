use crate::error::{AuthError, PersistenceError, RegistrationError, WithdrawError};
use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::de::DeserializeOwned;
use serde_json::json;
use tracing::error;

pub const INVALID_API_KEY: &str = "Unauthorized - Invalid API key";
const INTERNAL: &str = "Internal server error";

/// Every failed request renders as `{"success": false, "error": ...}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn invalid_api_key() -> Self {
        Self::new(StatusCode::UNAUTHORIZED, INVALID_API_KEY)
    }

    /// Logs the detail and hides it from the caller.
    pub fn internal(detail: impl std::fmt::Display) -> Self {
        error!("❌ {}", detail);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "success": false, "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

impl From<PersistenceError> for ApiError {
    fn from(e: PersistenceError) -> Self {
        Self::internal(format!("store: {}", e))
    }
}

impl From<AuthError> for ApiError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::MissingToken | AuthError::InvalidToken => {
                Self::new(StatusCode::UNAUTHORIZED, e.to_string())
            }
            AuthError::Upstream(_) => Self::internal(e),
        }
    }
}

/// Already logged by the withdrawal service.
impl From<WithdrawError> for ApiError {
    fn from(e: WithdrawError) -> Self {
        Self::new(e.status(), e.public_message())
    }
}

impl From<RegistrationError> for ApiError {
    fn from(e: RegistrationError) -> Self {
        match e {
            RegistrationError::Verification(v) => Self::bad_request(v.to_string()),
            RegistrationError::Persistence(p) => p.into(),
        }
    }
}

impl From<PathRejection> for ApiError {
    fn from(e: PathRejection) -> Self {
        Self::bad_request(e.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(e: QueryRejection) -> Self {
        Self::bad_request(e.body_text())
    }
}

/// Parses a raw JSON body. Handlers call this after authenticating so a bad
/// token wins over a bad body.
pub fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("Invalid request body: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_internal_errors_hide_detail() {
        let err = ApiError::from(PersistenceError::Backend("password=hunter2".into()));
        assert_eq!(err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(!err.message.contains("hunter2"));
    }

    #[test]
    fn test_auth_errors_map_to_unauthorized() {
        assert_eq!(ApiError::from(AuthError::MissingToken).status, StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::from(AuthError::InvalidToken).status, StatusCode::UNAUTHORIZED);
        assert_eq!(
            ApiError::from(AuthError::Upstream("down".into())).status,
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_bad_body_is_bad_request() {
        let err = parse_body::<crate::types::CreateAlertBody>(br#"{"symbol":"BTC"}"#).unwrap_err();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert!(err.message.starts_with("Invalid request body"));
    }
}
