use crate::error::AuthError;
use async_trait::async_trait;
use axum::http::{header, HeaderMap, StatusCode};
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthIdentity {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub user: AuthIdentity,
}

/// The hosted identity provider: token verification and session refresh.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// `InvalidToken` when the provider rejects the token, `Upstream` when it
    /// cannot be reached.
    async fn verify_token(&self, token: &str) -> Result<AuthIdentity, AuthError>;

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AuthError>;
}

/// Extracts the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let value = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingToken)?;

    match value.strip_prefix("Bearer ") {
        Some(token) if !token.trim().is_empty() => Ok(token.trim()),
        _ => Err(AuthError::MissingToken),
    }
}

pub async fn authenticate(
    provider: &dyn AuthProvider,
    headers: &HeaderMap,
) -> Result<AuthIdentity, AuthError> {
    let token = bearer_token(headers)?;
    provider.verify_token(token).await
}

pub struct SupabaseAuth {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
    service_role_key: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: AuthIdentity,
}

impl SupabaseAuth {
    pub fn new(
        base_url: &str,
        anon_key: &str,
        service_role_key: &str,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            service_role_key: service_role_key.to_string(),
        })
    }
}

fn rejected(status: StatusCode) -> bool {
    matches!(
        status,
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
    )
}

#[async_trait]
impl AuthProvider for SupabaseAuth {
    async fn verify_token(&self, token: &str) -> Result<AuthIdentity, AuthError> {
        let response = self
            .client
            .get(format!("{}/auth/v1/user", self.base_url))
            .header("apikey", &self.service_role_key)
            .bearer_auth(token)
            .send()
            .await?;

        let status = response.status();
        if rejected(status) {
            return Err(AuthError::InvalidToken);
        }
        if !status.is_success() {
            error!("❌ Auth provider answered {} while verifying a token", status);
            return Err(AuthError::Upstream(format!("status {}", status)));
        }

        Ok(response.json().await?)
    }

    async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AuthError> {
        let response = self
            .client
            .post(format!("{}/auth/v1/token", self.base_url))
            .query(&[("grant_type", "refresh_token")])
            .header("apikey", &self.anon_key)
            .json(&serde_json::json!({ "refresh_token": refresh_token }))
            .send()
            .await?;

        let status = response.status();
        if rejected(status) {
            return Err(AuthError::InvalidToken);
        }
        if !status.is_success() {
            return Err(AuthError::Upstream(format!("status {}", status)));
        }

        let body: TokenResponse = response.json().await?;
        let expires_at = body
            .expires_at
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .unwrap_or_else(|| Utc::now() + ChronoDuration::seconds(body.expires_in.unwrap_or(3600)));

        Ok(Session {
            access_token: body.access_token,
            refresh_token: body.refresh_token,
            expires_at,
            user: body.user,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_bearer_token_extraction() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Ok("abc.def"));
        assert_eq!(bearer_token(&headers("Basic abc")), Err(AuthError::MissingToken));
        assert_eq!(bearer_token(&headers("Bearer   ")), Err(AuthError::MissingToken));
        assert_eq!(bearer_token(&HeaderMap::new()), Err(AuthError::MissingToken));
    }

    #[tokio::test]
    async fn test_unreachable_provider_is_upstream_failure() {
        let auth = SupabaseAuth::new("http://127.0.0.1:1", "anon", "service", Duration::from_secs(1))
            .unwrap();
        let err = auth.verify_token("token").await.unwrap_err();
        assert!(matches!(err, AuthError::Upstream(_)));
    }
}
