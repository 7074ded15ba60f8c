use crate::error::{AuthError, ClientError};
use crate::services::auth_service::{AuthProvider, Session};
use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Tokens this close to expiry are refreshed before use.
pub const REFRESH_MARGIN_SECS: i64 = 60;

pub fn needs_refresh(session: &Session, now: DateTime<Utc>) -> bool {
    session.expires_at - now <= Duration::seconds(REFRESH_MARGIN_SECS)
}

/// Signed-in session shared by every request the client makes.
pub struct ClientSession {
    provider: Arc<dyn AuthProvider>,
    session: Mutex<Option<Session>>,
}

impl ClientSession {
    pub fn new(provider: Arc<dyn AuthProvider>, session: Option<Session>) -> Self {
        Self {
            provider,
            session: Mutex::new(session),
        }
    }

    pub async fn is_signed_in(&self) -> bool {
        self.session.lock().await.is_some()
    }

    pub async fn set(&self, session: Session) {
        *self.session.lock().await = Some(session);
    }

    pub async fn sign_out(&self) {
        *self.session.lock().await = None;
    }

    /// Current access token, refreshed first when it is about to expire.
    /// A rejected refresh signs the session out.
    pub async fn access_token(&self) -> Result<String, ClientError> {
        let mut guard = self.session.lock().await;
        let Some(current) = guard.as_ref() else {
            return Err(AuthError::MissingToken.into());
        };

        if !needs_refresh(current, Utc::now()) {
            return Ok(current.access_token.clone());
        }
        let refresh_token = current.refresh_token.clone();

        let result = self.provider.refresh_session(&refresh_token).await;
        match result {
            Ok(refreshed) => {
                info!("🔄 Session refreshed, expires at {}", refreshed.expires_at);
                let token = refreshed.access_token.clone();
                *guard = Some(refreshed);
                Ok(token)
            }
            Err(AuthError::InvalidToken) => {
                warn!("⚠️ Refresh token rejected, signing out");
                *guard = None;
                Err(AuthError::InvalidToken.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::auth_service::AuthIdentity;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingProvider {
        refreshes: AtomicUsize,
        reject: bool,
    }

    #[async_trait]
    impl AuthProvider for CountingProvider {
        async fn verify_token(&self, _token: &str) -> Result<AuthIdentity, AuthError> {
            Err(AuthError::InvalidToken)
        }

        async fn refresh_session(&self, refresh_token: &str) -> Result<Session, AuthError> {
            self.refreshes.fetch_add(1, Ordering::SeqCst);
            if self.reject {
                return Err(AuthError::InvalidToken);
            }
            Ok(session_expiring_in(Duration::hours(1), &format!("new-{}", refresh_token)))
        }
    }

    fn session_expiring_in(left: Duration, token: &str) -> Session {
        Session {
            access_token: token.to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: Utc::now() + left,
            user: AuthIdentity {
                id: "auth-1".to_string(),
                email: None,
            },
        }
    }

    fn provider(reject: bool) -> Arc<CountingProvider> {
        Arc::new(CountingProvider {
            refreshes: AtomicUsize::new(0),
            reject,
        })
    }

    #[test]
    fn test_refresh_window() {
        let now = Utc::now();
        let mut session = session_expiring_in(Duration::seconds(61), "t");
        session.expires_at = now + Duration::seconds(61);
        assert!(!needs_refresh(&session, now));
        session.expires_at = now + Duration::seconds(60);
        assert!(needs_refresh(&session, now));
        session.expires_at = now - Duration::seconds(5);
        assert!(needs_refresh(&session, now));
    }

    #[tokio::test]
    async fn test_fresh_token_is_used_as_is() {
        let auth = provider(false);
        let session = ClientSession::new(auth.clone(), Some(session_expiring_in(Duration::minutes(30), "old")));

        assert_eq!(session.access_token().await.unwrap(), "old");
        assert_eq!(auth.refreshes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_expiring_token_is_refreshed_once() {
        let auth = provider(false);
        let session = ClientSession::new(auth.clone(), Some(session_expiring_in(Duration::seconds(30), "old")));

        assert_eq!(session.access_token().await.unwrap(), "new-refresh");
        assert_eq!(session.access_token().await.unwrap(), "new-refresh");
        assert_eq!(auth.refreshes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_rejected_refresh_signs_out() {
        let session = ClientSession::new(provider(true), Some(session_expiring_in(Duration::seconds(10), "old")));

        assert!(session.access_token().await.unwrap_err().is_unauthorized());
        assert!(!session.is_signed_in().await);
    }
}
