use crate::types::WithdrawalStatus;
use axum::http::StatusCode;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Failure raised by the persistence gateway.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("store error: {0}")]
    Backend(String),

    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    #[error("withdrawal {id} is already {status} and cannot change")]
    TerminalStatus { id: Uuid, status: WithdrawalStatus },

    #[error("available balance {available} does not cover {required}")]
    InsufficientFunds { available: Decimal, required: Decimal },

    #[error("invalid value: {0}")]
    Invalid(String),

    #[error("{0}")]
    Json(#[from] serde_json::Error),
}

/// Failure of the withdrawal commit phase. Each variant maps to one HTTP status.
#[derive(Error, Debug)]
pub enum WithdrawError {
    #[error("{0}")]
    Auth(String),

    #[error("{0}")]
    Validation(String),

    #[error("Wallet not found or does not belong to user")]
    Ownership,

    #[error("{0}")]
    NotFound(String),

    #[error("{symbol} not found in wallet")]
    AssetNotHeld { symbol: String },

    #[error("Insufficient balance. Available: {} {symbol}", .available.normalize())]
    InsufficientBalance { symbol: String, available: Decimal },

    #[error("Insufficient balance including fees. Required: {} {symbol}", .required.normalize())]
    InsufficientBalanceIncludingFee { symbol: String, required: Decimal },

    #[error("Insufficient balance after pending withdrawals. Available: {} {symbol}", .available.normalize())]
    BalanceReserved { symbol: String, available: Decimal },

    #[error(transparent)]
    Persistence(PersistenceError),

    #[error("{0}")]
    Unknown(String),
}

impl WithdrawError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Auth(_) => StatusCode::UNAUTHORIZED,
            Self::Validation(_)
            | Self::AssetNotHeld { .. }
            | Self::InsufficientBalance { .. }
            | Self::InsufficientBalanceIncludingFee { .. }
            | Self::BalanceReserved { .. } => StatusCode::BAD_REQUEST,
            Self::Ownership => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Persistence(_) | Self::Unknown(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to return to the caller. Upstream detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            Self::Persistence(_) | Self::Unknown(_) => "Internal server error".to_string(),
            other => other.to_string(),
        }
    }
}

impl From<PersistenceError> for WithdrawError {
    fn from(e: PersistenceError) -> Self {
        Self::Persistence(e)
    }
}

impl From<AuthError> for WithdrawError {
    fn from(e: AuthError) -> Self {
        match e {
            AuthError::MissingToken | AuthError::InvalidToken => Self::Auth(e.to_string()),
            AuthError::Upstream(msg) => Self::Unknown(format!("auth provider: {}", msg)),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("Missing or invalid authorization header")]
    MissingToken,

    #[error("Unauthorized")]
    InvalidToken,

    #[error("auth provider unavailable: {0}")]
    Upstream(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(e: reqwest::Error) -> Self {
        Self::Upstream(e.to_string())
    }
}

/// Signed-challenge ownership check failure. Never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("invalid signature: {0}")]
    InvalidSignature(String),

    #[error("invalid wallet address: {0}")]
    InvalidAddress(String),

    #[error("challenge does not reference address {0}")]
    ChallengeMismatch(String),

    #[error("signature was produced by {recovered}, not {claimed}")]
    SignerMismatch { claimed: String, recovered: String },
}

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Failure talking to the HTTP API from the client side.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("api error {status}: {message}")]
    Api { status: u16, message: String },

    #[error(transparent)]
    Auth(#[from] AuthError),
}

impl ClientError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api { status: 401, .. } | Self::Auth(_))
    }
}

#[derive(Error, Debug)]
pub enum WalletError {
    #[error("wallet is not connected")]
    NotConnected,

    #[error("sign in before verifying a wallet")]
    NotAuthenticated,

    #[error("wallet provider: {0}")]
    Provider(String),

    #[error("connection cache: {0}")]
    Cache(String),

    #[error(transparent)]
    Verification(#[from] VerificationError),

    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Aggregated start-up configuration failure.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_balance_messages_are_distinct() {
        let plain = WithdrawError::InsufficientBalance {
            symbol: "BTC".to_string(),
            available: dec!(0.500000000000000000),
        };
        let with_fee = WithdrawError::InsufficientBalanceIncludingFee {
            symbol: "BTC".to_string(),
            required: dec!(1.01),
        };

        assert_eq!(plain.to_string(), "Insufficient balance. Available: 0.5 BTC");
        assert_eq!(
            with_fee.to_string(),
            "Insufficient balance including fees. Required: 1.01 BTC"
        );
        assert_eq!(plain.status(), with_fee.status());
    }

    #[test]
    fn test_persistence_detail_is_not_public() {
        let err = WithdrawError::from(PersistenceError::Backend("connection reset".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.public_message(), "Internal server error");
    }

    #[test]
    fn test_upstream_auth_failure_is_server_error() {
        let err = WithdrawError::from(AuthError::Upstream("timeout".into()));
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let err = WithdrawError::from(AuthError::InvalidToken);
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(err.public_message(), "Unauthorized");
    }
}
