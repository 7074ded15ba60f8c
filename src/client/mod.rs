//! Client side of the portfolio: wallet connection, withdrawal review and an
//! authenticated API client.

pub mod api_client;
pub mod session;
pub mod wallet_connect;
pub mod withdraw_review;

pub use api_client::ApiClient;
pub use session::ClientSession;
pub use wallet_connect::{ConnectionState, WalletConnector, WalletProvider};
pub use withdraw_review::{ReviewStep, WithdrawReview};
