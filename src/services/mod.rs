pub mod api_service;
pub mod auth_service;
pub mod dashboard_service;
pub mod price_service;
pub mod wallet_service;
pub mod withdrawal_service;

pub use api_service::ApiService;
pub use auth_service::{AuthProvider, SupabaseAuth};
pub use dashboard_service::{DashboardPoller, DashboardService};
pub use price_service::{CoinGeckoClient, PriceService, PriceSource};
pub use withdrawal_service::WithdrawalService;
