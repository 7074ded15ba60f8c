pub mod alert_operations;
pub mod asset_operations;
pub mod audit_operations;
pub mod maintenance_operations;
pub mod portfolio_operations;
pub mod price_operations;
pub mod system_operations;
pub mod transaction_operations;
pub mod user_operations;
pub mod wallet_operations;
pub mod withdrawal_operations;

pub use alert_operations::*;
pub use asset_operations::*;
pub use audit_operations::*;
pub use maintenance_operations::*;
pub use portfolio_operations::*;
pub use price_operations::*;
pub use system_operations::*;
pub use transaction_operations::*;
pub use user_operations::*;
pub use wallet_operations::*;
pub use withdrawal_operations::*;
