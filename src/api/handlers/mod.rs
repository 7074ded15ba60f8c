pub mod alert_handlers;
pub mod dashboard_handlers;
pub mod env_handlers;
pub mod maintenance_handlers;
pub mod price_handlers;
pub mod status_handlers;
pub mod wallet_handlers;
pub mod withdraw_handlers;

pub use alert_handlers::*;
pub use dashboard_handlers::*;
pub use env_handlers::*;
pub use maintenance_handlers::*;
pub use price_handlers::*;
pub use status_handlers::*;
pub use wallet_handlers::*;
pub use withdraw_handlers::*;
