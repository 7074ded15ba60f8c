pub mod api_types;
pub mod models;
pub mod price_quote;

pub use api_types::*;
pub use models::*;
pub use price_quote::*;
