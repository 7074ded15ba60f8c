pub mod api;
pub mod client;
pub mod config;
pub mod database;
pub mod error;
pub mod services;
pub mod types;

pub use config::Config;
pub use database::{Database, MemoryStore, PortfolioStore};
pub use types::*;
