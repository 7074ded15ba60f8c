use super::{handlers, ApiState};
use axum::{
    routing::{delete, get, post},
    Router,
};
use tower_http::cors::CorsLayer;

pub fn create_router(state: ApiState) -> Router {
    Router::new()
        // Withdrawals
        .route("/api/withdraw", post(handlers::create_withdrawal))
        .route("/api/withdrawals", get(handlers::list_withdrawals))
        .route("/api/withdrawals/:id", get(handlers::get_withdrawal))

        // Prices
        .route("/api/prices", get(handlers::get_prices))
        .route("/api/prices/update", post(handlers::update_prices))
        .route("/api/prices/alerts", post(handlers::check_price_alerts))
        .route("/api/prices/:symbol", get(handlers::get_price))
        .route("/api/prices/:symbol/history", get(handlers::get_price_history))
        .route("/api/prices/:symbol/details", get(handlers::get_coin_details))

        // Price alerts
        .route("/api/alerts", get(handlers::list_alerts).post(handlers::create_alert))
        .route("/api/alerts/:id", delete(handlers::delete_alert))

        // Wallets
        .route("/api/wallets", get(handlers::list_wallets))
        .route("/api/wallets/verify", post(handlers::verify_wallet))
        .route("/api/wallets/:id/disconnect", post(handlers::disconnect_wallet))

        .route("/api/dashboard", get(handlers::get_dashboard))

        // Cron jobs
        .route("/api/maintenance/cleanup-sessions", post(handlers::cleanup_sessions))
        .route("/api/maintenance/unlock-accounts", post(handlers::unlock_accounts))
        .route("/api/maintenance/lock-accounts", post(handlers::lock_accounts))
        .route("/api/maintenance/portfolio-snapshots", post(handlers::portfolio_snapshots))

        // Status
        .route("/api/ping", get(handlers::ping))
        .route("/api/health", get(handlers::health))
        .route("/api/env.js", get(handlers::env_js))

        .fallback(handlers::not_found)
        .layer(CorsLayer::permissive())
        .with_state(state)
}
