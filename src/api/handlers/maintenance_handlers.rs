use super::super::{error::INVALID_API_KEY, ApiState};
use crate::database::PortfolioStore;
use crate::error::PersistenceError;
use crate::types::NewPortfolioSnapshot;
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    response::Json,
};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tracing::{error, info, warn};

pub const API_KEY_HEADER: &str = "x-api-key";

pub type CronResponse = (StatusCode, Json<Value>);

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Checks `X-API-Key` against the configured cron key.
pub fn has_valid_api_key(state: &ApiState, headers: &HeaderMap) -> bool {
    let Some(provided) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    !state.cron_api_key.is_empty()
        && constant_time_eq(provided.as_bytes(), state.cron_api_key.as_bytes())
}

/// Failure body for cron endpoints. Counters are reported as zero so callers
/// can always read them.
pub fn cron_failure(status: StatusCode, counters: &[&str], error: &str) -> CronResponse {
    let mut body = json!({ "success": false, "error": error });
    for counter in counters {
        body[*counter] = json!(0);
    }
    (status, Json(body))
}

pub fn cron_unauthorized(counters: &[&str]) -> CronResponse {
    warn!("⚠️ Rejected cron request with missing or invalid API key");
    cron_failure(StatusCode::UNAUTHORIZED, counters, INVALID_API_KEY)
}

async fn run_cleanup_job<F, Fut>(
    state: &ApiState,
    headers: &HeaderMap,
    job: F,
    message: fn(u64) -> String,
) -> CronResponse
where
    F: FnOnce(ApiState) -> Fut,
    Fut: std::future::Future<Output = Result<u64, PersistenceError>>,
{
    if !has_valid_api_key(state, headers) {
        return cron_unauthorized(&["cleaned"]);
    }

    match job(state.clone()).await {
        Ok(cleaned) => {
            let message = message(cleaned);
            info!("🧹 {}", message);
            (
                StatusCode::OK,
                Json(json!({ "success": true, "cleaned": cleaned, "message": message })),
            )
        }
        Err(e) => {
            error!("❌ Maintenance job failed: {}", e);
            cron_failure(StatusCode::INTERNAL_SERVER_ERROR, &["cleaned"], "Internal server error")
        }
    }
}

pub async fn cleanup_sessions(State(state): State<ApiState>, headers: HeaderMap) -> CronResponse {
    run_cleanup_job(
        &state,
        &headers,
        |s| async move { s.store.cleanup_expired_sessions().await },
        |n| format!("Cleaned up {} expired sessions", n),
    )
    .await
}

pub async fn unlock_accounts(State(state): State<ApiState>, headers: HeaderMap) -> CronResponse {
    run_cleanup_job(
        &state,
        &headers,
        |s| async move { s.store.unlock_expired_account_locks().await },
        |n| format!("Unlocked {} accounts", n),
    )
    .await
}

pub async fn lock_accounts(State(state): State<ApiState>, headers: HeaderMap) -> CronResponse {
    run_cleanup_job(
        &state,
        &headers,
        |s| async move { s.store.lock_accounts_excessive_attempts().await },
        |n| format!("Locked {} accounts with excessive failed logins", n),
    )
    .await
}

/// Values a portfolio in another asset given both USD prices.
fn value_in(total_usd: Decimal, price_usd: Option<Decimal>) -> Option<Decimal> {
    price_usd
        .filter(|p| !p.is_zero())
        .and_then(|p| total_usd.checked_div(p))
        .map(|v| v.round_dp(18))
}

/// Snapshots every user holding assets. One user's failure does not stop the
/// rest.
async fn snapshot_all(store: &dyn PortfolioStore) -> Result<(u64, u64), PersistenceError> {
    let btc = store.get_latest_price("BTC").await?.map(|p| p.price_usd);
    let eth = store.get_latest_price("ETH").await?.map(|p| p.price_usd);

    let mut created = 0;
    let mut failed = 0;

    for user_id in store.list_users_with_assets().await? {
        let result = async {
            let value = store.portfolio_value(user_id).await?;
            let allocation = store.portfolio_allocation(user_id).await?;

            let snapshot = NewPortfolioSnapshot {
                user_id,
                total_value_usd: value.total_value_usd,
                total_value_btc: value_in(value.total_value_usd, btc),
                total_value_eth: value_in(value.total_value_usd, eth),
                assets_count: i32::try_from(value.assets_count).unwrap_or(i32::MAX),
                allocation_data: Some(serde_json::to_value(&allocation)?),
            };
            store.create_portfolio_snapshot(&snapshot).await
        }
        .await;

        match result {
            Ok(_) => created += 1,
            Err(e) => {
                error!("❌ Snapshot for user {} failed: {}", user_id, e);
                failed += 1;
            }
        }
    }

    Ok((created, failed))
}

pub async fn portfolio_snapshots(
    State(state): State<ApiState>,
    headers: HeaderMap,
) -> CronResponse {
    const COUNTERS: &[&str] = &["created", "failed"];

    if !has_valid_api_key(&state, &headers) {
        return cron_unauthorized(COUNTERS);
    }

    match snapshot_all(state.store.as_ref()).await {
        Ok((created, failed)) => {
            info!("📸 Portfolio snapshots: {} created, {} failed", created, failed);
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "created": created,
                    "failed": failed,
                    "message": format!("Created {} portfolio snapshots, {} failed", created, failed),
                })),
            )
        }
        Err(e) => {
            error!("❌ Portfolio snapshot job failed: {}", e);
            cron_failure(StatusCode::INTERNAL_SERVER_ERROR, COUNTERS, "Internal server error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secreT"));
        assert!(!constant_time_eq(b"secret", b"secret2"));
    }

    #[test]
    fn test_value_in_other_asset() {
        assert_eq!(value_in(dec!(85000), Some(dec!(42500))), Some(dec!(2)));
        assert_eq!(value_in(dec!(100), Some(Decimal::ZERO)), None);
        assert_eq!(value_in(dec!(100), None), None);
    }

    #[test]
    fn test_failure_body_carries_zero_counters() {
        let (status, Json(body)) = cron_failure(StatusCode::UNAUTHORIZED, &["updated", "failed"], "nope");
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["success"], json!(false));
        assert_eq!(body["updated"], json!(0));
        assert_eq!(body["failed"], json!(0));
        assert_eq!(body["error"], json!("nope"));
    }
}
