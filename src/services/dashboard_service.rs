use crate::database::PortfolioStore;
use crate::error::PersistenceError;
use crate::services::price_service::PriceSource;
use crate::types::DashboardView;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::time;
use tracing::{debug, error};
use uuid::Uuid;

pub const TRANSACTION_PAGE_SIZE: i64 = 10;
pub const REFRESH_INTERVAL: Duration = Duration::from_secs(30);

pub struct DashboardService {
    store: Arc<dyn PortfolioStore>,
    prices: Arc<dyn PriceSource>,
}

impl DashboardService {
    pub fn new(store: Arc<dyn PortfolioStore>, prices: Arc<dyn PriceSource>) -> Self {
        Self { store, prices }
    }

    /// Issues the four store reads concurrently, then one batch price call for
    /// the distinct held symbols.
    pub async fn fetch(&self, user_id: Uuid) -> Result<DashboardView, PersistenceError> {
        let (portfolio_value, portfolio_change, assets, transactions) = tokio::try_join!(
            self.store.portfolio_value(user_id),
            self.store.portfolio_24h_change(user_id),
            self.store.get_user_assets(user_id),
            self.store
                .get_transaction_history(user_id, TRANSACTION_PAGE_SIZE, 0),
        )?;

        let symbols: Vec<String> = assets
            .iter()
            .map(|a| a.symbol.to_uppercase())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        let prices: BTreeMap<_, _> = if symbols.is_empty() {
            BTreeMap::new()
        } else {
            self.prices.get_prices(&symbols).await.into_iter().collect()
        };

        Ok(DashboardView {
            portfolio_value,
            portfolio_change,
            assets,
            transactions,
            prices,
            refreshed_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DashboardState {
    pub view: Option<DashboardView>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    Refreshed,
    /// Another refresh was already running; the snapshot it produces wins.
    Skipped,
    Failed(String),
}

/// Keeps one user's dashboard current. Timer ticks and manual requests go
/// through the same `refresh`, and at most one refresh runs at a time.
pub struct DashboardPoller {
    service: Arc<DashboardService>,
    user_id: Uuid,
    state: watch::Sender<DashboardState>,
    in_flight: Mutex<()>,
}

impl DashboardPoller {
    pub fn new(service: Arc<DashboardService>, user_id: Uuid) -> Self {
        let (state, _) = watch::channel(DashboardState::default());
        Self {
            service,
            user_id,
            state,
            in_flight: Mutex::new(()),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<DashboardState> {
        self.state.subscribe()
    }

    pub fn current(&self) -> DashboardState {
        self.state.borrow().clone()
    }

    pub async fn refresh(&self) -> RefreshOutcome {
        let Ok(_guard) = self.in_flight.try_lock() else {
            debug!("Dashboard refresh already running for {}", self.user_id);
            return RefreshOutcome::Skipped;
        };

        self.state.send_modify(|s| s.loading = true);

        match self.service.fetch(self.user_id).await {
            Ok(view) => {
                self.state.send_modify(|s| {
                    s.view = Some(view);
                    s.loading = false;
                    s.error = None;
                });
                RefreshOutcome::Refreshed
            }
            Err(e) => {
                error!("❌ Dashboard refresh for {} failed: {}", self.user_id, e);
                let message = e.to_string();
                self.state.send_modify(|s| {
                    s.loading = false;
                    s.error = Some(message.clone());
                });
                RefreshOutcome::Failed(message)
            }
        }
    }

    /// Refreshes on every tick of `every` and on every message from `manual`.
    /// Returns once `manual` is closed.
    pub async fn run(self: Arc<Self>, every: Duration, mut manual: mpsc::Receiver<()>) {
        let mut interval = time::interval(every);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.refresh().await;
                }
                request = manual.recv() => match request {
                    Some(()) => {
                        self.refresh().await;
                    }
                    None => break,
                },
            }
        }
    }
}
