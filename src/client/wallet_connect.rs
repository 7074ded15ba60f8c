use crate::error::{ClientError, WalletError};
use crate::services::wallet_service::{challenge_message, format_address, verify_ownership};
use crate::types::{Wallet, WalletVerifyBody};
use async_trait::async_trait;
use chrono::Utc;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Address;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected { address: Address, chain_id: u64 },
    Error(String),
}

/// A browser-extension style wallet: account access, message signing and
/// permission revocation.
#[async_trait]
pub trait WalletProvider: Send + Sync {
    fn wallet_type(&self) -> &str;

    /// Prompts the user for account access.
    async fn request_account(&self) -> Result<(Address, u64), WalletError>;

    /// Account already authorized for this origin, without prompting.
    async fn authorized_account(&self) -> Result<Option<(Address, u64)>, WalletError>;

    /// EIP-191 personal signature over `message`, as a 0x-prefixed hex string.
    async fn sign_message(&self, message: &str) -> Result<String, WalletError>;

    async fn revoke(&self) -> Result<(), WalletError>;
}

/// Provider backed by a private key held in memory.
pub struct LocalKeyProvider {
    wallet: LocalWallet,
    authorized: AtomicBool,
}

impl LocalKeyProvider {
    pub fn new(wallet: LocalWallet) -> Self {
        Self {
            wallet,
            authorized: AtomicBool::new(false),
        }
    }

    pub fn from_private_key(key: &str) -> Result<Self, WalletError> {
        let wallet: LocalWallet = key
            .trim()
            .trim_start_matches("0x")
            .parse()
            .map_err(|e| WalletError::Provider(format!("invalid private key: {}", e)))?;
        Ok(Self::new(wallet))
    }

    pub fn address(&self) -> Address {
        self.wallet.address()
    }
}

#[async_trait]
impl WalletProvider for LocalKeyProvider {
    fn wallet_type(&self) -> &str {
        "local"
    }

    async fn request_account(&self) -> Result<(Address, u64), WalletError> {
        self.authorized.store(true, Ordering::SeqCst);
        Ok((self.wallet.address(), self.wallet.chain_id()))
    }

    async fn authorized_account(&self) -> Result<Option<(Address, u64)>, WalletError> {
        if self.authorized.load(Ordering::SeqCst) {
            Ok(Some((self.wallet.address(), self.wallet.chain_id())))
        } else {
            Ok(None)
        }
    }

    async fn sign_message(&self, message: &str) -> Result<String, WalletError> {
        let signature = self
            .wallet
            .sign_message(message)
            .await
            .map_err(|e| WalletError::Provider(e.to_string()))?;
        Ok(format!("0x{}", signature))
    }

    async fn revoke(&self) -> Result<(), WalletError> {
        self.authorized.store(false, Ordering::SeqCst);
        Ok(())
    }
}

/// What survives a reload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedConnection {
    pub address: String,
    pub chain_id: u64,
    #[serde(default)]
    pub wallet_id: Option<Uuid>,
}

#[async_trait]
pub trait ConnectionCache: Send + Sync {
    async fn load(&self) -> Option<CachedConnection>;
    async fn save(&self, entry: &CachedConnection) -> Result<(), WalletError>;
    async fn clear(&self) -> Result<(), WalletError>;
}

#[derive(Default)]
pub struct MemoryCache {
    entry: tokio::sync::Mutex<Option<CachedConnection>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ConnectionCache for MemoryCache {
    async fn load(&self) -> Option<CachedConnection> {
        self.entry.lock().await.clone()
    }

    async fn save(&self, entry: &CachedConnection) -> Result<(), WalletError> {
        *self.entry.lock().await = Some(entry.clone());
        Ok(())
    }

    async fn clear(&self) -> Result<(), WalletError> {
        *self.entry.lock().await = None;
        Ok(())
    }
}

/// JSON file cache, one connection per file.
pub struct FileCache {
    path: PathBuf,
}

impl FileCache {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ConnectionCache for FileCache {
    async fn load(&self) -> Option<CachedConnection> {
        let raw = tokio::fs::read(&self.path).await.ok()?;
        match serde_json::from_slice(&raw) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("⚠️ Ignoring unreadable wallet cache {}: {}", self.path.display(), e);
                None
            }
        }
    }

    async fn save(&self, entry: &CachedConnection) -> Result<(), WalletError> {
        let raw = serde_json::to_vec_pretty(entry).map_err(|e| WalletError::Cache(e.to_string()))?;
        tokio::fs::write(&self.path, raw)
            .await
            .map_err(|e| WalletError::Cache(e.to_string()))
    }

    async fn clear(&self) -> Result<(), WalletError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(WalletError::Cache(e.to_string())),
        }
    }
}

/// Server side of wallet registration.
#[async_trait]
pub trait WalletApi: Send + Sync {
    fn is_authenticated(&self) -> bool;
    async fn register_wallet(&self, body: &WalletVerifyBody) -> Result<Wallet, ClientError>;
}

pub struct WalletConnector {
    provider: Arc<dyn WalletProvider>,
    cache: Arc<dyn ConnectionCache>,
    state: ConnectionState,
    wallet_id: Option<Uuid>,
}

impl WalletConnector {
    pub fn new(provider: Arc<dyn WalletProvider>, cache: Arc<dyn ConnectionCache>) -> Self {
        Self {
            provider,
            cache,
            state: ConnectionState::Idle,
            wallet_id: None,
        }
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn wallet_id(&self) -> Option<Uuid> {
        self.wallet_id
    }

    /// Silent reconnect from the cache. Any failure leaves the state `Idle`.
    pub async fn restore(&mut self) -> &ConnectionState {
        if self.state != ConnectionState::Idle {
            return &self.state;
        }
        let Some(cached) = self.cache.load().await else {
            return &self.state;
        };

        match self.provider.authorized_account().await {
            Ok(Some((address, chain_id)))
                if format_address(&address).eq_ignore_ascii_case(&cached.address) =>
            {
                debug!("Restored wallet connection {}", cached.address);
                self.wallet_id = cached.wallet_id;
                self.state = ConnectionState::Connected { address, chain_id };
            }
            Ok(_) => debug!("Cached wallet {} is no longer authorized", cached.address),
            Err(e) => warn!("⚠️ Silent wallet reconnect failed: {}", e),
        }
        &self.state
    }

    pub async fn connect(&mut self) -> &ConnectionState {
        if matches!(self.state, ConnectionState::Connected { .. }) {
            return &self.state;
        }
        self.state = ConnectionState::Connecting;

        match self.provider.request_account().await {
            Ok((address, chain_id)) => {
                let entry = CachedConnection {
                    address: format_address(&address),
                    chain_id,
                    wallet_id: None,
                };
                if let Err(e) = self.cache.save(&entry).await {
                    warn!("⚠️ Could not cache wallet connection: {}", e);
                }
                info!("🔗 Wallet connected: {} on chain {}", entry.address, chain_id);
                self.wallet_id = None;
                self.state = ConnectionState::Connected { address, chain_id };
            }
            Err(e) => {
                warn!("⚠️ Wallet connection failed: {}", e);
                self.state = ConnectionState::Error(e.to_string());
            }
        }
        &self.state
    }

    /// Acknowledges a connection error.
    pub fn reset_error(&mut self) {
        if matches!(self.state, ConnectionState::Error(_)) {
            self.state = ConnectionState::Idle;
        }
    }

    /// Proves ownership of the connected account with a signed challenge and
    /// records the wallet server-side. Not retried on failure.
    pub async fn verify_and_save_wallet(
        &mut self,
        api: &dyn WalletApi,
        label: Option<String>,
    ) -> Result<Wallet, WalletError> {
        let ConnectionState::Connected { address, chain_id } = self.state.clone() else {
            return Err(WalletError::NotConnected);
        };
        if !api.is_authenticated() {
            return Err(WalletError::NotAuthenticated);
        }

        let claimed = format_address(&address);
        let message = challenge_message(&claimed, Utc::now());
        let signature = self.provider.sign_message(&message).await?;
        verify_ownership(&claimed, &message, &signature)?;

        let wallet = api
            .register_wallet(&WalletVerifyBody {
                address: claimed.clone(),
                signature,
                message,
                wallet_type: Some(self.provider.wallet_type().to_string()),
                label,
            })
            .await?;

        self.wallet_id = Some(wallet.id);
        let entry = CachedConnection {
            address: claimed,
            chain_id,
            wallet_id: Some(wallet.id),
        };
        if let Err(e) = self.cache.save(&entry).await {
            warn!("⚠️ Could not cache wallet id: {}", e);
        }

        Ok(wallet)
    }

    pub async fn disconnect(&mut self) {
        if let Err(e) = self.provider.revoke().await {
            warn!("⚠️ Failed to revoke wallet permissions: {}", e);
        }
        if let Err(e) = self.cache.clear().await {
            warn!("⚠️ Failed to clear wallet cache: {}", e);
        }
        self.wallet_id = None;
        self.state = ConnectionState::Idle;
        info!("🔌 Wallet disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "4c0883a69102937d6231471b5dbb6204fe5129617082792ae468d01a3f362318";

    struct RefusingProvider;

    #[async_trait]
    impl WalletProvider for RefusingProvider {
        fn wallet_type(&self) -> &str {
            "metamask"
        }

        async fn request_account(&self) -> Result<(Address, u64), WalletError> {
            Err(WalletError::Provider("User rejected the request".to_string()))
        }

        async fn authorized_account(&self) -> Result<Option<(Address, u64)>, WalletError> {
            Err(WalletError::Provider("locked".to_string()))
        }

        async fn sign_message(&self, _message: &str) -> Result<String, WalletError> {
            Err(WalletError::Provider("locked".to_string()))
        }

        async fn revoke(&self) -> Result<(), WalletError> {
            Ok(())
        }
    }

    fn local() -> Arc<LocalKeyProvider> {
        Arc::new(LocalKeyProvider::from_private_key(KEY).unwrap())
    }

    #[tokio::test]
    async fn test_connect_caches_the_account() {
        let provider = local();
        let cache = Arc::new(MemoryCache::new());
        let mut connector = WalletConnector::new(provider.clone(), cache.clone());

        assert_eq!(connector.state(), &ConnectionState::Idle);
        connector.connect().await;
        assert!(matches!(connector.state(), ConnectionState::Connected { address, .. } if *address == provider.address()));

        let cached = cache.load().await.unwrap();
        assert_eq!(cached.address, format_address(&provider.address()));
    }

    #[tokio::test]
    async fn test_rejection_goes_to_error_then_idle() {
        let mut connector = WalletConnector::new(Arc::new(RefusingProvider), Arc::new(MemoryCache::new()));

        connector.connect().await;
        assert!(matches!(connector.state(), ConnectionState::Error(msg) if msg.contains("rejected")));

        connector.reset_error();
        assert_eq!(connector.state(), &ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_restore_reconnects_silently() {
        let provider = local();
        let cache = Arc::new(MemoryCache::new());

        let mut first = WalletConnector::new(provider.clone(), cache.clone());
        first.connect().await;

        let mut reloaded = WalletConnector::new(provider, cache);
        assert!(matches!(reloaded.restore().await, ConnectionState::Connected { .. }));
    }

    #[tokio::test]
    async fn test_failed_restore_stays_idle() {
        let cache = Arc::new(MemoryCache::new());
        cache
            .save(&CachedConnection {
                address: "0x0000000000000000000000000000000000000001".to_string(),
                chain_id: 1,
                wallet_id: None,
            })
            .await
            .unwrap();

        let mut connector = WalletConnector::new(Arc::new(RefusingProvider), cache);
        assert_eq!(connector.restore().await, &ConnectionState::Idle);
    }

    #[tokio::test]
    async fn test_disconnect_clears_everything() {
        let provider = local();
        let cache = Arc::new(MemoryCache::new());
        let mut connector = WalletConnector::new(provider.clone(), cache.clone());
        connector.connect().await;

        connector.disconnect().await;
        assert_eq!(connector.state(), &ConnectionState::Idle);
        assert!(cache.load().await.is_none());
        assert!(provider.authorized_account().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_local_signature_verifies() {
        let provider = local();
        let address = format_address(&provider.address());
        let message = challenge_message(&address, Utc::now());
        let signature = provider.sign_message(&message).await.unwrap();

        assert_eq!(verify_ownership(&address, &message, &signature).unwrap(), provider.address());
    }

    #[tokio::test]
    async fn test_file_cache_round_trip() {
        let path = std::env::temp_dir().join(format!("cryptofolio-wallet-{}.json", Uuid::new_v4()));
        let cache = FileCache::new(&path);
        let entry = CachedConnection {
            address: "0xabc".to_string(),
            chain_id: 137,
            wallet_id: Some(Uuid::new_v4()),
        };

        cache.save(&entry).await.unwrap();
        assert_eq!(cache.load().await, Some(entry));
        cache.clear().await.unwrap();
        assert!(cache.load().await.is_none());
        cache.clear().await.unwrap();
    }
}
