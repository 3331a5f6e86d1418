//! Wallet management module
//!
//! Wallet extensions are external; this module only depends on the
//! [`WalletSigner`] shape and keeps track of which one is active.

use crate::types::{PendingTransaction, TransactionRequest};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WalletError {
    #[error("Wallet not connected")]
    NotConnected,

    #[error("Unknown wallet: {0}")]
    UnknownWallet(String),

    #[error("No account found after connection")]
    NoAccount,

    #[error("Request rejected by wallet: {0}")]
    Rejected(String),

    #[error("Wallet extension error: {0}")]
    Extension(String),
}

/// Account exposed by a connected wallet
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletAccount {
    pub address: String,
}

/// Signing capability provided by a wallet extension
#[async_trait]
pub trait WalletSigner: Send + Sync {
    fn name(&self) -> &str;

    fn is_connected(&self) -> bool;

    /// Ask the extension for authorization. May return `NoAccount` even when
    /// the extension itself answered.
    async fn connect(&self) -> Result<WalletAccount, WalletError>;

    async fn disconnect(&self) -> Result<(), WalletError>;

    /// Sign and submit in one opaque step. Not idempotent.
    async fn sign_and_submit(&self, request: &TransactionRequest) -> Result<PendingTransaction, WalletError>;
}

struct ActiveWallet {
    signer: Arc<dyn WalletSigner>,
    address: String,
}

/// Registry of installed wallets plus the currently connected one.
///
/// Constructed once and passed to whatever needs it.
pub struct WalletManager {
    wallets: BTreeMap<String, Arc<dyn WalletSigner>>,
    active: RwLock<Option<ActiveWallet>>,
}

impl WalletManager {
    pub fn new() -> Self {
        Self {
            wallets: BTreeMap::new(),
            active: RwLock::new(None),
        }
    }

    /// Register a wallet under its own name
    pub fn with_wallet(mut self, signer: Arc<dyn WalletSigner>) -> Self {
        self.wallets.insert(signer.name().to_string(), signer);
        self
    }

    pub fn available_wallets(&self) -> Vec<&str> {
        self.wallets.keys().map(String::as_str).collect()
    }

    /// Connect the named wallet and make it active.
    ///
    /// Any previous active wallet is forgotten, and a failed attempt leaves
    /// the manager disconnected.
    pub async fn connect(&self, name: &str) -> Result<WalletAccount, WalletError> {
        *self.active.write() = None;

        let signer = self
            .wallets
            .get(name)
            .cloned()
            .ok_or_else(|| WalletError::UnknownWallet(name.to_string()))?;

        let account = match signer.connect().await {
            Ok(account) if !account.address.is_empty() => account,
            Ok(_) => {
                warn!(wallet = %name, "Wallet connected without an account");
                return Err(WalletError::NoAccount);
            }
            Err(e) => {
                warn!(wallet = %name, error = %e, "Failed to connect wallet");
                return Err(e);
            }
        };

        info!(wallet = %name, address = %account.address, "Wallet connected");
        *self.active.write() = Some(ActiveWallet {
            signer,
            address: account.address.clone(),
        });
        Ok(account)
    }

    /// Disconnect the active wallet, if any
    pub async fn disconnect(&self) -> Result<(), WalletError> {
        let signer = match self.active.read().as_ref() {
            Some(active) if active.signer.is_connected() => Arc::clone(&active.signer),
            _ => return Ok(()),
        };
        signer.disconnect().await?;
        *self.active.write() = None;
        info!(wallet = %signer.name(), "Wallet disconnected");
        Ok(())
    }

    pub fn is_connected(&self) -> bool {
        self.active
            .read()
            .as_ref()
            .map(|a| a.signer.is_connected())
            .unwrap_or(false)
    }

    pub fn address(&self) -> Option<String> {
        self.active.read().as_ref().map(|a| a.address.clone())
    }

    pub fn active_signer(&self) -> Option<Arc<dyn WalletSigner>> {
        self.active.read().as_ref().map(|a| Arc::clone(&a.signer))
    }
}

impl Default for WalletManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    struct StubWallet {
        name: &'static str,
        address: &'static str,
        refuse: bool,
        connected: AtomicBool,
    }

    impl StubWallet {
        fn new(name: &'static str, address: &'static str) -> Self {
            Self {
                name,
                address,
                refuse: false,
                connected: AtomicBool::new(false),
            }
        }
    }

    #[async_trait]
    impl WalletSigner for StubWallet {
        fn name(&self) -> &str {
            self.name
        }

        fn is_connected(&self) -> bool {
            self.connected.load(Ordering::SeqCst)
        }

        async fn connect(&self) -> Result<WalletAccount, WalletError> {
            if self.refuse {
                return Err(WalletError::Rejected("user closed the popup".into()));
            }
            self.connected.store(true, Ordering::SeqCst);
            Ok(WalletAccount {
                address: self.address.to_string(),
            })
        }

        async fn disconnect(&self) -> Result<(), WalletError> {
            self.connected.store(false, Ordering::SeqCst);
            Ok(())
        }

        async fn sign_and_submit(&self, _request: &TransactionRequest) -> Result<PendingTransaction, WalletError> {
            Err(WalletError::NotConnected)
        }
    }

    #[tokio::test]
    async fn test_connect_and_disconnect() {
        let manager = WalletManager::new()
            .with_wallet(Arc::new(StubWallet::new("martian", "0xaa")))
            .with_wallet(Arc::new(StubWallet::new("petra", "0xbb")));

        assert_eq!(manager.available_wallets(), vec!["martian", "petra"]);
        assert!(!manager.is_connected());

        let account = manager.connect("petra").await.unwrap();
        assert_eq!(account.address, "0xbb");
        assert!(manager.is_connected());
        assert_eq!(manager.address().as_deref(), Some("0xbb"));
        assert_eq!(manager.active_signer().unwrap().name(), "petra");

        manager.disconnect().await.unwrap();
        assert!(!manager.is_connected());
        assert!(manager.address().is_none());
    }

    #[tokio::test]
    async fn test_unknown_wallet_leaves_manager_disconnected() {
        let manager = WalletManager::new().with_wallet(Arc::new(StubWallet::new("martian", "0xaa")));
        manager.connect("martian").await.unwrap();

        let err = manager.connect("phantom").await.unwrap_err();
        assert_eq!(err, WalletError::UnknownWallet("phantom".into()));
        assert!(!manager.is_connected());
        assert!(manager.active_signer().is_none());
    }

    #[tokio::test]
    async fn test_empty_account_is_rejected() {
        let manager = WalletManager::new().with_wallet(Arc::new(StubWallet::new("martian", "")));
        assert_eq!(manager.connect("martian").await.unwrap_err(), WalletError::NoAccount);
        assert!(!manager.is_connected());
    }

    #[tokio::test]
    async fn test_refused_connection_propagates() {
        let mut wallet = StubWallet::new("martian", "0xaa");
        wallet.refuse = true;
        let manager = WalletManager::new().with_wallet(Arc::new(wallet));
        assert!(matches!(
            manager.connect("martian").await,
            Err(WalletError::Rejected(_))
        ));
    }

    #[tokio::test]
    async fn test_disconnect_without_wallet_is_noop() {
        let manager = WalletManager::new();
        manager.disconnect().await.unwrap();
    }
}
