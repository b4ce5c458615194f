//! Wallet providers - capability interface, wallet kinds, registry.
//!
//! A provider is an externally injected wallet (browser extension, mobile
//! bridge, hardware bridge). This crate never signs anything itself; it only
//! asks the provider to enable a chain, report the account, and hand out an
//! offline signer that is passed through to the chain client.
//!
//! # Architecture
//!
//! ```text
//! ProviderRegistry (read-only after build)
//!     │
//!     ├── WalletDescriptor { kind: Keplr, provider }
//!     ├── WalletDescriptor { kind: Leap, provider }
//!     └── WalletDescriptor { kind: Cosmostation, provider }
//!                                    │
//!                                    ▼
//!                         InjectedProvider ("keplr")
//!                                    │ looks up on every call
//!                                    ▼
//!                         InjectionScope (named bindings)
//! ```

mod injected;
mod registry;

pub use injected::{InjectedProvider, InjectionScope};
pub use registry::{ProviderRegistry, RegistryBuilder, WalletDescriptor};

use crate::core::Account;
use crate::error::Result;
use async_trait::async_trait;
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tokio::sync::broadcast;

/// Closed set of supported wallet kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum WalletKind {
    Keplr,
    Leap,
    Cosmostation,
}

impl WalletKind {
    pub const ALL: [WalletKind; 3] = [WalletKind::Keplr, WalletKind::Leap, WalletKind::Cosmostation];

    pub fn as_str(&self) -> &'static str {
        match self {
            WalletKind::Keplr => "keplr",
            WalletKind::Leap => "leap",
            WalletKind::Cosmostation => "cosmostation",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "keplr" => Some(WalletKind::Keplr),
            "leap" => Some(WalletKind::Leap),
            "cosmostation" => Some(WalletKind::Cosmostation),
            _ => None,
        }
    }

    /// Name of the global binding the wallet injects itself under.
    pub fn injection_key(&self) -> &'static str { self.as_str() }
}

impl fmt::Display for WalletKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Notifications a provider may push after connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderEvent {
    /// The user switched accounts inside the wallet.
    AccountChanged,
    /// The wallet moved to another chain.
    ChainChanged(String),
}

/// Opaque signer handed out by a provider and passed through to the chain client.
#[derive(Clone)]
pub struct SignerHandle {
    inner: Arc<dyn Any + Send + Sync>,
}

impl SignerHandle {
    pub fn new<T: Any + Send + Sync>(signer: T) -> Self { Self { inner: Arc::new(signer) } }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> { self.inner.downcast_ref::<T>() }
}

impl fmt::Debug for SignerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str("SignerHandle(..)") }
}

/// Capability interface every wallet kind implements.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Presence check. Must be side-effect free and cheap to call repeatedly.
    fn detect(&self) -> bool;

    /// Ask the user to approve access to `chain_id`.
    /// Expected failures: `UserRejected`, `Timeout`, `ProviderFailure`.
    async fn enable(&self, chain_id: &str) -> Result<()>;

    async fn get_account(&self, chain_id: &str) -> Result<Account>;

    async fn get_offline_signer(&self, chain_id: &str) -> Result<SignerHandle>;

    /// Account/chain change notifications, when the wallet supports them.
    fn subscribe(&self) -> Option<broadcast::Receiver<ProviderEvent>> { None }
}
