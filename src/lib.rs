//! walletlink: wallet session engine. Discover wallets, hold one connection,
//! dispatch signed transactions and cached contract queries.
//!
//! # Architecture
//!
//! ```text
//! WalletContext (entry point)
//!   │
//!   ├── SessionManager (Disconnected → Connecting → Connected | Error)
//!   │     ├── ProviderRegistry ── Provider (Keplr / Leap / Cosmostation)
//!   │     ├── AccountCache (address + pubkey, epoch, watch channel)
//!   │     ├── SessionStore (last wallet + chain, silent reconnect)
//!   │     └── EventWorker (provider account / chain notifications)
//!   │
//!   ├── TransactionDispatcher (sign + broadcast, deduplicated by MutationKey)
//!   │
//!   └── QueryDispatcher (smart / raw reads, cached by QueryKey)
//!               │
//!               └── ChainClient (signing, broadcast, RPC)
//! ```
//!
//! # Features
//!
//! - `native` - full tokio runtime, file session store, log subscriber
//!
//! # Usage
//!
//! ```ignore
//! use walletlink::{WalletContext, SessionConfig, ProviderRegistry, InjectionScope, FileSessionStore};
//!
//! let scope = InjectionScope::new();
//! let context = WalletContext::init(
//!     SessionConfig::new("mydapp").with_default_chain("juno-1"),
//!     Arc::new(ProviderRegistry::injected(&scope)),
//!     Arc::new(FileSessionStore::open("mydapp")),
//!     client,
//! )
//! .await;
//!
//! context.connect(Some(WalletKind::Keplr), None).await?;
//! let tx = context.transactions().send_tokens(SendTokensArgs::new("juno1...", coins)).await?;
//! ```

// =============================================================================
// Shared modules
// =============================================================================
pub mod account;
pub mod chain;
pub mod config;
pub mod context;
pub mod core;
pub mod dispatch;
pub mod error;
pub mod provider;
pub mod runtime;
pub mod session;
pub mod store;

// =============================================================================
// Native-only modules
// =============================================================================
#[cfg(feature = "native")]
pub mod logging;

// =============================================================================
// Re-exports
// =============================================================================
pub use account::AccountCache;
pub use chain::{ChainClient, ChainMsg, EventAttribute, ExecuteResult, InstantiateResult, TxEvent, TxResponse};
pub use config::SessionConfig;
pub use context::WalletContext;
pub use core::{Account, Coin, Fee, Height, MutationKey, MutationKind, QueryKey, QueryKind, StdFee};
pub use dispatch::{
    ExecuteContractArgs, FreshnessPolicy, InstantiateContractArgs, MaxAge, MutationCallbacks, MutationOutput,
    MutationRecord, MutationRequest, MutationStatus, QueryDispatcher, QueryOutput, QueryRecord, QueryStatus,
    ReuseUntilInvalidated, SendIbcTokensArgs, SendTokensArgs, TransactionDispatcher,
};
pub use error::{Result, WalletError};
pub use provider::{
    InjectedProvider, InjectionScope, Provider, ProviderEvent, ProviderRegistry, RegistryBuilder, SignerHandle,
    WalletDescriptor, WalletKind,
};
pub use runtime::Shutdown;
pub use session::{ConnectTarget, Session, SessionManager, SessionStatus};
pub use store::{MemorySessionStore, PersistedSession, SessionStore};

#[cfg(feature = "native")]
pub use logging::{init_logging, init_logging_with, LogFormat};
#[cfg(feature = "native")]
pub use store::FileSessionStore;
