//! WalletContext - one explicitly constructed wallet session with its dispatchers.
//!
//! Replaces a process-wide store: an application builds a context at startup,
//! hands clones of its parts to whatever needs them, and disposes it on exit.

use crate::account::AccountCache;
use crate::chain::ChainClient;
use crate::config::SessionConfig;
use crate::dispatch::{QueryDispatcher, TransactionDispatcher};
use crate::error::Result;
use crate::provider::{ProviderRegistry, WalletKind};
use crate::session::{Session, SessionManager};
use crate::store::SessionStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct WalletContext {
    session: SessionManager,
    transactions: TransactionDispatcher,
    queries: QueryDispatcher,
}

impl WalletContext {
    /// Build the context without touching any provider.
    pub fn new(
        config: SessionConfig,
        registry: Arc<ProviderRegistry>,
        store: Arc<dyn SessionStore>,
        client: Arc<dyn ChainClient>,
    ) -> Self {
        let session = SessionManager::new(registry, store, config);
        let transactions = TransactionDispatcher::new(session.clone(), client.clone());
        let queries = QueryDispatcher::new(session.clone(), client);
        Self { session, transactions, queries }
    }

    /// Build the context and silently restore the persisted session. A failed
    /// reconnect is logged and leaves the session in Error; it never fails init.
    pub async fn init(
        config: SessionConfig,
        registry: Arc<ProviderRegistry>,
        store: Arc<dyn SessionStore>,
        client: Arc<dyn ChainClient>,
    ) -> Self {
        let context = Self::new(config, registry, store, client);
        match context.session.reconnect().await {
            Ok(Some(session)) => info!(status = %session.status, "restored wallet session"),
            Ok(None) => {}
            Err(error) => warn!(%error, "silent reconnect failed"),
        }
        context
    }

    pub fn session(&self) -> &SessionManager { &self.session }

    pub fn accounts(&self) -> Arc<AccountCache> { self.session.account_cache() }

    pub fn transactions(&self) -> &TransactionDispatcher { &self.transactions }

    pub fn queries(&self) -> &QueryDispatcher { &self.queries }

    pub fn check_wallet(&self, kind: WalletKind) -> bool { self.session.check_wallet(kind) }

    pub fn available_wallets(&self) -> BTreeMap<WalletKind, bool> { self.session.available_wallets() }

    pub async fn connect(&self, kind: Option<WalletKind>, chain_id: Option<&str>) -> Result<Session> {
        self.session.connect(kind, chain_id).await
    }

    pub async fn disconnect(&self) -> Result<()> { self.session.disconnect().await }

    /// Stop event workers and drop the live connection. In-flight broadcasts
    /// still settle; the persisted record is kept for the next `init`.
    pub async fn dispose(&self) -> Result<()> {
        self.session.close().await?;
        self.queries.clear();
        info!("wallet context disposed");
        Ok(())
    }
}
