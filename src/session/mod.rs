//! Session manager - the connection state machine.
//!
//! ```text
//!                connect()                 enable ok + account
//! Disconnected ───────────▶ Connecting ─────────────────────▶ Connected
//!      ▲                      │    ▲                              │
//!      │                      │    │ connect()                    │ disconnect() /
//!      │       rejected /     ▼    │                              │ unresolvable
//!      │       timeout /    Error ─┘                              │ provider event
//!      └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Connect attempts run as spawned tasks and are shared: a second `connect`
//! for the same wallet and chain joins the running attempt, a `connect` for a
//! different target or a `disconnect` waits for it to settle first. Only this
//! module writes the session and the account cache.

mod events;
mod state;

pub use state::{ConnectTarget, Session, SessionStatus};

use crate::account::AccountCache;
use crate::config::SessionConfig;
use crate::core::Account;
use crate::error::{Result, WalletError};
use crate::provider::{Provider, ProviderEvent, ProviderRegistry, SignerHandle, WalletKind};
use crate::runtime::Shutdown;
use crate::store::{PersistedSession, SessionStore};
use events::EventWorker;
use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

type SharedConnect = Shared<BoxFuture<'static, Result<Session>>>;

/// Handle to the session. Cheap to clone; clones share one state machine.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    registry: Arc<ProviderRegistry>,
    store: Arc<dyn SessionStore>,
    config: SessionConfig,
    persisted: Option<PersistedSession>,
    account: Arc<AccountCache>,
    state: RwLock<SessionState>,
    in_flight: Mutex<Option<InFlightConnect>>,
    disconnect_gate: tokio::sync::Mutex<()>,
    attempts: AtomicU64,
    shutdown: Shutdown,
}

#[derive(Default)]
struct SessionState {
    session: Session,
    handle: Option<ActiveHandle>,
    last_target: Option<ConnectTarget>,
    /// Bumped on every transition that replaces or drops the connection.
    generation: u64,
}

#[derive(Clone)]
struct ActiveHandle {
    provider: Arc<dyn Provider>,
    signer: SignerHandle,
}

struct InFlightConnect {
    id: u64,
    target: ConnectTarget,
    result: SharedConnect,
}

enum ConnectStep {
    Done(Session),
    Join(SharedConnect),
    WaitFor(SharedConnect),
}

enum DisconnectStep {
    Done,
    WaitFor(SharedConnect),
}

impl SessionManager {
    /// Build a session. The persisted record is read once, here.
    pub fn new(registry: Arc<ProviderRegistry>, store: Arc<dyn SessionStore>, config: SessionConfig) -> Self {
        let persisted = store.load();
        if let Some(ref record) = persisted {
            debug!(wallet = %record.last_wallet_kind, chain = %record.last_chain_id, "loaded persisted session");
        }
        Self {
            inner: Arc::new(SessionInner {
                registry,
                store,
                config,
                persisted,
                account: Arc::new(AccountCache::new()),
                state: RwLock::new(SessionState::default()),
                in_flight: Mutex::new(None),
                disconnect_gate: tokio::sync::Mutex::new(()),
                attempts: AtomicU64::new(0),
                shutdown: Shutdown::new(),
            }),
        }
    }

    // Reads

    pub fn session(&self) -> Session { self.inner.read_state(|s| s.session.clone()).unwrap_or_default() }

    pub fn status(&self) -> SessionStatus { self.inner.read_state(|s| s.session.status).unwrap_or_default() }

    pub fn is_connected(&self) -> bool { self.status() == SessionStatus::Connected }

    pub fn chain_id(&self) -> Option<String> { self.inner.read_state(|s| s.session.chain_id.clone()).flatten() }

    pub fn generation(&self) -> u64 { self.inner.read_state(|s| s.generation).unwrap_or(0) }

    /// Account generation; changes on every account-affecting transition.
    pub fn epoch(&self) -> u64 { self.inner.account.epoch() }

    pub fn account_cache(&self) -> Arc<AccountCache> { self.inner.account.clone() }

    pub fn get_account(&self) -> Result<Account> { self.inner.account.get_account() }

    /// Offline signer of the active session, passed through to the chain client.
    pub fn signer(&self) -> Result<SignerHandle> {
        self.inner
            .read_state(|s| match (&s.session.status, &s.handle) {
                (SessionStatus::Connected, Some(handle)) => Some(handle.signer.clone()),
                _ => None,
            })
            .flatten()
            .ok_or(WalletError::NotConnected)
    }

    pub fn registry(&self) -> &ProviderRegistry { &self.inner.registry }

    pub fn config(&self) -> &SessionConfig { &self.inner.config }

    pub fn check_wallet(&self, kind: WalletKind) -> bool { self.inner.registry.detect(kind) }

    pub fn available_wallets(&self) -> BTreeMap<WalletKind, bool> { self.inner.registry.available_wallets() }

    // Transitions

    /// Connect to `kind` on `chain_id`, defaulting each to the last used or
    /// persisted value. Concurrent calls for the same target share one handshake.
    pub async fn connect(&self, kind: Option<WalletKind>, chain_id: Option<&str>) -> Result<Session> {
        let target = self.inner.resolve_target(kind, chain_id)?;
        loop {
            let step = match self.inner.begin_connect(&target) {
                Ok(step) => step,
                Err(error) => {
                    if let (WalletError::ProviderNotFound(_), Some(hook)) = (&error, &self.inner.config.on_not_found) {
                        hook(target.kind);
                    }
                    return Err(error);
                }
            };
            match step {
                ConnectStep::Done(session) => return Ok(session),
                ConnectStep::Join(attempt) => return attempt.await,
                ConnectStep::WaitFor(other) => {
                    debug!(%target, "waiting for in-flight connect to settle");
                    let _ = other.await;
                }
            }
        }
    }

    /// Idempotent. Waits for an in-flight connect to settle, then disconnects.
    pub async fn disconnect(&self) -> Result<()> {
        self.leave(true).await
    }

    /// Context teardown: stop event workers and drop the connection, keeping
    /// the persisted record so the next `reconnect` can restore it.
    pub(crate) async fn close(&self) -> Result<()> {
        self.inner.shutdown.trigger();
        self.leave(false).await
    }

    async fn leave(&self, forget: bool) -> Result<()> {
        let _gate = self.inner.disconnect_gate.lock().await;
        loop {
            match self.inner.begin_disconnect(forget) {
                DisconnectStep::Done => return Ok(()),
                DisconnectStep::WaitFor(attempt) => {
                    debug!("disconnect waiting for in-flight connect");
                    let _ = attempt.await;
                }
            }
        }
    }

    /// Silent reconnection from the persisted record. Returns `None` when there
    /// is nothing to reconnect to or the wallet is not installed any more.
    pub async fn reconnect(&self) -> Result<Option<Session>> {
        if !self.inner.config.auto_reconnect {
            return Ok(None);
        }
        let Some(record) = self.inner.persisted.clone().filter(|r| r.auto_reconnect) else {
            return Ok(None);
        };
        let Some(kind) = record.wallet_kind() else {
            warn!(wallet = %record.last_wallet_kind, "persisted wallet kind is not supported");
            return Ok(None);
        };
        if !self.inner.registry.detect(kind) {
            debug!(%kind, "persisted wallet not detected, staying disconnected");
            return Ok(None);
        }
        info!(%kind, chain = %record.last_chain_id, "reconnecting persisted session");
        self.connect(Some(kind), Some(&record.last_chain_id)).await.map(Some)
    }
}

impl SessionInner {
    fn read_state<T>(&self, f: impl FnOnce(&SessionState) -> T) -> Option<T> {
        self.state.read().ok().map(|guard| f(&guard))
    }

    fn resolve_target(&self, kind: Option<WalletKind>, chain_id: Option<&str>) -> Result<ConnectTarget> {
        let last = self.read_state(|s| s.last_target.clone()).flatten();
        let persisted = self.persisted.as_ref();

        let kind = kind
            .or_else(|| last.as_ref().map(|t| t.kind))
            .or_else(|| persisted.and_then(PersistedSession::wallet_kind))
            .or(self.config.default_wallet)
            .ok_or_else(|| WalletError::ProviderNotFound("no wallet kind given and none persisted".into()))?;

        let chain_id = chain_id
            .map(str::to_string)
            .or_else(|| last.map(|t| t.chain_id))
            .or_else(|| persisted.map(|r| r.last_chain_id.clone()))
            .or_else(|| self.config.default_chain_id.clone())
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| WalletError::invalid("chain id is required"))?;

        Ok(ConnectTarget { kind, chain_id })
    }

    fn begin_connect(self: &Arc<Self>, target: &ConnectTarget) -> Result<ConnectStep> {
        let mut slot = self.in_flight.lock().map_err(|_| WalletError::ProviderFailure("session lock".into()))?;
        if let Some(running) = slot.as_ref() {
            if running.target == *target {
                debug!(%target, "joining in-flight connect");
                return Ok(ConnectStep::Join(running.result.clone()));
            }
            return Ok(ConnectStep::WaitFor(running.result.clone()));
        }

        let already = self
            .read_state(|s| {
                (s.session.status == SessionStatus::Connected && s.last_target.as_ref() == Some(target))
                    .then(|| s.session.clone())
            })
            .flatten();
        if let Some(session) = already {
            return Ok(ConnectStep::Done(session));
        }

        // Resolution failure leaves the session untouched.
        let provider = self.registry.get_handle(target.kind)?;

        let id = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        self.enter_connecting();
        info!(%target, attempt = id, "connecting");

        let inner = self.clone();
        let attempt_target = target.clone();
        let task = tokio::spawn(async move { inner.handshake(id, attempt_target, provider).await });
        let result: SharedConnect = async move {
            task.await
                .unwrap_or_else(|e| Err(WalletError::ProviderFailure(format!("connect task: {e}"))))
        }
        .boxed()
        .shared();

        *slot = Some(InFlightConnect { id, target: target.clone(), result: result.clone() });
        Ok(ConnectStep::Join(result))
    }

    fn enter_connecting(&self) {
        if let Ok(mut state) = self.state.write() {
            state.session = Session::connecting();
            state.handle = None;
            state.generation += 1;
            self.account.invalidate();
        }
    }

    async fn handshake(self: Arc<Self>, id: u64, target: ConnectTarget, provider: Arc<dyn Provider>) -> Result<Session> {
        // Subscribed before enable so changes reported mid-handshake are replayed.
        let events = provider.subscribe();
        let outcome = self.enable_and_resolve(&target, provider.as_ref()).await;

        let (result, generation) = {
            let mut slot = self.in_flight.lock().map_err(|_| WalletError::ProviderFailure("session lock".into()))?;
            let result = match outcome {
                Ok((account, signer)) => {
                    let session = self.enter_connected(&target, provider.clone(), account, signer);
                    // Persisted under the slot lock; a racing disconnect lands after it.
                    self.persist(PersistedSession::new(target.kind, target.chain_id.clone()));
                    Ok(session)
                }
                Err(error) => {
                    self.enter_error(error.clone());
                    Err(error)
                }
            };
            if slot.as_ref().map(|f| f.id) == Some(id) {
                *slot = None;
            }
            (result, self.read_state(|s| s.generation).unwrap_or(0))
        };

        match &result {
            Ok(_) => {
                info!(%target, "connected");
                if let Some(events) = events {
                    EventWorker::new(Arc::downgrade(&self), generation, self.shutdown.clone()).spawn(events);
                }
            }
            Err(error) => warn!(%target, %error, "connect failed"),
        }
        result
    }

    /// Enable, account and signer together are bounded by `enable_timeout`.
    async fn enable_and_resolve(&self, target: &ConnectTarget, provider: &dyn Provider) -> Result<(Account, SignerHandle)> {
        let steps = async {
            provider.enable(&target.chain_id).await?;
            let account = resolve_account(provider, &target.chain_id).await?;
            let signer = provider.get_offline_signer(&target.chain_id).await?;
            Ok::<_, WalletError>((account, signer))
        };
        tokio::time::timeout(self.config.enable_timeout, steps).await.map_err(|_| WalletError::Timeout)?
    }

    fn enter_connected(&self, target: &ConnectTarget, provider: Arc<dyn Provider>, account: Account, signer: SignerHandle) -> Session {
        let Ok(mut state) = self.state.write() else { return Session::connected(target.kind, &target.chain_id) };
        state.session = Session::connected(target.kind, &target.chain_id);
        state.handle = Some(ActiveHandle { provider, signer });
        state.last_target = Some(target.clone());
        state.generation += 1;
        self.account.resync(account);
        state.session.clone()
    }

    fn enter_error(&self, error: WalletError) {
        if let Ok(mut state) = self.state.write() {
            state.session = Session::failed(error);
            state.handle = None;
            state.generation += 1;
            self.account.invalidate();
        }
    }

    /// Returns true if the session actually left Connected or Error.
    fn enter_disconnected(&self) -> bool {
        let Ok(mut state) = self.state.write() else { return false };
        if state.session.status == SessionStatus::Disconnected {
            return false;
        }
        state.session = Session::default();
        state.handle = None;
        state.generation += 1;
        self.account.invalidate();
        true
    }

    fn begin_disconnect(&self, forget: bool) -> DisconnectStep {
        let Ok(slot) = self.in_flight.lock() else { return DisconnectStep::Done };
        if let Some(running) = slot.as_ref() {
            return DisconnectStep::WaitFor(running.result.clone());
        }
        if self.enter_disconnected() {
            info!("disconnected");
            if forget {
                self.forget_persisted();
            }
        }
        DisconnectStep::Done
    }

    fn persist(&self, record: PersistedSession) {
        if let Err(error) = self.store.save(&record) {
            warn!(%error, "could not persist session");
        }
    }

    fn forget_persisted(&self) {
        if let Some(mut record) = self.store.load() {
            record.auto_reconnect = false;
            self.persist(record);
        }
    }

    // Provider notifications

    async fn on_provider_event(&self, generation: u64, event: ProviderEvent) {
        let current = self
            .read_state(|s| {
                let live = s.generation == generation && s.session.status == SessionStatus::Connected;
                live.then(|| (s.handle.clone(), s.last_target.clone()))
            })
            .flatten();
        let Some((Some(handle), Some(target))) = current else { return };

        let chain_id = match &event {
            ProviderEvent::AccountChanged => target.chain_id.clone(),
            ProviderEvent::ChainChanged(chain) => chain.clone(),
        };
        debug!(?event, chain = %chain_id, "provider event, resynchronizing");

        let resolved = match resolve_account(handle.provider.as_ref(), &chain_id).await {
            Ok(account) if chain_id == target.chain_id => Ok((account, handle.signer.clone())),
            Ok(account) => handle.provider.get_offline_signer(&chain_id).await.map(|signer| (account, signer)),
            Err(error) => Err(error),
        };

        match resolved {
            Ok((account, signer)) => {
                let switched = chain_id != target.chain_id;
                {
                    let Ok(mut state) = self.state.write() else { return };
                    if state.generation != generation || state.session.status != SessionStatus::Connected {
                        return;
                    }
                    if switched {
                        state.session.chain_id = Some(chain_id.clone());
                        state.last_target = Some(ConnectTarget { kind: target.kind, chain_id: chain_id.clone() });
                        if let Some(active) = state.handle.as_mut() {
                            active.signer = signer;
                        }
                    }
                    self.account.resync(account);
                }
                if switched {
                    info!(from = %target.chain_id, to = %chain_id, "provider switched chain");
                    self.persist(PersistedSession::new(target.kind, chain_id));
                }
            }
            Err(error) => {
                let left = {
                    let Ok(slot) = self.in_flight.lock() else { return };
                    let still_current = slot.is_none() && self.read_state(|s| s.generation == generation).unwrap_or(false);
                    still_current && self.enter_disconnected()
                };
                if left {
                    warn!(%error, "account change could not be resolved, disconnected");
                }
            }
        }
    }
}

async fn resolve_account(provider: &dyn Provider, chain_id: &str) -> Result<Account> {
    let account = provider.get_account(chain_id).await?;
    if account.bech32_address.trim().is_empty() {
        return Err(WalletError::ProviderFailure("provider returned an empty account".into()));
    }
    Ok(account)
}
