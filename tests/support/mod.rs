//! Shared fixtures: an in-process wallet backend and a scripted chain client.
#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;
use walletlink::{
    Account, ChainClient, ChainMsg, EventAttribute, Fee, InjectionScope, MemorySessionStore, Provider, ProviderEvent,
    ProviderRegistry, Result, SessionConfig, SignerHandle, TxEvent, TxResponse, WalletContext, WalletError, WalletKind,
};

pub const CHAIN: &str = "chain-1";
pub const ALICE: &str = "cosmos1alice";

pub fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Runtime::new().expect("runtime")
}

pub fn account(address: &str) -> Account {
    Account {
        bech32_address: address.to_string(),
        public_key: vec![2, 1, 3, 3, 7],
        algo: "secp256k1".into(),
        name: "test".into(),
        is_nano_ledger: false,
    }
}

/// Poll `check` until it holds or a second passes.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnableMode {
    Approve,
    Reject,
    Hang,
}

/// Wallet backend with scripted approval, per-chain accounts and an event channel.
pub struct MockWallet {
    installed: AtomicBool,
    mode: Mutex<EnableMode>,
    delay: Duration,
    address: Mutex<String>,
    chain_addresses: Mutex<HashMap<String, String>>,
    hang_accounts: AtomicBool,
    switch_on_signer: Mutex<Option<String>>,
    events: broadcast::Sender<ProviderEvent>,
    pub enable_calls: AtomicUsize,
    pub account_calls: AtomicUsize,
    pub signer_calls: AtomicUsize,
}

impl MockWallet {
    pub fn new(address: &str) -> Arc<Self> { Self::with_delay(address, Duration::ZERO) }

    pub fn with_delay(address: &str, delay: Duration) -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            installed: AtomicBool::new(true),
            mode: Mutex::new(EnableMode::Approve),
            delay,
            address: Mutex::new(address.to_string()),
            chain_addresses: Mutex::new(HashMap::new()),
            hang_accounts: AtomicBool::new(false),
            switch_on_signer: Mutex::new(None),
            events,
            enable_calls: AtomicUsize::new(0),
            account_calls: AtomicUsize::new(0),
            signer_calls: AtomicUsize::new(0),
        })
    }

    pub fn set_mode(&self, mode: EnableMode) { *self.mode.lock().unwrap() = mode; }

    pub fn set_installed(&self, installed: bool) { self.installed.store(installed, Ordering::SeqCst); }

    pub fn set_address(&self, address: &str) { *self.address.lock().unwrap() = address.to_string(); }

    pub fn set_chain_address(&self, chain_id: &str, address: &str) {
        self.chain_addresses.lock().unwrap().insert(chain_id.to_string(), address.to_string());
    }

    /// `get_account` never returns while set.
    pub fn set_account_hang(&self, hang: bool) { self.hang_accounts.store(hang, Ordering::SeqCst); }

    /// The next `get_offline_signer` switches to `address` and reports it.
    pub fn switch_account_on_signer(&self, address: &str) {
        *self.switch_on_signer.lock().unwrap() = Some(address.to_string());
    }

    pub fn emit(&self, event: ProviderEvent) { let _ = self.events.send(event); }

    pub fn enables(&self) -> usize { self.enable_calls.load(Ordering::SeqCst) }

    /// Every call that would reach the wallet UI or keyring.
    pub fn touched(&self) -> usize {
        self.enables() + self.account_calls.load(Ordering::SeqCst) + self.signer_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Provider for MockWallet {
    fn detect(&self) -> bool { self.installed.load(Ordering::SeqCst) }

    async fn enable(&self, _chain_id: &str) -> Result<()> {
        self.enable_calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let mode = *self.mode.lock().unwrap();
        match mode {
            EnableMode::Approve => Ok(()),
            EnableMode::Reject => Err(WalletError::UserRejected),
            EnableMode::Hang => std::future::pending().await,
        }
    }

    async fn get_account(&self, chain_id: &str) -> Result<Account> {
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        if self.hang_accounts.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        let per_chain = self.chain_addresses.lock().unwrap().get(chain_id).cloned();
        let address = per_chain.unwrap_or_else(|| self.address.lock().unwrap().clone());
        Ok(account(&address))
    }

    async fn get_offline_signer(&self, chain_id: &str) -> Result<SignerHandle> {
        self.signer_calls.fetch_add(1, Ordering::SeqCst);
        let switch = self.switch_on_signer.lock().unwrap().take();
        if let Some(address) = switch {
            self.set_address(&address);
            self.emit(ProviderEvent::AccountChanged);
        }
        Ok(SignerHandle::new(format!("signer:{chain_id}")))
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<ProviderEvent>> { Some(self.events.subscribe()) }
}

/// Chain client that counts calls and replays a configured response.
pub struct MockChain {
    delay: Duration,
    code: AtomicU32,
    events: Mutex<Vec<TxEvent>>,
    fail_queries: AtomicBool,
    pub broadcasts: AtomicUsize,
    pub queries: AtomicUsize,
    pub last_fee: Mutex<Option<Fee>>,
    pub last_messages: Mutex<Vec<ChainMsg>>,
    pub last_signer: Mutex<Option<String>>,
}

impl MockChain {
    pub fn new() -> Arc<Self> { Self::with_delay(Duration::ZERO) }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            code: AtomicU32::new(0),
            events: Mutex::new(Vec::new()),
            fail_queries: AtomicBool::new(false),
            broadcasts: AtomicUsize::new(0),
            queries: AtomicUsize::new(0),
            last_fee: Mutex::new(None),
            last_messages: Mutex::new(Vec::new()),
            last_signer: Mutex::new(None),
        })
    }

    pub fn set_code(&self, code: u32) { self.code.store(code, Ordering::SeqCst); }

    pub fn set_fail_queries(&self, fail: bool) { self.fail_queries.store(fail, Ordering::SeqCst); }

    pub fn emit_contract_address(&self, address: &str) {
        self.events.lock().unwrap().push(TxEvent {
            kind: "instantiate".into(),
            attributes: vec![
                EventAttribute { key: "_contract_address".into(), value: address.into() },
                EventAttribute { key: "code_id".into(), value: "7".into() },
            ],
        });
    }

    pub fn broadcast_count(&self) -> usize { self.broadcasts.load(Ordering::SeqCst) }

    pub fn query_count(&self) -> usize { self.queries.load(Ordering::SeqCst) }

    async fn pause(&self) {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn sign_and_broadcast(
        &self,
        signer: &SignerHandle,
        signer_address: &str,
        messages: Vec<ChainMsg>,
        fee: &Fee,
        _memo: Option<&str>,
    ) -> Result<TxResponse> {
        let n = self.broadcasts.fetch_add(1, Ordering::SeqCst) + 1;
        *self.last_fee.lock().unwrap() = Some(fee.clone());
        *self.last_messages.lock().unwrap() = messages;
        *self.last_signer.lock().unwrap() = signer.downcast_ref::<String>().cloned();
        self.pause().await;
        let code = self.code.load(Ordering::SeqCst);
        Ok(TxResponse {
            tx_hash: format!("TX{n:04}"),
            code,
            raw_log: if code == 0 { String::new() } else { format!("failed to execute message; sender {signer_address}") },
            height: 1000 + n as u64,
            gas_wanted: 200_000,
            gas_used: 120_000,
            data: Some(vec![0x0a, 0x01]),
            events: self.events.lock().unwrap().clone(),
        })
    }

    async fn query_contract_smart(&self, address: &str, msg: &Value) -> Result<Value> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(WalletError::ProviderFailure("rpc unreachable".into()));
        }
        Ok(json!({ "contract": address, "echo": msg }))
    }

    async fn query_contract_raw(&self, _address: &str, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.pause().await;
        if self.fail_queries.load(Ordering::SeqCst) {
            return Err(WalletError::QueryFailure("rpc unreachable".into()));
        }
        Ok((key != b"missing").then(|| key.iter().rev().copied().collect()))
    }
}

pub struct Harness {
    pub scope: InjectionScope,
    pub store: Arc<MemorySessionStore>,
    pub chain: Arc<MockChain>,
    pub context: WalletContext,
}

pub fn config() -> SessionConfig {
    SessionConfig::new("walletlink-test")
        .with_default_chain(CHAIN)
        .with_enable_timeout(Duration::from_millis(200))
}

/// Context over injected bindings; `wallets` are injected under their kind's key.
pub fn harness(wallets: &[(WalletKind, Arc<MockWallet>)], chain: Arc<MockChain>) -> Harness {
    harness_with(config(), Arc::new(MemorySessionStore::new()), wallets, chain)
}

pub fn harness_with(
    config: SessionConfig,
    store: Arc<MemorySessionStore>,
    wallets: &[(WalletKind, Arc<MockWallet>)],
    chain: Arc<MockChain>,
) -> Harness {
    let scope = inject(wallets);
    let context = WalletContext::new(config, Arc::new(ProviderRegistry::injected(&scope)), store.clone(), chain.clone());
    Harness { scope, store, chain, context }
}

pub fn inject(wallets: &[(WalletKind, Arc<MockWallet>)]) -> InjectionScope {
    let scope = InjectionScope::new();
    for (kind, wallet) in wallets {
        scope.inject(kind.injection_key(), wallet.clone());
    }
    scope
}
