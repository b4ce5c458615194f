//! QueryDispatcher - cached, deduplicated contract reads.
//!
//! Reads need no account and no connection. Each read has a `QueryKey`; a
//! fresh record is served from cache, a Loading record is joined, anything
//! else issues one read. Missing arguments disable the query entirely.

use crate::chain::ChainClient;
use crate::core::QueryKey;
use crate::error::{Result, WalletError};
use crate::session::SessionManager;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;

type SharedQuery = Shared<BoxFuture<'static, Result<QueryOutput>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryOutput {
    Smart(Value),
    Raw(Option<Vec<u8>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct QueryRecord {
    pub key: QueryKey,
    pub status: QueryStatus,
    pub result: Option<Result<QueryOutput>>,
    pub fetched_at: Option<DateTime<Utc>>,
}

/// Decides whether a settled record may be served without a new read.
pub trait FreshnessPolicy: Send + Sync {
    fn is_fresh(&self, record: &QueryRecord, now: DateTime<Utc>) -> bool;
}

/// Reuse a successful result until its key is invalidated or changes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReuseUntilInvalidated;

impl FreshnessPolicy for ReuseUntilInvalidated {
    fn is_fresh(&self, record: &QueryRecord, _: DateTime<Utc>) -> bool { record.status == QueryStatus::Success }
}

/// Reuse a successful result for at most the given age.
#[derive(Debug, Clone, Copy)]
pub struct MaxAge(pub Duration);

impl FreshnessPolicy for MaxAge {
    fn is_fresh(&self, record: &QueryRecord, now: DateTime<Utc>) -> bool {
        let Some(fetched_at) = record.fetched_at else { return false };
        let age = now.signed_duration_since(fetched_at).to_std().unwrap_or_default();
        record.status == QueryStatus::Success && age <= self.0
    }
}

enum QueryCall {
    Smart { address: String, msg: Value },
    Raw { address: String, key: Vec<u8> },
}

struct QueryEntry {
    record: QueryRecord,
    attempt: u64,
    in_flight: Option<SharedQuery>,
}

#[derive(Default)]
struct QueryTable {
    entries: Mutex<HashMap<QueryKey, QueryEntry>>,
    attempts: AtomicU64,
}

#[derive(Clone)]
pub struct QueryDispatcher {
    session: SessionManager,
    client: Arc<dyn ChainClient>,
    policy: Arc<dyn FreshnessPolicy>,
    table: Arc<QueryTable>,
}

impl QueryDispatcher {
    pub fn new(session: SessionManager, client: Arc<dyn ChainClient>) -> Self {
        Self { session, client, policy: Arc::new(ReuseUntilInvalidated), table: Arc::new(QueryTable::default()) }
    }

    pub fn with_policy(mut self, policy: impl FreshnessPolicy + 'static) -> Self {
        self.policy = Arc::new(policy);
        self
    }

    pub async fn query_smart(&self, address: &str, msg: &Value) -> Result<Value> {
        let key = self.smart_key(address, msg)?;
        let call = QueryCall::Smart { address: address.to_string(), msg: msg.clone() };
        match self.fetch(key, call).await? {
            QueryOutput::Smart(value) => Ok(value),
            QueryOutput::Raw(_) => Err(WalletError::QueryFailure("raw result for a smart query".into())),
        }
    }

    pub async fn query_smart_as<T: DeserializeOwned>(&self, address: &str, msg: &Value) -> Result<T> {
        let value = self.query_smart(address, msg).await?;
        serde_json::from_value(value).map_err(|e| WalletError::QueryFailure(format!("decode: {e}")))
    }

    pub async fn query_raw(&self, address: &str, key: impl AsRef<[u8]>) -> Result<Option<Vec<u8>>> {
        let storage_key = key.as_ref();
        let key = self.raw_key(address, storage_key)?;
        let call = QueryCall::Raw { address: address.to_string(), key: storage_key.to_vec() };
        match self.fetch(key, call).await? {
            QueryOutput::Raw(bytes) => Ok(bytes),
            QueryOutput::Smart(_) => Err(WalletError::QueryFailure("smart result for a raw query".into())),
        }
    }

    pub fn smart_key(&self, address: &str, msg: &Value) -> Result<QueryKey> {
        require_address(address)?;
        if msg.is_null() {
            return Err(WalletError::invalid("query msg is required"));
        }
        Ok(QueryKey::smart(self.endpoint().as_deref(), address, msg))
    }

    pub fn raw_key(&self, address: &str, key: &[u8]) -> Result<QueryKey> {
        require_address(address)?;
        if key.is_empty() {
            return Err(WalletError::invalid("storage key is required"));
        }
        Ok(QueryKey::raw(self.endpoint().as_deref(), address, key))
    }

    pub fn record(&self, key: &QueryKey) -> Option<QueryRecord> {
        self.table.entries.lock().ok()?.get(key).map(|e| e.record.clone())
    }

    /// Forget one key; a read already in flight for it will not be recorded.
    pub fn invalidate(&self, key: &QueryKey) -> bool {
        self.table.entries.lock().map(|mut e| e.remove(key).is_some()).unwrap_or(false)
    }

    pub fn clear(&self) {
        if let Ok(mut entries) = self.table.entries.lock() {
            entries.clear();
        }
    }

    /// Chain the read is keyed under: the session's, else the configured default.
    fn endpoint(&self) -> Option<String> {
        self.session.chain_id().or_else(|| self.session.config().default_chain_id.clone())
    }

    async fn fetch(&self, key: QueryKey, call: QueryCall) -> Result<QueryOutput> {
        let read = {
            let mut entries = self.table.entries.lock().map_err(|_| WalletError::QueryFailure("query table lock".into()))?;
            let cached = entries
                .get(&key)
                .filter(|entry| self.policy.is_fresh(&entry.record, Utc::now()))
                .and_then(|entry| entry.record.result.clone())
                .and_then(|result| result.ok());
            if let Some(output) = cached {
                debug!(%key, "query cache hit");
                return Ok(output);
            }
            let running = entries
                .get(&key)
                .filter(|entry| entry.record.status == QueryStatus::Loading)
                .and_then(|entry| entry.in_flight.clone());
            match running {
                Some(running) => {
                    debug!(%key, "joining in-flight query");
                    running
                }
                None => self.start(&mut entries, key, call),
            }
        };
        read.await
    }

    fn start(&self, entries: &mut HashMap<QueryKey, QueryEntry>, key: QueryKey, call: QueryCall) -> SharedQuery {
        let attempt = self.table.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let client = self.client.clone();
        let table = self.table.clone();
        let settle_key = key.clone();

        let read: SharedQuery = async move {
            debug!(key = %settle_key, "issuing contract query");
            let result = match call {
                QueryCall::Smart { address, msg } => client.query_contract_smart(&address, &msg).await.map(QueryOutput::Smart),
                QueryCall::Raw { address, key } => client.query_contract_raw(&address, &key).await.map(QueryOutput::Raw),
            };
            let result = result.map_err(|error| match error {
                WalletError::QueryFailure(_) | WalletError::InvalidArgument(_) => error,
                other => WalletError::QueryFailure(other.to_string()),
            });
            settle(&table, &settle_key, attempt, &result);
            result
        }
        .boxed()
        .shared();

        // Keep the last good result visible while the refetch runs.
        let (result, fetched_at) = entries
            .get(&key)
            .filter(|e| matches!(e.record.result, Some(Ok(_))))
            .map(|e| (e.record.result.clone(), e.record.fetched_at))
            .unwrap_or_default();
        entries.insert(
            key.clone(),
            QueryEntry {
                record: QueryRecord { key, status: QueryStatus::Loading, result, fetched_at },
                attempt,
                in_flight: Some(read.clone()),
            },
        );
        read
    }
}

fn settle(table: &QueryTable, key: &QueryKey, attempt: u64, result: &Result<QueryOutput>) {
    let Ok(mut entries) = table.entries.lock() else { return };
    let Some(entry) = entries.get_mut(key).filter(|e| e.attempt == attempt) else {
        debug!(%key, "query settled after invalidation");
        return;
    };
    entry.record.status = if result.is_ok() { QueryStatus::Success } else { QueryStatus::Error };
    entry.record.result = Some(result.clone());
    entry.record.fetched_at = Some(Utc::now());
    entry.in_flight = None;
}

fn require_address(address: &str) -> Result<()> {
    if address.trim().is_empty() {
        return Err(WalletError::invalid("contract address is required"));
    }
    Ok(())
}
