//! TransactionDispatcher - sign-and-broadcast with an idempotent-submission guard.
//!
//! Every request resolves its sender (explicit or the cached account),
//! derives a `MutationKey`, and either joins a Loading record with that key
//! or starts a new attempt. Attempts run as spawned tasks: a disconnect or a
//! caller that stops waiting never aborts a broadcast that may already be on
//! chain. An attempt that settles after the account changed is detached: its
//! callers still get the result, but the record is not kept for joining.

use super::callbacks::MutationCallbacks;
use crate::account::AccountCache;
use crate::chain::{ChainClient, ChainMsg, ExecuteResult, InstantiateResult, TxResponse};
use crate::core::{Coin, Fee, Height, MutationKey, MutationKind};
use crate::error::{Result, WalletError};
use crate::provider::SignerHandle;
use crate::session::SessionManager;
use chrono::{DateTime, Utc};
use futures::future::{BoxFuture, FutureExt, Shared};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

type SharedMutation = Shared<BoxFuture<'static, Result<MutationOutput>>>;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SendTokensArgs {
    pub sender_address: Option<String>,
    pub recipient_address: String,
    pub amount: Vec<Coin>,
    pub fee: Option<Fee>,
    pub memo: Option<String>,
}

impl SendTokensArgs {
    pub fn new(recipient_address: impl Into<String>, amount: Vec<Coin>) -> Self {
        Self { recipient_address: recipient_address.into(), amount, ..Default::default() }
    }
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self { self.sender_address = Some(sender.into()); self }
    pub fn with_fee(mut self, fee: Fee) -> Self { self.fee = Some(fee); self }
    pub fn with_memo(mut self, memo: impl Into<String>) -> Self { self.memo = Some(memo.into()); self }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SendIbcTokensArgs {
    pub sender_address: Option<String>,
    pub recipient_address: String,
    pub transfer_amount: Coin,
    pub source_port: String,
    pub source_channel: String,
    pub timeout_height: Option<Height>,
    /// Nanoseconds since the epoch.
    pub timeout_timestamp: Option<u64>,
    pub fee: Option<Fee>,
    pub memo: Option<String>,
}

impl SendIbcTokensArgs {
    pub fn new(recipient_address: impl Into<String>, transfer_amount: Coin, source_channel: impl Into<String>) -> Self {
        Self {
            sender_address: None,
            recipient_address: recipient_address.into(),
            transfer_amount,
            source_port: "transfer".into(),
            source_channel: source_channel.into(),
            timeout_height: None,
            timeout_timestamp: None,
            fee: None,
            memo: None,
        }
    }
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self { self.sender_address = Some(sender.into()); self }
    pub fn with_timeout_height(mut self, height: Height) -> Self { self.timeout_height = Some(height); self }
    pub fn with_timeout_timestamp(mut self, nanos: u64) -> Self { self.timeout_timestamp = Some(nanos); self }
    pub fn with_fee(mut self, fee: Fee) -> Self { self.fee = Some(fee); self }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstantiateContractArgs {
    pub sender_address: Option<String>,
    pub code_id: u64,
    pub msg: Value,
    pub label: String,
    pub admin: Option<String>,
    pub funds: Vec<Coin>,
    pub fee: Option<Fee>,
    pub memo: Option<String>,
}

impl InstantiateContractArgs {
    pub fn new(code_id: u64, msg: Value, label: impl Into<String>) -> Self {
        Self { sender_address: None, code_id, msg, label: label.into(), admin: None, funds: vec![], fee: None, memo: None }
    }
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self { self.sender_address = Some(sender.into()); self }
    pub fn with_admin(mut self, admin: impl Into<String>) -> Self { self.admin = Some(admin.into()); self }
    pub fn with_funds(mut self, funds: Vec<Coin>) -> Self { self.funds = funds; self }
    pub fn with_fee(mut self, fee: Fee) -> Self { self.fee = Some(fee); self }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteContractArgs {
    pub sender_address: Option<String>,
    pub contract_address: String,
    pub msg: Value,
    pub funds: Vec<Coin>,
    pub fee: Option<Fee>,
    pub memo: Option<String>,
}

impl ExecuteContractArgs {
    pub fn new(contract_address: impl Into<String>, msg: Value) -> Self {
        Self { sender_address: None, contract_address: contract_address.into(), msg, funds: vec![], fee: None, memo: None }
    }
    pub fn with_sender(mut self, sender: impl Into<String>) -> Self { self.sender_address = Some(sender.into()); self }
    pub fn with_funds(mut self, funds: Vec<Coin>) -> Self { self.funds = funds; self }
    pub fn with_fee(mut self, fee: Fee) -> Self { self.fee = Some(fee); self }
    pub fn with_memo(mut self, memo: impl Into<String>) -> Self { self.memo = Some(memo.into()); self }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutationRequest {
    SendTokens(SendTokensArgs),
    SendIbcTokens(SendIbcTokensArgs),
    InstantiateContract(InstantiateContractArgs),
    ExecuteContract(ExecuteContractArgs),
}

impl MutationRequest {
    pub fn kind(&self) -> MutationKind {
        match self {
            MutationRequest::SendTokens(_) => MutationKind::SendTokens,
            MutationRequest::SendIbcTokens(_) => MutationKind::SendIbcTokens,
            MutationRequest::InstantiateContract(_) => MutationKind::InstantiateContract,
            MutationRequest::ExecuteContract(_) => MutationKind::ExecuteContract,
        }
    }

    pub fn sender(&self) -> Option<&str> {
        let sender = match self {
            MutationRequest::SendTokens(a) => &a.sender_address,
            MutationRequest::SendIbcTokens(a) => &a.sender_address,
            MutationRequest::InstantiateContract(a) => &a.sender_address,
            MutationRequest::ExecuteContract(a) => &a.sender_address,
        };
        sender.as_deref().filter(|s| !s.trim().is_empty())
    }

    pub fn fee(&self) -> &Fee {
        let fee = match self {
            MutationRequest::SendTokens(a) => &a.fee,
            MutationRequest::SendIbcTokens(a) => &a.fee,
            MutationRequest::InstantiateContract(a) => &a.fee,
            MutationRequest::ExecuteContract(a) => &a.fee,
        };
        static AUTO: Fee = Fee::Auto;
        fee.as_ref().unwrap_or(&AUTO)
    }

    pub fn memo(&self) -> Option<&str> {
        match self {
            MutationRequest::SendTokens(a) => a.memo.as_deref(),
            MutationRequest::SendIbcTokens(a) => a.memo.as_deref(),
            MutationRequest::InstantiateContract(a) => a.memo.as_deref(),
            MutationRequest::ExecuteContract(a) => a.memo.as_deref(),
        }
    }

    /// Argument checks that need neither a session nor the network.
    pub fn validate(&self) -> Result<()> {
        match self {
            MutationRequest::SendTokens(a) => {
                require(&a.recipient_address, "recipient address")?;
                if a.amount.is_empty() {
                    return Err(WalletError::invalid("amount is empty"));
                }
                a.amount.iter().try_for_each(Coin::validate)
            }
            MutationRequest::SendIbcTokens(a) => {
                require(&a.recipient_address, "recipient address")?;
                require(&a.source_port, "source port")?;
                require(&a.source_channel, "source channel")?;
                if a.timeout_height.is_none() && a.timeout_timestamp.is_none() {
                    return Err(WalletError::invalid("IBC transfer needs a timeout height or timestamp"));
                }
                a.transfer_amount.validate()
            }
            MutationRequest::InstantiateContract(a) => {
                if a.code_id == 0 {
                    return Err(WalletError::invalid("code id must be positive"));
                }
                require(&a.label, "label")?;
                require_msg(&a.msg)?;
                a.funds.iter().try_for_each(Coin::validate)
            }
            MutationRequest::ExecuteContract(a) => {
                require(&a.contract_address, "contract address")?;
                require_msg(&a.msg)?;
                a.funds.iter().try_for_each(Coin::validate)
            }
        }
    }

    /// Same request with the sender and fee policy filled in.
    pub fn resolved(&self, sender: &str) -> Self {
        let mut request = self.clone();
        let fee = Some(request.fee().clone());
        match &mut request {
            MutationRequest::SendTokens(a) => { a.sender_address = Some(sender.into()); a.fee = fee; }
            MutationRequest::SendIbcTokens(a) => { a.sender_address = Some(sender.into()); a.fee = fee; }
            MutationRequest::InstantiateContract(a) => { a.sender_address = Some(sender.into()); a.fee = fee; }
            MutationRequest::ExecuteContract(a) => { a.sender_address = Some(sender.into()); a.fee = fee; }
        }
        request
    }

    pub fn key(&self, sender: &str) -> MutationKey {
        MutationKey::derive(self.kind(), sender, &self.resolved(sender))
    }

    pub fn messages(&self, sender: &str) -> Vec<ChainMsg> {
        let msg = match self {
            MutationRequest::SendTokens(a) => ChainMsg::Send {
                from_address: sender.into(),
                to_address: a.recipient_address.clone(),
                amount: a.amount.clone(),
            },
            MutationRequest::SendIbcTokens(a) => ChainMsg::IbcTransfer {
                source_port: a.source_port.clone(),
                source_channel: a.source_channel.clone(),
                token: a.transfer_amount.clone(),
                sender: sender.into(),
                receiver: a.recipient_address.clone(),
                timeout_height: a.timeout_height,
                timeout_timestamp: a.timeout_timestamp,
            },
            MutationRequest::InstantiateContract(a) => ChainMsg::InstantiateContract {
                sender: sender.into(),
                admin: a.admin.clone(),
                code_id: a.code_id,
                label: a.label.clone(),
                msg: a.msg.clone(),
                funds: a.funds.clone(),
            },
            MutationRequest::ExecuteContract(a) => ChainMsg::ExecuteContract {
                sender: sender.into(),
                contract: a.contract_address.clone(),
                msg: a.msg.clone(),
                funds: a.funds.clone(),
            },
        };
        vec![msg]
    }
}

fn require(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(WalletError::invalid(format!("{what} is required")));
    }
    Ok(())
}

fn require_msg(msg: &Value) -> Result<()> {
    if msg.is_null() {
        return Err(WalletError::invalid("contract msg is required"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutput {
    Broadcast(TxResponse),
    Instantiated(InstantiateResult),
    Executed(ExecuteResult),
}

impl MutationOutput {
    pub fn tx_hash(&self) -> &str {
        match self {
            MutationOutput::Broadcast(r) => &r.tx_hash,
            MutationOutput::Instantiated(r) => &r.tx_hash,
            MutationOutput::Executed(r) => &r.tx_hash,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MutationStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

#[derive(Debug, Clone)]
pub struct MutationRecord {
    pub key: MutationKey,
    pub status: MutationStatus,
    pub request: MutationRequest,
    pub outcome: Option<Result<MutationOutput>>,
    pub started_at: DateTime<Utc>,
    pub settled_at: Option<DateTime<Utc>>,
}

struct MutationEntry {
    record: MutationRecord,
    attempt: u64,
    account_epoch: u64,
    in_flight: Option<SharedMutation>,
}

#[derive(Default)]
struct MutationTable {
    entries: Mutex<HashMap<MutationKey, MutationEntry>>,
    attempts: AtomicU64,
}

#[derive(Clone)]
pub struct TransactionDispatcher {
    session: SessionManager,
    client: Arc<dyn ChainClient>,
    callbacks: MutationCallbacks,
    table: Arc<MutationTable>,
}

impl TransactionDispatcher {
    pub fn new(session: SessionManager, client: Arc<dyn ChainClient>) -> Self {
        Self { session, client, callbacks: MutationCallbacks::default(), table: Arc::new(MutationTable::default()) }
    }

    /// A dispatcher sharing this one's records but firing `callbacks`.
    pub fn with_callbacks(&self, callbacks: MutationCallbacks) -> Self {
        Self { callbacks, ..self.clone() }
    }

    pub async fn send_tokens(&self, args: SendTokensArgs) -> Result<TxResponse> {
        match self.dispatch(MutationRequest::SendTokens(args)).await? {
            MutationOutput::Broadcast(response) => Ok(response),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn send_ibc_tokens(&self, args: SendIbcTokensArgs) -> Result<TxResponse> {
        match self.dispatch(MutationRequest::SendIbcTokens(args)).await? {
            MutationOutput::Broadcast(response) => Ok(response),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn instantiate_contract(&self, args: InstantiateContractArgs) -> Result<InstantiateResult> {
        match self.dispatch(MutationRequest::InstantiateContract(args)).await? {
            MutationOutput::Instantiated(result) => Ok(result),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn execute_contract(&self, args: ExecuteContractArgs) -> Result<ExecuteResult> {
        match self.dispatch(MutationRequest::ExecuteContract(args)).await? {
            MutationOutput::Executed(result) => Ok(result),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn dispatch(&self, request: MutationRequest) -> Result<MutationOutput> {
        let attempt = self.begin(request)?;
        attempt.await
    }

    /// Key the request would be recorded under with the current account.
    pub fn key_for(&self, request: &MutationRequest) -> Result<MutationKey> {
        let sender = self.resolve_sender(request)?;
        Ok(request.key(&sender))
    }

    pub fn record(&self, key: &MutationKey) -> Option<MutationRecord> {
        self.table.entries.lock().ok()?.get(key).map(|e| e.record.clone())
    }

    pub fn records(&self) -> Vec<MutationRecord> {
        self.table
            .entries
            .lock()
            .map(|entries| entries.values().map(|e| e.record.clone()).collect())
            .unwrap_or_default()
    }

    /// Drop Success/Error records; Loading ones stay joinable.
    pub fn clear_settled(&self) {
        if let Ok(mut entries) = self.table.entries.lock() {
            entries.retain(|_, e| e.record.status == MutationStatus::Loading);
        }
    }

    fn resolve_sender(&self, request: &MutationRequest) -> Result<String> {
        match request.sender() {
            Some(sender) => Ok(sender.to_string()),
            None => self.session.account_cache().address().ok_or(WalletError::MissingSender),
        }
    }

    fn begin(&self, request: MutationRequest) -> Result<SharedMutation> {
        request.validate()?;
        let accounts = self.session.account_cache();
        let epoch = accounts.epoch();
        let sender = self.resolve_sender(&request)?;
        let signer = self.session.signer()?;
        let submitted = request;
        let request = submitted.resolved(&sender);
        let key = request.key(&sender);

        let mut entries = self.table.entries.lock().map_err(|_| WalletError::ProviderFailure("mutation table lock".into()))?;
        detach_stale(&mut entries, epoch);

        if let Some(entry) = entries.get(&key) {
            if let (MutationStatus::Loading, Some(running)) = (entry.record.status, &entry.in_flight) {
                debug!(%key, "joining in-flight mutation");
                return Ok(running.clone());
            }
        }

        let attempt = self.table.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        let job = Attempt {
            id: attempt,
            key: key.clone(),
            sender,
            signer,
            request: request.clone(),
            submitted,
            epoch,
            client: self.client.clone(),
            callbacks: self.callbacks.clone(),
            table: self.table.clone(),
            accounts,
        };
        let task = tokio::spawn(job.run());
        let shared: SharedMutation = async move {
            task.await
                .unwrap_or_else(|e| Err(WalletError::BroadcastFailure { code: 0, log: format!("mutation task: {e}") }))
        }
        .boxed()
        .shared();

        entries.insert(
            key.clone(),
            MutationEntry {
                record: MutationRecord {
                    key,
                    status: MutationStatus::Loading,
                    request,
                    outcome: None,
                    started_at: Utc::now(),
                    settled_at: None,
                },
                attempt,
                account_epoch: epoch,
                in_flight: Some(shared.clone()),
            },
        );
        Ok(shared)
    }
}

/// Loading entries from an older account generation are no longer joinable.
fn detach_stale(entries: &mut HashMap<MutationKey, MutationEntry>, epoch: u64) {
    entries.retain(|key, entry| {
        let stale = entry.record.status == MutationStatus::Loading && entry.account_epoch != epoch;
        if stale {
            warn!(%key, "detaching in-flight mutation from previous account");
        }
        !stale
    });
}

fn unexpected(output: &MutationOutput) -> WalletError {
    WalletError::BroadcastFailure { code: 0, log: format!("unexpected mutation output for tx {}", output.tx_hash()) }
}

struct Attempt {
    id: u64,
    key: MutationKey,
    sender: String,
    signer: SignerHandle,
    /// Sender and fee filled in; what gets broadcast and recorded.
    request: MutationRequest,
    /// As the caller passed it; what callbacks see.
    submitted: MutationRequest,
    epoch: u64,
    client: Arc<dyn ChainClient>,
    callbacks: MutationCallbacks,
    table: Arc<MutationTable>,
    accounts: Arc<AccountCache>,
}

impl Attempt {
    async fn run(self) -> Result<MutationOutput> {
        self.callbacks.loading(&self.submitted);
        info!(key = %self.key, "broadcasting {}", self.request.kind().as_str());

        let result = self.execute().await;
        self.settle(&result);

        match &result {
            Ok(output) => {
                info!(key = %self.key, tx = %output.tx_hash(), "mutation succeeded");
                self.callbacks.success(output);
            }
            Err(error) => {
                warn!(key = %self.key, %error, "mutation failed");
                self.callbacks.error(error, &self.submitted);
            }
        }
        result
    }

    async fn execute(&self) -> Result<MutationOutput> {
        let response = self
            .client
            .sign_and_broadcast(
                &self.signer,
                &self.sender,
                self.request.messages(&self.sender),
                self.request.fee(),
                self.request.memo(),
            )
            .await?;
        if !response.is_success() {
            return Err(WalletError::broadcast(response.code, response.raw_log));
        }

        Ok(match self.request.kind() {
            MutationKind::SendTokens | MutationKind::SendIbcTokens => MutationOutput::Broadcast(response),
            MutationKind::InstantiateContract => {
                let contract_address = response
                    .attribute("instantiate", "_contract_address")
                    .or_else(|| response.attribute("instantiate", "contract_address"))
                    .ok_or_else(|| WalletError::broadcast(0, "instantiate events carry no contract address"))?
                    .to_string();
                MutationOutput::Instantiated(InstantiateResult {
                    contract_address,
                    tx_hash: response.tx_hash,
                    height: response.height,
                    gas_used: response.gas_used,
                    raw_log: response.raw_log,
                })
            }
            MutationKind::ExecuteContract => MutationOutput::Executed(ExecuteResult {
                tx_hash: response.tx_hash,
                data: response.data,
                height: response.height,
                gas_used: response.gas_used,
                raw_log: response.raw_log,
            }),
        })
    }

    /// Record the terminal state before any callback runs.
    fn settle(&self, result: &Result<MutationOutput>) {
        let Ok(mut entries) = self.table.entries.lock() else { return };
        let Some(entry) = entries.get_mut(&self.key).filter(|e| e.attempt == self.id) else {
            debug!(key = %self.key, "settled mutation was detached");
            return;
        };
        if self.accounts.epoch() != self.epoch {
            warn!(key = %self.key, "account changed during broadcast, detaching result");
            entries.remove(&self.key);
            return;
        }
        entry.record.status = if result.is_ok() { MutationStatus::Success } else { MutationStatus::Error };
        entry.record.outcome = Some(result.clone());
        entry.record.settled_at = Some(Utc::now());
        entry.in_flight = None;
    }
}
