//! Chain client interface - the collaborator that signs, broadcasts and queries.
//!
//! This crate builds messages and interprets responses; encoding, fee
//! estimation for `Fee::Auto`, signing and transport belong to the client.

use crate::core::{Coin, Fee, Height};
use crate::error::Result;
use crate::provider::SignerHandle;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const MSG_SEND: &str = "/cosmos.bank.v1beta1.MsgSend";
pub const MSG_TRANSFER: &str = "/ibc.applications.transfer.v1.MsgTransfer";
pub const MSG_INSTANTIATE_CONTRACT: &str = "/cosmwasm.wasm.v1.MsgInstantiateContract";
pub const MSG_EXECUTE_CONTRACT: &str = "/cosmwasm.wasm.v1.MsgExecuteContract";

/// Messages the dispatcher can ask the client to sign and broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChainMsg {
    Send {
        from_address: String,
        to_address: String,
        amount: Vec<Coin>,
    },
    IbcTransfer {
        source_port: String,
        source_channel: String,
        token: Coin,
        sender: String,
        receiver: String,
        timeout_height: Option<Height>,
        timeout_timestamp: Option<u64>,
    },
    InstantiateContract {
        sender: String,
        admin: Option<String>,
        code_id: u64,
        label: String,
        msg: Value,
        funds: Vec<Coin>,
    },
    ExecuteContract {
        sender: String,
        contract: String,
        msg: Value,
        funds: Vec<Coin>,
    },
}

impl ChainMsg {
    pub fn type_url(&self) -> &'static str {
        match self {
            ChainMsg::Send { .. } => MSG_SEND,
            ChainMsg::IbcTransfer { .. } => MSG_TRANSFER,
            ChainMsg::InstantiateContract { .. } => MSG_INSTANTIATE_CONTRACT,
            ChainMsg::ExecuteContract { .. } => MSG_EXECUTE_CONTRACT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventAttribute {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TxEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: Vec<EventAttribute>,
}

/// Result of a delivered transaction. `code != 0` means the chain rejected it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TxResponse {
    pub tx_hash: String,
    pub code: u32,
    pub raw_log: String,
    pub height: u64,
    pub gas_wanted: u64,
    pub gas_used: u64,
    #[serde(default)]
    pub data: Option<Vec<u8>>,
    #[serde(default)]
    pub events: Vec<TxEvent>,
}

impl TxResponse {
    pub fn is_success(&self) -> bool { self.code == 0 }

    /// First value of `key` in an event of type `kind`.
    pub fn attribute(&self, kind: &str, key: &str) -> Option<&str> {
        self.events
            .iter()
            .filter(|e| e.kind == kind)
            .flat_map(|e| e.attributes.iter())
            .find(|a| a.key == key)
            .map(|a| a.value.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstantiateResult {
    pub contract_address: String,
    pub tx_hash: String,
    pub height: u64,
    pub gas_used: u64,
    pub raw_log: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecuteResult {
    pub tx_hash: String,
    pub data: Option<Vec<u8>>,
    pub height: u64,
    pub gas_used: u64,
    pub raw_log: String,
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn sign_and_broadcast(
        &self,
        signer: &SignerHandle,
        signer_address: &str,
        messages: Vec<ChainMsg>,
        fee: &Fee,
        memo: Option<&str>,
    ) -> Result<TxResponse>;

    async fn query_contract_smart(&self, address: &str, msg: &Value) -> Result<Value>;

    /// `None` when nothing is stored under `key`.
    async fn query_contract_raw(&self, address: &str, key: &[u8]) -> Result<Option<Vec<u8>>>;
}
