//! Deduplication keys.
//!
//! A key is a stable value derived from an operation's arguments. Two calls
//! with equal arguments produce equal keys regardless of map field order, so
//! keys can back a `HashMap` of in-flight work.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::fmt;

/// 32-byte SHA-256 of a canonical JSON payload.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PayloadDigest([u8; 32]);

impl PayloadDigest {
    pub fn of<T: Serialize + ?Sized>(payload: &T) -> Self {
        let value = serde_json::to_value(payload).unwrap_or(Value::Null);
        Self::of_value(&value)
    }

    pub fn of_value(value: &Value) -> Self {
        let mut hasher = Sha256::new();
        write_canonical(value, &mut hasher);
        Self(hasher.finalize().into())
    }

    pub fn of_bytes(bytes: &[u8]) -> Self { Self(Sha256::digest(bytes).into()) }

    pub fn as_bytes(&self) -> &[u8; 32] { &self.0 }

    pub fn to_hex(&self) -> String { hex::encode(self.0) }
}

impl fmt::Debug for PayloadDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PayloadDigest({})", &self.to_hex()[..16])
    }
}

// Objects are written with sorted keys so field order never changes the digest.
fn write_canonical(value: &Value, hasher: &mut Sha256) {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<_> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            hasher.update(b"{");
            for (i, (k, v)) in entries.into_iter().enumerate() {
                if i > 0 { hasher.update(b","); }
                hasher.update(Value::String(k.clone()).to_string().as_bytes());
                hasher.update(b":");
                write_canonical(v, hasher);
            }
            hasher.update(b"}");
        }
        Value::Array(items) => {
            hasher.update(b"[");
            for (i, item) in items.iter().enumerate() {
                if i > 0 { hasher.update(b","); }
                write_canonical(item, hasher);
            }
            hasher.update(b"]");
        }
        scalar => hasher.update(scalar.to_string().as_bytes()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum MutationKind {
    SendTokens,
    SendIbcTokens,
    InstantiateContract,
    ExecuteContract,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MutationKind::SendTokens => "send_tokens",
            MutationKind::SendIbcTokens => "send_ibc_tokens",
            MutationKind::InstantiateContract => "instantiate_contract",
            MutationKind::ExecuteContract => "execute_contract",
        }
    }
}

/// Identity of a mutation: operation kind, resolved sender, payload digest.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MutationKey {
    pub kind: MutationKind,
    pub sender: String,
    pub digest: PayloadDigest,
}

impl MutationKey {
    pub fn derive<T: Serialize + ?Sized>(kind: MutationKind, sender: &str, payload: &T) -> Self {
        Self { kind, sender: sender.to_string(), digest: PayloadDigest::of(payload) }
    }
}

impl fmt::Display for MutationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.kind.as_str(), self.sender, &self.digest.to_hex()[..16])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum QueryKind {
    Smart,
    Raw,
}

impl QueryKind {
    pub fn as_str(&self) -> &'static str {
        match self { QueryKind::Smart => "smart", QueryKind::Raw => "raw" }
    }
}

/// Identity of a read. `chain_id` is the endpoint context at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub kind: QueryKind,
    pub chain_id: Option<String>,
    pub contract: String,
    pub digest: PayloadDigest,
}

impl QueryKey {
    pub fn smart(chain_id: Option<&str>, contract: &str, msg: &Value) -> Self {
        Self {
            kind: QueryKind::Smart,
            chain_id: chain_id.map(str::to_string),
            contract: contract.to_string(),
            digest: PayloadDigest::of_value(msg),
        }
    }

    pub fn raw(chain_id: Option<&str>, contract: &str, key: &[u8]) -> Self {
        Self {
            kind: QueryKind::Raw,
            chain_id: chain_id.map(str::to_string),
            contract: contract.to_string(),
            digest: PayloadDigest::of_bytes(key),
        }
    }
}

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}:{}",
            self.kind.as_str(),
            self.chain_id.as_deref().unwrap_or("-"),
            self.contract,
            &self.digest.to_hex()[..16]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn digest_ignores_field_order() {
        let a: Value = serde_json::from_str(r#"{"b": 1, "a": {"y": [1, 2], "x": "z"}}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"a": {"x": "z", "y": [1, 2]}, "b": 1}"#).unwrap();
        assert_eq!(PayloadDigest::of_value(&a), PayloadDigest::of_value(&b));
    }

    #[test]
    fn digest_distinguishes_array_order_and_types() {
        assert_ne!(PayloadDigest::of_value(&json!([1, 2])), PayloadDigest::of_value(&json!([2, 1])));
        assert_ne!(PayloadDigest::of_value(&json!("1")), PayloadDigest::of_value(&json!(1)));
    }

    #[test]
    fn mutation_key_depends_on_sender_and_kind() {
        let payload = json!({"recipient": "addr1", "amount": [{"denom": "utoken", "amount": "10"}]});
        let a = MutationKey::derive(MutationKind::SendTokens, "cosmos1a", &payload);
        let b = MutationKey::derive(MutationKind::SendTokens, "cosmos1a", &payload);
        let c = MutationKey::derive(MutationKind::SendTokens, "cosmos1b", &payload);
        let d = MutationKey::derive(MutationKind::ExecuteContract, "cosmos1a", &payload);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
        assert!(a.to_string().starts_with("send_tokens:cosmos1a:"));
    }

    #[test]
    fn query_keys_separate_kinds_and_chains() {
        let smart = QueryKey::smart(Some("chain-1"), "cosmos1contract", &json!({"config": {}}));
        let other_chain = QueryKey::smart(Some("chain-2"), "cosmos1contract", &json!({"config": {}}));
        let raw = QueryKey::raw(Some("chain-1"), "cosmos1contract", b"config");
        assert_ne!(smart, other_chain);
        assert_ne!(smart.kind, raw.kind);
        assert_eq!(raw, QueryKey::raw(Some("chain-1"), "cosmos1contract", b"config"));
    }
}
