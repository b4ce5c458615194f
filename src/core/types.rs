//! Value types shared by the session, account cache and dispatchers.

use crate::error::{Result, WalletError};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A token amount. Amounts are decimal strings, as chains report them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

impl Coin {
    pub fn new(amount: u128, denom: impl Into<String>) -> Self {
        Self { denom: denom.into(), amount: amount.to_string() }
    }

    pub fn validate(&self) -> Result<()> {
        if self.denom.trim().is_empty() {
            return Err(WalletError::invalid("coin denom is empty"));
        }
        self.amount
            .parse::<u128>()
            .map(|_| ())
            .map_err(|_| WalletError::invalid(format!("coin amount '{}' is not an integer", self.amount)))
    }
}

/// Explicit fee: amount plus gas limit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StdFee {
    pub amount: Vec<Coin>,
    pub gas: u64,
}

/// Fee policy. `Auto` leaves estimation to the chain client and serializes as `"auto"`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Fee {
    #[default]
    Auto,
    Explicit(StdFee),
}

impl Fee {
    pub fn is_auto(&self) -> bool { matches!(self, Fee::Auto) }
}

impl Serialize for Fee {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Fee::Auto => serializer.serialize_str("auto"),
            Fee::Explicit(fee) => fee.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Fee {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Tag(String),
            Explicit(StdFee),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Tag(tag) if tag == "auto" => Ok(Fee::Auto),
            Repr::Tag(other) => Err(serde::de::Error::custom(format!("unknown fee policy '{other}'"))),
            Repr::Explicit(fee) => Ok(Fee::Explicit(fee)),
        }
    }
}

/// IBC timeout height.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Height {
    pub revision_number: u64,
    pub revision_height: u64,
}

/// The active account as reported by the provider for the active chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub bech32_address: String,
    #[serde(with = "base64_bytes")]
    pub public_key: Vec<u8>,
    pub algo: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_nano_ledger: bool,
}

impl Account {
    pub fn public_key_base64(&self) -> String {
        use base64::Engine;
        base64::engine::general_purpose::STANDARD.encode(&self.public_key)
    }

    /// Human-readable prefix of the address (`cosmos` in `cosmos1...`).
    pub fn prefix(&self) -> Option<&str> {
        self.bech32_address.rsplit_once('1').map(|(hrp, _)| hrp).filter(|hrp| !hrp.is_empty())
    }
}

mod base64_bytes {
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        base64::engine::general_purpose::STANDARD
            .decode(raw)
            .map_err(serde::de::Error::custom)
    }
}
