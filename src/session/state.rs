//! Session snapshot types

use crate::error::WalletError;
use crate::provider::WalletKind;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Error,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Disconnected => "disconnected",
            SessionStatus::Connecting => "connecting",
            SessionStatus::Connected => "connected",
            SessionStatus::Error => "error",
        }
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

/// Point-in-time view of the session. `active_wallet_kind` and `chain_id`
/// are only populated while Connected.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    pub active_wallet_kind: Option<WalletKind>,
    pub chain_id: Option<String>,
    pub status: SessionStatus,
    pub last_error: Option<WalletError>,
}

impl Session {
    pub fn is_connected(&self) -> bool { self.status == SessionStatus::Connected }

    pub(crate) fn connecting() -> Self { Self { status: SessionStatus::Connecting, ..Default::default() } }

    pub(crate) fn connected(kind: WalletKind, chain_id: &str) -> Self {
        Self {
            active_wallet_kind: Some(kind),
            chain_id: Some(chain_id.to_string()),
            status: SessionStatus::Connected,
            last_error: None,
        }
    }

    pub(crate) fn failed(error: WalletError) -> Self {
        Self { status: SessionStatus::Error, last_error: Some(error), ..Default::default() }
    }
}

/// What a connect attempt is aiming at. At most one attempt runs per session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectTarget {
    pub kind: WalletKind,
    pub chain_id: String,
}

impl fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}@{}", self.kind, self.chain_id) }
}
