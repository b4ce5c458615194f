//! Session persistence - the `{last wallet, last chain}` record used for silent reconnection.

use crate::error::{Result, WalletError};
use crate::provider::WalletKind;
use serde::{Deserialize, Serialize};
use std::sync::Mutex;

#[cfg(feature = "native")]
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedSession {
    pub last_wallet_kind: String,
    pub last_chain_id: String,
    /// Cleared by an explicit disconnect so the next start stays disconnected.
    #[serde(default = "default_true")]
    pub auto_reconnect: bool,
}

fn default_true() -> bool { true }

impl PersistedSession {
    pub fn new(kind: WalletKind, chain_id: impl Into<String>) -> Self {
        Self { last_wallet_kind: kind.as_str().to_string(), last_chain_id: chain_id.into(), auto_reconnect: true }
    }

    /// `None` when the stored kind is not one this build supports.
    pub fn wallet_kind(&self) -> Option<WalletKind> { WalletKind::parse(&self.last_wallet_kind) }
}

pub trait SessionStore: Send + Sync {
    /// Missing or unreadable records are reported as `None`, never as an error.
    fn load(&self) -> Option<PersistedSession>;
    fn save(&self, session: &PersistedSession) -> Result<()>;
    fn clear(&self) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemorySessionStore {
    record: Mutex<Option<PersistedSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self { Self::default() }

    pub fn with_record(record: PersistedSession) -> Self { Self { record: Mutex::new(Some(record)) } }
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<PersistedSession> { self.record.lock().ok()?.clone() }

    fn save(&self, session: &PersistedSession) -> Result<()> {
        let mut guard = self.record.lock().map_err(|_| WalletError::Persistence("store lock".into()))?;
        *guard = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        let mut guard = self.record.lock().map_err(|_| WalletError::Persistence("store lock".into()))?;
        *guard = None;
        Ok(())
    }
}

/// JSON file at `<root>/<app>/data/session.json`.
#[cfg(feature = "native")]
#[derive(Debug, Clone)]
pub struct FileSessionStore {
    path: PathBuf,
}

#[cfg(feature = "native")]
impl FileSessionStore {
    pub fn open(app: &str) -> Self { Self { path: session_path(app) } }

    pub fn at(path: impl Into<PathBuf>) -> Self { Self { path: path.into() } }

    pub fn path(&self) -> &std::path::Path { &self.path }
}

#[cfg(feature = "native")]
impl SessionStore for FileSessionStore {
    fn load(&self) -> Option<PersistedSession> {
        let raw = match std::fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!("session store unreadable at {}: {e}", self.path.display());
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!("ignoring corrupt session record at {}: {e}", self.path.display());
                None
            }
        }
    }

    fn save(&self, session: &PersistedSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| WalletError::Persistence(format!("mkdir: {e}")))?;
        }
        let json = serde_json::to_string_pretty(session).map_err(|e| WalletError::Persistence(format!("json: {e}")))?;
        std::fs::write(&self.path, json).map_err(|e| WalletError::Persistence(format!("write: {e}")))
    }

    fn clear(&self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(WalletError::Persistence(format!("remove: {e}"))),
        }
    }
}

#[cfg(feature = "native")]
fn session_path(app: &str) -> PathBuf {
    let root = std::env::var("WALLETLINK_ROOT")
        .map(PathBuf::from)
        .unwrap_or_else(|_| dirs::data_local_dir().unwrap_or_else(|| PathBuf::from(".")));
    root.join(app).join("data").join("session.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trip() {
        let store = MemorySessionStore::new();
        assert!(store.load().is_none());
        let record = PersistedSession::new(WalletKind::Leap, "juno-1");
        store.save(&record).unwrap();
        assert_eq!(store.load(), Some(record));
        store.clear().unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn record_without_flag_defaults_to_reconnect() {
        let record: PersistedSession =
            serde_json::from_str(r#"{"last_wallet_kind": "keplr", "last_chain_id": "cosmoshub-4"}"#).unwrap();
        assert!(record.auto_reconnect);
        assert_eq!(record.wallet_kind(), Some(WalletKind::Keplr));
    }

    #[cfg(feature = "native")]
    #[test]
    fn file_store_treats_corruption_as_absent() {
        let dir = tempfile::TempDir::new().unwrap();
        let store = FileSessionStore::at(dir.path().join("app").join("data").join("session.json"));
        assert!(store.load().is_none());

        store.save(&PersistedSession::new(WalletKind::Keplr, "osmosis-1")).unwrap();
        assert_eq!(store.load().unwrap().last_chain_id, "osmosis-1");

        std::fs::write(store.path(), "{not json").unwrap();
        assert!(store.load().is_none());

        store.clear().unwrap();
        store.clear().unwrap();
        assert!(!store.path().exists());
    }
}
