//! Account cache - the active account's address and public key.
//!
//! Filled only by the session manager on a Connected transition or a
//! provider account-change notification; cleared whenever the session leaves
//! Connected. Downstream components watch `on_account_changed` and compare
//! `epoch` to detect that the account they resolved earlier is stale.

use crate::core::Account;
use crate::error::{Result, WalletError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tokio::sync::watch;

pub struct AccountCache {
    current: RwLock<Option<Account>>,
    epoch: AtomicU64,
    changes: watch::Sender<Option<Account>>,
}

impl Default for AccountCache {
    fn default() -> Self { Self::new() }
}

impl AccountCache {
    pub fn new() -> Self {
        let (changes, _) = watch::channel(None);
        Self { current: RwLock::new(None), epoch: AtomicU64::new(0), changes }
    }

    /// The active account, or `NotConnected` when the session is not Connected.
    pub fn get_account(&self) -> Result<Account> {
        self.current
            .read()
            .map_err(|_| WalletError::NotConnected)?
            .clone()
            .ok_or(WalletError::NotConnected)
    }

    pub fn address(&self) -> Option<String> {
        self.current.read().ok()?.as_ref().map(|a| a.bech32_address.clone())
    }

    pub fn is_defined(&self) -> bool { self.current.read().map(|a| a.is_some()).unwrap_or(false) }

    /// Generation counter; changes whenever the cached account is replaced or dropped.
    pub fn epoch(&self) -> u64 { self.epoch.load(Ordering::SeqCst) }

    pub fn on_account_changed(&self) -> watch::Receiver<Option<Account>> { self.changes.subscribe() }

    /// Store a freshly resolved account. Returns true if it differs from the cached one.
    pub(crate) fn resync(&self, account: Account) -> bool {
        let changed = {
            let Ok(mut guard) = self.current.write() else { return false };
            let changed = guard.as_ref() != Some(&account);
            if changed {
                *guard = Some(account.clone());
                self.epoch.fetch_add(1, Ordering::SeqCst);
            }
            changed
        };
        if changed {
            tracing::debug!(address = %account.bech32_address, "account cache resynced");
            self.changes.send_replace(Some(account));
        }
        changed
    }

    pub(crate) fn invalidate(&self) {
        let dropped = self.current.write().map(|mut guard| guard.take().is_some()).unwrap_or(false);
        if dropped {
            self.epoch.fetch_add(1, Ordering::SeqCst);
            tracing::debug!("account cache invalidated");
            self.changes.send_replace(None);
        }
    }
}
