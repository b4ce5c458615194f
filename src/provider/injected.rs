//! Injected wallets - providers that announce themselves under a named global binding.
//!
//! `InjectionScope` plays the role of the host's global object: a wallet
//! backend injects itself under its key ("keplr", "leap", ...) and may be
//! removed again at any time. `InjectedProvider` resolves the binding on every
//! call, so detection reflects installs and uninstalls between calls.

use super::{Provider, ProviderEvent, SignerHandle, WalletKind};
use crate::core::Account;
use crate::error::{Result, WalletError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

#[derive(Clone, Default)]
pub struct InjectionScope {
    bindings: Arc<RwLock<HashMap<String, Arc<dyn Provider>>>>,
}

impl InjectionScope {
    pub fn new() -> Self { Self::default() }

    pub fn inject(&self, key: impl Into<String>, backend: Arc<dyn Provider>) {
        if let Ok(mut bindings) = self.bindings.write() {
            bindings.insert(key.into(), backend);
        }
    }

    pub fn remove(&self, key: &str) -> bool {
        self.bindings.write().map(|mut b| b.remove(key).is_some()).unwrap_or(false)
    }

    pub fn lookup(&self, key: &str) -> Option<Arc<dyn Provider>> {
        self.bindings.read().ok()?.get(key).cloned()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.bindings.read().map(|b| b.keys().cloned().collect()).unwrap_or_default();
        keys.sort();
        keys
    }
}

impl std::fmt::Debug for InjectionScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InjectionScope").field("keys", &self.keys()).finish()
    }
}

/// Provider for one wallet kind, backed by whatever is bound under its injection key.
pub struct InjectedProvider {
    kind: WalletKind,
    scope: InjectionScope,
}

impl InjectedProvider {
    pub fn new(kind: WalletKind, scope: InjectionScope) -> Self { Self { kind, scope } }

    fn backend(&self) -> Result<Arc<dyn Provider>> {
        self.scope
            .lookup(self.kind.injection_key())
            .ok_or_else(|| WalletError::ProviderNotFound(format!("{} is not defined", self.kind.injection_key())))
    }
}

#[async_trait]
impl Provider for InjectedProvider {
    fn detect(&self) -> bool {
        self.scope.lookup(self.kind.injection_key()).map(|b| b.detect()).unwrap_or(false)
    }

    async fn enable(&self, chain_id: &str) -> Result<()> { self.backend()?.enable(chain_id).await }

    async fn get_account(&self, chain_id: &str) -> Result<Account> { self.backend()?.get_account(chain_id).await }

    async fn get_offline_signer(&self, chain_id: &str) -> Result<SignerHandle> {
        self.backend()?.get_offline_signer(chain_id).await
    }

    fn subscribe(&self) -> Option<broadcast::Receiver<ProviderEvent>> { self.backend().ok()?.subscribe() }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Present;

    #[async_trait]
    impl Provider for Present {
        fn detect(&self) -> bool { true }
        async fn enable(&self, _: &str) -> Result<()> { Ok(()) }
        async fn get_account(&self, _: &str) -> Result<Account> { Err(WalletError::NotConnected) }
        async fn get_offline_signer(&self, _: &str) -> Result<SignerHandle> { Ok(SignerHandle::new(())) }
    }

    #[test]
    fn detection_follows_bindings() {
        let scope = InjectionScope::new();
        let provider = InjectedProvider::new(WalletKind::Leap, scope.clone());
        assert!(!provider.detect());
        assert!(!provider.detect());

        scope.inject("leap", Arc::new(Present));
        assert!(provider.detect());
        assert!(provider.detect());
        assert_eq!(scope.keys(), vec!["leap".to_string()]);

        assert!(scope.remove("leap"));
        assert!(!provider.detect());
        assert!(!scope.remove("leap"));
    }

    #[test]
    fn missing_binding_is_provider_not_found() {
        let provider = InjectedProvider::new(WalletKind::Keplr, InjectionScope::new());
        let rt = tokio::runtime::Builder::new_current_thread().build().expect("runtime");
        let err = rt.block_on(provider.enable("cosmoshub-4")).unwrap_err();
        assert_eq!(err, WalletError::ProviderNotFound("keplr is not defined".into()));
    }
}
