//! ProviderRegistry - which wallet kinds exist and how to reach them.

use super::{InjectedProvider, InjectionScope, Provider, WalletKind};
use crate::error::{Result, WalletError};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct WalletDescriptor {
    pub kind: WalletKind,
    provider: Arc<dyn Provider>,
}

impl WalletDescriptor {
    pub fn new(kind: WalletKind, provider: Arc<dyn Provider>) -> Self { Self { kind, provider } }

    pub fn detect(&self) -> bool { self.provider.detect() }

    pub fn provider(&self) -> Arc<dyn Provider> { self.provider.clone() }
}

impl std::fmt::Debug for WalletDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WalletDescriptor").field("kind", &self.kind).finish_non_exhaustive()
    }
}

/// Ordered, immutable set of wallet descriptors.
#[derive(Debug, Clone, Default)]
pub struct ProviderRegistry {
    descriptors: Vec<WalletDescriptor>,
}

impl ProviderRegistry {
    pub fn builder() -> RegistryBuilder { RegistryBuilder::default() }

    /// Every supported kind, each probing its injection key in `scope`.
    pub fn injected(scope: &InjectionScope) -> Self {
        WalletKind::ALL
            .iter()
            .fold(Self::builder(), |b, kind| b.register(*kind, Arc::new(InjectedProvider::new(*kind, scope.clone()))))
            .build()
    }

    pub fn descriptors(&self) -> &[WalletDescriptor] { &self.descriptors }

    pub fn kinds(&self) -> Vec<WalletKind> { self.descriptors.iter().map(|d| d.kind).collect() }

    /// Never fails: an unregistered kind is simply not detected.
    pub fn detect(&self, kind: WalletKind) -> bool {
        self.descriptor(kind).map(WalletDescriptor::detect).unwrap_or(false)
    }

    /// Capability handle for exactly `kind`; there is no fallback to another wallet.
    pub fn get_handle(&self, kind: WalletKind) -> Result<Arc<dyn Provider>> {
        let descriptor = self
            .descriptor(kind)
            .ok_or_else(|| WalletError::ProviderNotFound(format!("{kind} is not registered")))?;
        if !descriptor.detect() {
            return Err(WalletError::ProviderNotFound(format!("{kind} is not installed")));
        }
        Ok(descriptor.provider())
    }

    pub fn available_wallets(&self) -> BTreeMap<WalletKind, bool> {
        self.descriptors.iter().map(|d| (d.kind, d.detect())).collect()
    }

    fn descriptor(&self, kind: WalletKind) -> Option<&WalletDescriptor> {
        self.descriptors.iter().find(|d| d.kind == kind)
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    descriptors: Vec<WalletDescriptor>,
}

impl RegistryBuilder {
    /// Registering a kind twice replaces the earlier provider but keeps its position.
    pub fn register(mut self, kind: WalletKind, provider: Arc<dyn Provider>) -> Self {
        match self.descriptors.iter_mut().find(|d| d.kind == kind) {
            Some(existing) => existing.provider = provider,
            None => self.descriptors.push(WalletDescriptor::new(kind, provider)),
        }
        self
    }

    pub fn build(self) -> ProviderRegistry { ProviderRegistry { descriptors: self.descriptors } }
}
