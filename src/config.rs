//! Session configuration - passed from higher layers

use crate::provider::WalletKind;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

pub const DEFAULT_ENABLE_TIMEOUT: Duration = Duration::from_secs(120);

/// Called with the requested kind when `connect` cannot find that wallet.
pub type NotFoundHook = Arc<dyn Fn(WalletKind) + Send + Sync>;

#[derive(Clone)]
pub struct SessionConfig {
    /// Application name; scopes the persisted session record.
    pub app: String,
    /// Chain used when `connect` is called without one and nothing was persisted.
    pub default_chain_id: Option<String>,
    /// Wallet used when `connect` is called without one and nothing was persisted.
    pub default_wallet: Option<WalletKind>,
    /// Upper bound on the whole handshake: approval prompt, account and signer.
    pub enable_timeout: Duration,
    /// Attempt silent reconnection from the persisted record on init.
    pub auto_reconnect: bool,
    /// App hook for a missing wallet, e.g. to show an install link.
    pub on_not_found: Option<NotFoundHook>,
}

impl fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionConfig")
            .field("app", &self.app)
            .field("default_chain_id", &self.default_chain_id)
            .field("default_wallet", &self.default_wallet)
            .field("enable_timeout", &self.enable_timeout)
            .field("auto_reconnect", &self.auto_reconnect)
            .field("on_not_found", &self.on_not_found.is_some())
            .finish()
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            app: "walletlink".into(),
            default_chain_id: None,
            default_wallet: None,
            enable_timeout: DEFAULT_ENABLE_TIMEOUT,
            auto_reconnect: true,
            on_not_found: None,
        }
    }
}

impl SessionConfig {
    pub fn new(app: impl Into<String>) -> Self { Self { app: app.into(), ..Default::default() } }
    pub fn with_default_chain(mut self, chain_id: impl Into<String>) -> Self { self.default_chain_id = Some(chain_id.into()); self }
    pub fn with_default_wallet(mut self, kind: WalletKind) -> Self { self.default_wallet = Some(kind); self }
    pub fn with_enable_timeout(mut self, timeout: Duration) -> Self { self.enable_timeout = timeout; self }
    pub fn with_auto_reconnect(mut self, enabled: bool) -> Self { self.auto_reconnect = enabled; self }
    pub fn on_not_found(mut self, hook: impl Fn(WalletKind) + Send + Sync + 'static) -> Self {
        self.on_not_found = Some(Arc::new(hook));
        self
    }

    /// Build from `WALLETLINK_*` environment variables. Unparseable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Ok(app) = std::env::var("WALLETLINK_APP") {
            if !app.trim().is_empty() { config.app = app; }
        }
        if let Ok(chain) = std::env::var("WALLETLINK_CHAIN_ID") {
            if !chain.trim().is_empty() { config.default_chain_id = Some(chain); }
        }
        if let Some(kind) = std::env::var("WALLETLINK_WALLET").ok().and_then(|v| WalletKind::parse(&v)) {
            config.default_wallet = Some(kind);
        }
        if let Some(ms) = std::env::var("WALLETLINK_ENABLE_TIMEOUT_MS").ok().and_then(|v| v.parse::<u64>().ok()) {
            config.enable_timeout = Duration::from_millis(ms);
        }
        if let Ok(value) = std::env::var("WALLETLINK_AUTO_RECONNECT") {
            match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "on" => config.auto_reconnect = true,
                "0" | "false" | "off" => config.auto_reconnect = false,
                _ => {}
            }
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_overrides_defaults() {
        let config = SessionConfig::new("dapp")
            .with_default_chain("juno-1")
            .with_default_wallet(WalletKind::Leap)
            .with_enable_timeout(Duration::from_secs(5))
            .with_auto_reconnect(false);
        assert_eq!(config.app, "dapp");
        assert_eq!(config.default_chain_id.as_deref(), Some("juno-1"));
        assert_eq!(config.default_wallet, Some(WalletKind::Leap));
        assert_eq!(config.enable_timeout, Duration::from_secs(5));
        assert!(!config.auto_reconnect);
    }

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.enable_timeout, DEFAULT_ENABLE_TIMEOUT);
        assert!(config.auto_reconnect);
        assert!(config.default_chain_id.is_none());
        assert!(config.on_not_found.is_none());
    }

    #[test]
    fn debug_reports_hook_presence() {
        let config = SessionConfig::new("dapp").on_not_found(|_| {});
        assert!(format!("{config:?}").contains("on_not_found: true"));
    }
}
