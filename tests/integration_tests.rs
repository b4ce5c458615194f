//! Integration Tests: file-backed session persistence and process-level wiring
//!
//! These tests verify:
//! 1. FileSessionStore layout under WALLETLINK_ROOT
//! 2. Session survives a context restart and is restored silently
//! 3. Explicit disconnect opts out of the next silent reconnect
//! 4. Corrupt records are ignored
//! 5. Environment configuration and logging setup

mod support;

use once_cell::sync::Lazy;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use support::*;
use tempfile::TempDir;
use walletlink::{
    FileSessionStore, PersistedSession, ProviderRegistry, SessionConfig, SessionStatus, SessionStore, WalletContext,
    WalletKind,
};

static ENV_LOCK: Lazy<Mutex<()>> = Lazy::new(|| Mutex::new(()));

fn lock_env() -> std::sync::MutexGuard<'static, ()> {
    ENV_LOCK.lock().unwrap_or_else(|p| p.into_inner())
}

async fn start(app: &str, scope: &walletlink::InjectionScope) -> WalletContext {
    WalletContext::init(
        config(),
        Arc::new(ProviderRegistry::injected(scope)),
        Arc::new(FileSessionStore::open(app)),
        MockChain::new(),
    )
    .await
}

/// Test: store path honours WALLETLINK_ROOT and round-trips a record
#[test]
fn file_store_layout_and_round_trip() {
    let _guard = lock_env();
    let dir = TempDir::new().expect("tempdir");
    std::env::set_var("WALLETLINK_ROOT", dir.path());

    let store = FileSessionStore::open("layout-app");
    assert_eq!(store.path(), dir.path().join("layout-app").join("data").join("session.json"));
    assert!(store.load().is_none());

    let record = PersistedSession::new(WalletKind::Cosmostation, "stargaze-1");
    store.save(&record).expect("save");
    assert!(store.path().exists());
    assert_eq!(store.load(), Some(record));

    store.clear().expect("clear");
    assert!(store.load().is_none());
    store.clear().expect("clear twice");
}

/// Test: connected session is restored after a restart
#[test]
fn session_restored_across_restart() {
    let _guard = lock_env();
    let dir = TempDir::new().expect("tempdir");
    std::env::set_var("WALLETLINK_ROOT", dir.path());

    let rt = runtime();
    rt.block_on(async {
        let keplr = MockWallet::new(ALICE);
        let scope = inject(&[(WalletKind::Keplr, keplr.clone())]);

        let first = start("restart-app", &scope).await;
        assert_eq!(first.session().status(), SessionStatus::Disconnected);
        first.connect(Some(WalletKind::Keplr), Some("juno-1")).await.expect("connect");
        first.dispose().await.expect("dispose");

        let second = start("restart-app", &scope).await;
        let session = second.session().session();
        assert_eq!(session.status, SessionStatus::Connected);
        assert_eq!(session.active_wallet_kind, Some(WalletKind::Keplr));
        assert_eq!(session.chain_id.as_deref(), Some("juno-1"));
        assert_eq!(second.session().get_account().expect("account").bech32_address, ALICE);
        assert_eq!(keplr.enables(), 2);
        second.dispose().await.expect("dispose");
    });
}

/// Test: explicit disconnect is remembered across a restart
#[test]
fn disconnect_opts_out_of_silent_reconnect() {
    let _guard = lock_env();
    let dir = TempDir::new().expect("tempdir");
    std::env::set_var("WALLETLINK_ROOT", dir.path());

    let rt = runtime();
    rt.block_on(async {
        let leap = MockWallet::new(ALICE);
        let scope = inject(&[(WalletKind::Leap, leap.clone())]);

        let first = start("optout-app", &scope).await;
        first.connect(Some(WalletKind::Leap), None).await.expect("connect");
        first.disconnect().await.expect("disconnect");
        first.dispose().await.expect("dispose");

        let second = start("optout-app", &scope).await;
        assert_eq!(second.session().status(), SessionStatus::Disconnected);
        assert_eq!(leap.enables(), 1);

        // The record still remembers the wallet, so a bare connect picks it.
        let session = second.connect(None, None).await.expect("connect");
        assert_eq!(session.active_wallet_kind, Some(WalletKind::Leap));
        assert_eq!(session.chain_id.as_deref(), Some(CHAIN));
    });
}

/// Test: unreadable record is treated as absent
#[test]
fn corrupt_record_is_ignored() {
    let _guard = lock_env();
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("session.json");
    std::fs::write(&path, "{ not json").expect("write");

    let store = FileSessionStore::at(&path);
    assert!(store.load().is_none());

    let rt = runtime();
    rt.block_on(async {
        let keplr = MockWallet::new(ALICE);
        let scope = inject(&[(WalletKind::Keplr, keplr.clone())]);
        let context = WalletContext::init(
            config(),
            Arc::new(ProviderRegistry::injected(&scope)),
            Arc::new(store),
            MockChain::new(),
        )
        .await;
        assert_eq!(context.session().status(), SessionStatus::Disconnected);
        assert_eq!(keplr.touched(), 0);
    });
}

/// Test: WALLETLINK_* variables feed SessionConfig
#[test]
fn config_from_env() {
    let _guard = lock_env();
    std::env::set_var("WALLETLINK_APP", "env-app");
    std::env::set_var("WALLETLINK_CHAIN_ID", "osmosis-1");
    std::env::set_var("WALLETLINK_WALLET", "cosmostation");
    std::env::set_var("WALLETLINK_ENABLE_TIMEOUT_MS", "1500");
    std::env::set_var("WALLETLINK_AUTO_RECONNECT", "off");

    let config = SessionConfig::from_env();
    assert_eq!(config.app, "env-app");
    assert_eq!(config.default_chain_id.as_deref(), Some("osmosis-1"));
    assert_eq!(config.default_wallet, Some(WalletKind::Cosmostation));
    assert_eq!(config.enable_timeout, Duration::from_millis(1500));
    assert!(!config.auto_reconnect);

    std::env::set_var("WALLETLINK_ENABLE_TIMEOUT_MS", "soon");
    assert_eq!(SessionConfig::from_env().enable_timeout, walletlink::config::DEFAULT_ENABLE_TIMEOUT);

    for key in [
        "WALLETLINK_APP",
        "WALLETLINK_CHAIN_ID",
        "WALLETLINK_WALLET",
        "WALLETLINK_ENABLE_TIMEOUT_MS",
        "WALLETLINK_AUTO_RECONNECT",
    ] {
        std::env::remove_var(key);
    }
}

/// Test: logging can be installed more than once
#[test]
fn logging_init_is_repeatable() {
    let _guard = lock_env();
    std::env::set_var("WALLETLINK_LOG_JSON", "1");
    walletlink::init_logging();
    std::env::remove_var("WALLETLINK_LOG_JSON");
    walletlink::init_logging();
    tracing::info!("logging initialised twice");
}
