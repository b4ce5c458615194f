//! Runtime - dispose signal for background tasks owned by a wallet context

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Dispose signal broadcaster. Cloning shares the same signal.
#[derive(Clone)]
pub struct Shutdown {
    sender: broadcast::Sender<()>,
    triggered: Arc<AtomicBool>,
}

impl Default for Shutdown {
    fn default() -> Self { Self::new() }
}

impl Shutdown {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(1);
        Self { sender, triggered: Arc::new(AtomicBool::new(false)) }
    }

    /// Subscribe to the dispose signal
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.sender.subscribe()
    }

    /// Trigger; only the first call notifies subscribers
    pub fn trigger(&self) {
        if !self.triggered.swap(true, Ordering::SeqCst) {
            let _ = self.sender.send(());
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Resolve once triggered, including when it already was.
    pub async fn wait(&self) {
        let mut rx = self.subscribe();
        if self.is_triggered() {
            return;
        }
        let _ = rx.recv().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_is_idempotent_and_wakes_waiters() {
        let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().expect("runtime");
        rt.block_on(async {
            let shutdown = Shutdown::new();
            assert!(!shutdown.is_triggered());

            let waiter = shutdown.clone();
            let handle = tokio::spawn(async move { waiter.wait().await });

            tokio::task::yield_now().await;
            shutdown.trigger();
            shutdown.trigger();
            assert!(shutdown.is_triggered());

            let joined = tokio::time::timeout(std::time::Duration::from_millis(200), handle).await;
            assert!(joined.is_ok());

            // Late waiters return immediately.
            shutdown.wait().await;
        });
    }
}
