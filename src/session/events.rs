//! EventWorker - forwards provider account/chain notifications into the session.
//!
//! One worker per successful connection. It exits when the provider closes
//! its channel, when the context is disposed, or when the connection it was
//! spawned for has been replaced.

use super::SessionInner;
use crate::provider::ProviderEvent;
use crate::runtime::Shutdown;
use std::sync::Weak;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

pub(super) struct EventWorker {
    session: Weak<SessionInner>,
    generation: u64,
    shutdown: Shutdown,
}

impl EventWorker {
    pub(super) fn new(session: Weak<SessionInner>, generation: u64, shutdown: Shutdown) -> Self {
        Self { session, generation, shutdown }
    }

    pub(super) fn spawn(self, events: broadcast::Receiver<ProviderEvent>) {
        tokio::spawn(self.run(events));
    }

    async fn run(self, mut events: broadcast::Receiver<ProviderEvent>) {
        loop {
            let event = tokio::select! {
                _ = self.shutdown.wait() => break,
                received = events.recv() => match received {
                    Ok(event) => event,
                    // Missed notifications collapse into one resync.
                    Err(RecvError::Lagged(skipped)) => {
                        debug!(skipped, "provider events lagged");
                        ProviderEvent::AccountChanged
                    }
                    Err(RecvError::Closed) => break,
                },
            };

            let Some(session) = self.session.upgrade() else { break };
            if session.read_state(|s| s.generation) != Some(self.generation) {
                break;
            }
            session.on_provider_event(self.generation, event).await;
        }
        debug!(generation = self.generation, "provider event worker stopped");
    }
}
