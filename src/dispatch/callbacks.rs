//! Lifecycle callbacks for mutations.
//!
//! Per attempt: `on_loading` once before the broadcast, then exactly one of
//! `on_success` / `on_error`. Callers that join an in-flight attempt do not
//! fire their own callbacks; the attempt's originator owns them. Callbacks
//! receive the request as the originator submitted it, before the sender and
//! fee defaults are filled in.

use super::mutation::{MutationOutput, MutationRequest};
use crate::error::WalletError;
use std::sync::Arc;

type LoadingFn = dyn Fn(&MutationRequest) + Send + Sync;
type SuccessFn = dyn Fn(&MutationOutput) + Send + Sync;
type ErrorFn = dyn Fn(&WalletError, &MutationRequest) + Send + Sync;

#[derive(Clone, Default)]
pub struct MutationCallbacks {
    on_loading: Option<Arc<LoadingFn>>,
    on_success: Option<Arc<SuccessFn>>,
    on_error: Option<Arc<ErrorFn>>,
}

impl MutationCallbacks {
    pub fn new() -> Self { Self::default() }

    pub fn on_loading(mut self, f: impl Fn(&MutationRequest) + Send + Sync + 'static) -> Self {
        self.on_loading = Some(Arc::new(f));
        self
    }

    pub fn on_success(mut self, f: impl Fn(&MutationOutput) + Send + Sync + 'static) -> Self {
        self.on_success = Some(Arc::new(f));
        self
    }

    pub fn on_error(mut self, f: impl Fn(&WalletError, &MutationRequest) + Send + Sync + 'static) -> Self {
        self.on_error = Some(Arc::new(f));
        self
    }

    pub(crate) fn loading(&self, request: &MutationRequest) {
        if let Some(f) = &self.on_loading { f(request) }
    }

    pub(crate) fn success(&self, output: &MutationOutput) {
        if let Some(f) = &self.on_success { f(output) }
    }

    pub(crate) fn error(&self, error: &WalletError, request: &MutationRequest) {
        if let Some(f) = &self.on_error { f(error, request) }
    }
}

impl std::fmt::Debug for MutationCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationCallbacks")
            .field("on_loading", &self.on_loading.is_some())
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
