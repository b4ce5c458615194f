//! Error taxonomy shared by every component.
//!
//! Errors are `Clone` because an in-flight connect, broadcast or query is
//! shared between every caller that joined it, and each of them receives the
//! same terminal result.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WalletError {
    /// No wallet of the requested kind is registered or detected.
    #[error("wallet provider not found: {0}")]
    ProviderNotFound(String),

    /// The user declined the approval prompt in the provider.
    #[error("request rejected by user")]
    UserRejected,

    /// The provider did not answer `enable` in time.
    #[error("provider did not respond in time")]
    Timeout,

    /// The provider threw or returned something unusable.
    #[error("provider failure: {0}")]
    ProviderFailure(String),

    #[error("no active wallet session")]
    NotConnected,

    #[error("no sender address available")]
    MissingSender,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("broadcast failed (code {code}): {log}")]
    BroadcastFailure { code: u32, log: String },

    #[error("query failed: {0}")]
    QueryFailure(String),

    #[error("session store: {0}")]
    Persistence(String),
}

impl WalletError {
    pub fn invalid(what: impl Into<String>) -> Self {
        Self::InvalidArgument(what.into())
    }

    pub fn broadcast(code: u32, log: impl Into<String>) -> Self {
        Self::BroadcastFailure { code, log: log.into() }
    }

    /// True for errors reported before any provider or chain was contacted.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            Self::ProviderNotFound(_) | Self::NotConnected | Self::MissingSender | Self::InvalidArgument(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, WalletError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn precondition_classification() {
        assert!(WalletError::MissingSender.is_precondition());
        assert!(WalletError::invalid("address").is_precondition());
        assert!(!WalletError::UserRejected.is_precondition());
        assert!(!WalletError::broadcast(5, "out of gas").is_precondition());
    }

    #[test]
    fn broadcast_failure_message() {
        let err = WalletError::broadcast(11, "out of gas");
        assert_eq!(err.to_string(), "broadcast failed (code 11): out of gas");
    }
}
