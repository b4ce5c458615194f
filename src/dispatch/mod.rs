//! Dispatchers for chain work on behalf of the session.
//!
//! `TransactionDispatcher` signs and broadcasts with the connected wallet,
//! `QueryDispatcher` reads contract state and needs no wallet at all.

mod callbacks;
mod mutation;
mod query;

pub use callbacks::MutationCallbacks;
pub use mutation::{
    ExecuteContractArgs, InstantiateContractArgs, MutationOutput, MutationRecord, MutationRequest, MutationStatus,
    SendIbcTokensArgs, SendTokensArgs, TransactionDispatcher,
};
pub use query::{FreshnessPolicy, MaxAge, QueryDispatcher, QueryOutput, QueryRecord, QueryStatus, ReuseUntilInvalidated};
