//! Shared primitives: value types and deduplication keys.

pub mod keys;
pub mod types;

pub use keys::{MutationKey, MutationKind, PayloadDigest, QueryKey, QueryKind};
pub use types::{Account, Coin, Fee, Height, StdFee};
