//! # tg-confirm
//!
//! One-time confirmation tokens for Tool Gate.
//!
//! When a call needs explicit confirmation, the gate issues a token bound to
//! a scope key (fingerprint of the tool and its arguments). Resubmitting the
//! same call with that token redeems it exactly once.

pub mod error;
pub mod store;

pub use error::ConfirmError;
pub use store::{
    ConfirmationRecord, ConfirmationStore, JsonFileConfirmationStore, MemoryConfirmationStore,
    TokenTable, TOKEN_PREFIX,
};
