//! `gearlog-core` — shared domain foundation.
//!
//! Strongly-typed identifiers and the lending error taxonomy. This crate is
//! **pure domain** (no IO, no storage concerns).

pub mod error;
pub mod id;

pub use error::{LendingError, LendingResult};
pub use id::{ItemId, LineId, SessionId, SetId, TransactionId, UserId};
