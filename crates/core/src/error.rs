//! Lending error taxonomy.
//!
//! Every variant here aborts the whole batch it occurred in; the store
//! adapters roll back all mutations before surfacing the error. Business
//! failures are deterministic and never retried; `Conflict` is the one
//! transient class, and `Storage` covers everything else on the
//! infrastructure side.

use thiserror::Error;

use crate::id::{ItemId, LineId, SessionId};

/// Result type used across the lending engine.
pub type LendingResult<T> = Result<T, LendingError>;

/// Failure of a stock-transaction batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LendingError {
    /// A requested line id matched neither a set nor an item, or a session
    /// check-in line referenced a transaction that is not part of the session.
    #[error("line {0} not found")]
    LineNotFound(LineId),

    /// The caller's role may not touch the named restricted entity.
    #[error("access denied to restricted entity '{entity}'")]
    AccessDenied { entity: String },

    /// A checkout would drive an item's on-hand quantity below zero.
    #[error("insufficient stock for '{name}' (item {item_id}): requested {requested}, available {available}")]
    InsufficientStock {
        item_id: ItemId,
        name: String,
        requested: i64,
        available: i64,
    },

    /// A session check-in asked for more than is still out on loan.
    #[error("over-return on item {item_id}: requested {requested}, remaining {remaining}")]
    OverReturn {
        item_id: ItemId,
        requested: i64,
        remaining: i64,
    },

    /// The referenced checkout session is closed; closed is terminal.
    #[error("checkout session {0} is closed")]
    SessionClosed(SessionId),

    /// The referenced checkout session does not exist.
    #[error("checkout session {0} not found")]
    SessionNotFound(SessionId),

    /// Malformed batch: empty line list, non-positive quantity, metadata on
    /// a check-in, and similar shape errors.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// Transient storage conflict (lock contention, serialization failure).
    /// The store adapters retry these a bounded number of times before
    /// surfacing them.
    #[error("transient storage conflict: {0}")]
    Conflict(String),

    /// Non-retryable storage-layer failure.
    #[error("storage failure: {0}")]
    Storage(String),
}

impl LendingError {
    pub fn invalid_request(msg: impl Into<String>) -> Self {
        Self::InvalidRequest(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    /// Whether the error is a transient conflict worth retrying.
    ///
    /// Business-rule failures are deterministic and must never be retried.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }
}
