//! The append-only movement log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gearlog_core::{ItemId, SessionId, TransactionId};

/// Direction of a stock movement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Checkout,
    Checkin,
}

impl TransactionKind {
    /// Ledger delta for a movement of `qty` units: checkouts debit stock,
    /// check-ins restore it.
    pub fn signed_delta(self, qty: i64) -> i64 {
        match self {
            TransactionKind::Checkout => -qty,
            TransactionKind::Checkin => qty,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TransactionKind::Checkout => "CHECKOUT",
            TransactionKind::Checkin => "CHECKIN",
        }
    }
}

impl core::fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A recorded stock movement.
///
/// Append-only: never updated or deleted by the engine. On-loan figures are
/// always derived by summing these rows, never cached elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTransaction {
    pub id: TransactionId,
    pub item_id: ItemId,
    pub kind: TransactionKind,
    pub qty: i64,
    pub note: Option<String>,
    pub session_id: Option<SessionId>,
    pub created_at: DateTime<Utc>,
}

/// A movement ready to be appended (not yet assigned an id or timestamp;
/// the store assigns both during insert).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTransaction {
    pub item_id: ItemId,
    pub kind: TransactionKind,
    pub qty: i64,
    pub note: Option<String>,
    pub session_id: Option<SessionId>,
}
