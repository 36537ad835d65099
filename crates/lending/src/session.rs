//! Checkout sessions: the production-loan record and its state machine.
//!
//! A session groups the CHECKOUT transactions of one production loan and
//! accumulates CHECKIN transactions against them. States are `Open` and
//! `Closed`; `Closed` is terminal and is entered exactly once, when every
//! item under the session has been fully returned.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gearlog_core::{ItemId, SessionId, UserId};

/// Session lifecycle state.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Open,
    Closed,
}

impl SessionStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SessionStatus::Open => "OPEN",
            SessionStatus::Closed => "CLOSED",
        }
    }
}

impl core::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Production contact and schedule details attached to a session.
///
/// Opaque to the engine beyond storage: the reporting and notification
/// collaborators read it back verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionMetadata {
    pub production_name: String,
    pub contact_name: String,
    pub contact_surname: String,
    pub organization: String,
    pub email: String,
    pub telephone: String,
    pub pickup_date: DateTime<Utc>,
    pub restitution_date: DateTime<Utc>,
    pub tech_person: Option<String>,
}

/// A production loan: one batch of checkouts returned over time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: SessionId,
    pub status: SessionStatus,
    pub owner_user_id: UserId,
    pub metadata: ProductionMetadata,
    pub created_at: DateTime<Utc>,
}

/// A session ready to be created (id and timestamp assigned by the store).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    pub owner_user_id: UserId,
    pub metadata: ProductionMetadata,
}

/// Aggregate movement totals for one item under one session.
///
/// Always re-derived by summing the transaction log within the current
/// atomic scope; never cached.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ItemTotals {
    pub item_id: ItemId,
    pub checked_out: i64,
    pub checked_in: i64,
}

impl ItemTotals {
    /// Quantity still out on loan for this item.
    pub fn remaining(&self) -> i64 {
        self.checked_out - self.checked_in
    }
}

/// Closing predicate: every item under the session is fully returned.
///
/// Runs once per batch, after all lines are recorded, over the complete
/// session aggregate (including returns from prior batches).
pub fn session_complete(totals: &[ItemTotals]) -> bool {
    totals.iter().all(|t| t.checked_in >= t.checked_out)
}
