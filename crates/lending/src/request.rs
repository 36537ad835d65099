//! Batch requests and outcomes: the engine's external data contract.

use serde::{Deserialize, Serialize};

use gearlog_core::{ItemId, LendingError, LendingResult, LineId, SessionId, SetId, TransactionId};
use gearlog_inventory::TransactionKind;

use crate::session::{ProductionMetadata, SessionStatus};

/// One requested line of a set-expanding batch: an item or set reference
/// plus a quantity.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchLine {
    pub line_id: LineId,
    pub qty: i64,
}

/// A set-expanding movement batch.
///
/// For `Checkout` with `metadata`, a new open session is created and every
/// recorded transaction is stamped with it. Without metadata the checkout is
/// an ad-hoc loan; `Checkin` batches restore stock with no session
/// reference (ad-hoc return). Session-scoped returns go through
/// [`SessionCheckinRequest`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchRequest {
    pub kind: TransactionKind,
    pub lines: Vec<BatchLine>,
    pub note: Option<String>,
    pub metadata: Option<ProductionMetadata>,
}

impl BatchRequest {
    /// Shape validation, run before any storage access.
    pub fn validate(&self) -> LendingResult<()> {
        if self.lines.is_empty() {
            return Err(LendingError::invalid_request("empty batch"));
        }
        for line in &self.lines {
            if line.qty <= 0 {
                return Err(LendingError::invalid_request(format!(
                    "quantity must be positive (line {}, qty {})",
                    line.line_id, line.qty
                )));
            }
        }
        if self.kind == TransactionKind::Checkin && self.metadata.is_some() {
            return Err(LendingError::invalid_request(
                "production metadata only applies to checkout batches",
            ));
        }
        Ok(())
    }
}

/// One returned line of a session check-in, referencing the originating
/// CHECKOUT transaction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCheckinLine {
    pub transaction_id: TransactionId,
    pub item_id: ItemId,
    pub qty: i64,
}

/// A validated partial return against an open session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCheckinRequest {
    pub session_id: SessionId,
    pub lines: Vec<SessionCheckinLine>,
}

impl SessionCheckinRequest {
    /// Shape validation, run before any storage access.
    pub fn validate(&self) -> LendingResult<()> {
        if self.lines.is_empty() {
            return Err(LendingError::invalid_request("empty batch"));
        }
        for line in &self.lines {
            if line.qty <= 0 {
                return Err(LendingError::invalid_request(format!(
                    "quantity must be positive (transaction {}, qty {})",
                    line.transaction_id, line.qty
                )));
            }
        }
        Ok(())
    }
}

/// Applied movement for one resolved line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineResult {
    pub item_id: ItemId,
    pub applied_qty: i64,
    pub new_quantity: i64,
    /// Set the line was expanded from, if any.
    pub set_id: Option<SetId>,
}

/// Session state as of the end of the batch.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: SessionId,
    pub status: SessionStatus,
}

/// Successful batch result, consumed by notification/report collaborators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
    pub results: Vec<LineResult>,
    pub session: Option<SessionSummary>,
}
