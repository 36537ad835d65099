//! Batch orchestration: the engine's two entry points.
//!
//! Both functions run inside one [`LendingTx`] scope owned by the calling
//! store adapter. They never commit or roll back themselves; returning an
//! error is the signal to discard every mutation of the batch.

use tracing::{debug, instrument};

use gearlog_auth::{Caller, authorize_restricted};
use gearlog_core::{LendingError, LendingResult, LineId};
use gearlog_inventory::{NewTransaction, TransactionKind};

use crate::expand::{ResolvedLine, expand_line};
use crate::ledger;
use crate::request::{
    BatchOutcome, BatchRequest, LineResult, SessionCheckinRequest, SessionSummary,
};
use crate::session::{SessionStatus, session_complete};
use crate::store::LendingTx;

/// Process a set-expanding movement batch (checkout or ad-hoc check-in).
///
/// Resolution and access checks run for every line before any stock moves,
/// so a batch that references a missing or restricted entity fails with the
/// ledger untouched. A checkout batch carrying production metadata opens a
/// new session and stamps every recorded transaction with it.
#[instrument(skip(tx, caller, req), fields(kind = %req.kind, lines = req.lines.len(), user = %caller.user_id))]
pub async fn process_batch<S>(
    tx: &mut S,
    caller: &Caller,
    req: &BatchRequest,
) -> LendingResult<BatchOutcome>
where
    S: LendingTx + ?Sized,
{
    req.validate()?;

    let mut resolved: Vec<ResolvedLine> = Vec::with_capacity(req.lines.len());
    for line in &req.lines {
        resolved.extend(expand_line(tx, caller, line).await?);
    }

    let session = match (req.kind, &req.metadata) {
        (TransactionKind::Checkout, Some(metadata)) => Some(
            tx.insert_session(crate::session::NewSession {
                owner_user_id: caller.user_id,
                metadata: metadata.clone(),
            })
            .await?,
        ),
        _ => None,
    };
    let session_id = session.as_ref().map(|s| s.id);

    let mut results = Vec::with_capacity(resolved.len());
    for line in resolved {
        let new_quantity = ledger::adjust(tx, line.item_id, req.kind.signed_delta(line.qty)).await?;
        let recorded = tx
            .insert_transaction(NewTransaction {
                item_id: line.item_id,
                kind: req.kind,
                qty: line.qty,
                note: req.note.clone(),
                session_id,
            })
            .await?;
        debug!(
            item = %line.item_id,
            qty = recorded.qty,
            new_quantity,
            "recorded {} for '{}'", req.kind, line.item_name
        );
        results.push(LineResult {
            item_id: line.item_id,
            applied_qty: recorded.qty,
            new_quantity,
            set_id: line.set_id,
        });
    }

    Ok(BatchOutcome {
        results,
        session: session.map(|s| SessionSummary {
            id: s.id,
            status: s.status,
        }),
    })
}

/// Process a validated partial return against an open checkout session.
///
/// Each line must reference the originating CHECKOUT transaction; the
/// requested quantity is validated against the session-wide remaining
/// quantity for that item. After all lines are recorded the closing check
/// re-aggregates the whole session and flips it to closed when every item
/// is fully returned.
#[instrument(skip(tx, caller, req), fields(session = %req.session_id, lines = req.lines.len(), user = %caller.user_id))]
pub async fn process_session_checkin<S>(
    tx: &mut S,
    caller: &Caller,
    req: &SessionCheckinRequest,
) -> LendingResult<BatchOutcome>
where
    S: LendingTx + ?Sized,
{
    req.validate()?;

    let session = tx
        .find_session(req.session_id)
        .await?
        .ok_or(LendingError::SessionNotFound(req.session_id))?;
    if session.status == SessionStatus::Closed {
        return Err(LendingError::SessionClosed(req.session_id));
    }

    let mut results = Vec::with_capacity(req.lines.len());
    for line in &req.lines {
        let origin = tx
            .find_session_checkout(req.session_id, line.transaction_id)
            .await?
            .filter(|t| t.item_id == line.item_id)
            .ok_or(LendingError::LineNotFound(LineId::new(line.transaction_id.get())))?;

        // Session-wide aggregate, not just the originating transaction:
        // prior partial returns from other batches count too.
        let totals = tx.session_item_totals(req.session_id).await?;
        let remaining = totals
            .iter()
            .find(|t| t.item_id == line.item_id)
            .map(|t| t.remaining())
            .unwrap_or(0);
        if line.qty > remaining {
            return Err(LendingError::OverReturn {
                item_id: line.item_id,
                requested: line.qty,
                remaining,
            });
        }

        let item = tx
            .find_item(line.item_id)
            .await?
            .ok_or(LendingError::LineNotFound(LineId::new(line.item_id.get())))?;
        if item.restricted {
            authorize_restricted(caller, &item.name)?;
        }

        let new_quantity = ledger::adjust(tx, line.item_id, line.qty).await?;
        let recorded = tx
            .insert_transaction(NewTransaction {
                item_id: line.item_id,
                kind: TransactionKind::Checkin,
                qty: line.qty,
                note: Some(format!(
                    "Partial return for production '{}' ({}/{})",
                    session.metadata.production_name, line.qty, origin.qty
                )),
                session_id: Some(req.session_id),
            })
            .await?;
        results.push(LineResult {
            item_id: line.item_id,
            applied_qty: recorded.qty,
            new_quantity,
            set_id: None,
        });
    }

    let totals = tx.session_item_totals(req.session_id).await?;
    let status = if session_complete(&totals) {
        tx.close_session(req.session_id).await?;
        debug!(session = %req.session_id, "all items returned, session closed");
        SessionStatus::Closed
    } else {
        SessionStatus::Open
    };

    Ok(BatchOutcome {
        results,
        session: Some(SessionSummary {
            id: req.session_id,
            status,
        }),
    })
}
