//! The stock ledger: the single read-modify-write rule for item quantity.

use gearlog_core::{ItemId, LendingError, LendingResult, LineId};

use crate::store::LendingTx;

/// Apply a signed delta to an item's on-hand quantity.
///
/// Reads the row fresh inside the current scope (a prior line in the same
/// batch may already have moved this item), rejects any result below zero
/// or outside the `i64` range, and writes the new value. Returns the new
/// quantity.
pub async fn adjust<S>(tx: &mut S, item_id: ItemId, delta: i64) -> LendingResult<i64>
where
    S: LendingTx + ?Sized,
{
    let item = tx
        .find_item(item_id)
        .await?
        .ok_or(LendingError::LineNotFound(LineId::new(item_id.get())))?;

    let new_quantity = item.quantity.checked_add(delta).ok_or_else(|| {
        LendingError::invalid_request(format!(
            "quantity adjustment overflows for item {item_id}"
        ))
    })?;
    if new_quantity < 0 {
        return Err(LendingError::InsufficientStock {
            item_id,
            name: item.name,
            requested: -delta,
            available: item.quantity,
        });
    }

    tx.update_item_quantity(item_id, new_quantity).await?;
    Ok(new_quantity)
}
