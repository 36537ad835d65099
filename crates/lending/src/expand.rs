//! Set expansion: resolving a batch line into concrete item movements.

use gearlog_auth::{Caller, authorize_restricted};
use gearlog_core::{ItemId, LendingError, LendingResult, LineId, SetId};

use crate::request::BatchLine;
use crate::store::LendingTx;

/// A line after set expansion: one item movement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLine {
    pub item_id: ItemId,
    pub item_name: String,
    pub qty: i64,
    /// The set this movement was expanded from, if any.
    pub set_id: Option<SetId>,
}

/// Resolve one requested line against the current snapshot.
///
/// A line id resolves against sets first; if found, it expands to all
/// components with each per-set quantity scaled by the requested quantity.
/// Otherwise the id is treated as a direct item reference. Restricted
/// entities are checked here, per resolved line and before any mutation,
/// so a batch can fail validation with no stock changed.
pub async fn expand_line<S>(
    tx: &mut S,
    caller: &Caller,
    line: &BatchLine,
) -> LendingResult<Vec<ResolvedLine>>
where
    S: LendingTx + ?Sized,
{
    if let Some(set) = tx.find_set(line.line_id.as_set_id()).await? {
        if set.restricted {
            authorize_restricted(caller, &set.name)?;
        }
        let mut resolved = Vec::with_capacity(set.components.len());
        for component in &set.components {
            let item = tx
                .find_item(component.item_id)
                .await?
                .ok_or(LendingError::LineNotFound(LineId::new(component.item_id.get())))?;
            let qty = line.qty.checked_mul(component.qty_per_set).ok_or_else(|| {
                LendingError::invalid_request(format!(
                    "set quantity overflows for '{}' (line {})",
                    set.name, line.line_id
                ))
            })?;
            resolved.push(ResolvedLine {
                item_id: item.id,
                item_name: item.name,
                qty,
                set_id: Some(set.id),
            });
        }
        return Ok(resolved);
    }

    let item = tx
        .find_item(line.line_id.as_item_id())
        .await?
        .ok_or(LendingError::LineNotFound(line.line_id))?;
    if item.restricted {
        authorize_restricted(caller, &item.name)?;
    }
    Ok(vec![ResolvedLine {
        item_id: item.id,
        item_name: item.name,
        qty: line.qty,
        set_id: None,
    }])
}
