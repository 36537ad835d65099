//! Inventory items.

use serde::{Deserialize, Serialize};

use gearlog_core::ItemId;

/// A physical equipment item.
///
/// `quantity` counts units currently on hand (not on loan) and is only ever
/// mutated by the stock ledger, inside a batch's atomic scope. Item creation
/// and deletion belong to the external inventory-management collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub quantity: i64,
    pub restricted: bool,
}
