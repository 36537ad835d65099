//! Composite sets and their derived availability.

use serde::{Deserialize, Serialize};

use gearlog_core::{ItemId, SetId};

/// One component line of a set: `qty_per_set` units of an item per set unit.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SetComponent {
    pub item_id: ItemId,
    pub qty_per_set: i64,
}

/// A composite set of items checked out and returned as one line.
///
/// Read-only input to the expander; a set's own stock is never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Set {
    pub id: SetId,
    pub name: String,
    pub restricted: bool,
    pub components: Vec<SetComponent>,
}

impl Set {
    /// Derived available count: the bottleneck component decides.
    ///
    /// `min over components of floor(item.quantity / qty_per_set)`, computed
    /// fresh from current stock on every call and never cached. A set with
    /// no components has availability 0.
    pub fn availability<F>(&self, stock_of: F) -> i64
    where
        F: Fn(ItemId) -> i64,
    {
        self.components
            .iter()
            .map(|c| stock_of(c.item_id) / c.qty_per_set)
            .min()
            .unwrap_or(0)
    }
}
