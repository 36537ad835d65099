//! Storage port for the engine.
//!
//! A [`LendingTx`] is one already-open atomic scope: every method observes
//! the scope's consistent snapshot, including rows written earlier in the
//! same batch. Adapters commit on engine success and roll the whole scope
//! back on any error (see `gearlog-infra` for the in-memory and Postgres
//! implementations).

use async_trait::async_trait;

use gearlog_core::{ItemId, LendingResult, SessionId, SetId, TransactionId};
use gearlog_inventory::{Item, NewTransaction, Set, StockTransaction};

use crate::session::{CheckoutSession, ItemTotals, NewSession};

/// One atomic transactional scope over the lending schema.
#[async_trait]
pub trait LendingTx: Send {
    /// Fetch an item row, acquiring whatever lock the adapter needs for a
    /// later read-modify-write of its quantity.
    async fn find_item(&mut self, id: ItemId) -> LendingResult<Option<Item>>;

    /// Fetch a set with its components.
    async fn find_set(&mut self, id: SetId) -> LendingResult<Option<Set>>;

    /// Write an item's new on-hand quantity.
    async fn update_item_quantity(&mut self, id: ItemId, quantity: i64) -> LendingResult<()>;

    /// Append a movement record; the store assigns id and timestamp.
    async fn insert_transaction(&mut self, new: NewTransaction) -> LendingResult<StockTransaction>;

    /// Fetch a checkout session.
    async fn find_session(&mut self, id: SessionId) -> LendingResult<Option<CheckoutSession>>;

    /// Create an open checkout session.
    async fn insert_session(&mut self, new: NewSession) -> LendingResult<CheckoutSession>;

    /// Flip a session's status to closed. Closed is terminal.
    async fn close_session(&mut self, id: SessionId) -> LendingResult<()>;

    /// Fetch one CHECKOUT transaction belonging to the given session.
    async fn find_session_checkout(
        &mut self,
        session_id: SessionId,
        id: TransactionId,
    ) -> LendingResult<Option<StockTransaction>>;

    /// Aggregate per-item CHECKOUT vs CHECKIN totals for a session,
    /// including rows inserted earlier in this same scope.
    async fn session_item_totals(&mut self, id: SessionId) -> LendingResult<Vec<ItemTotals>>;
}
