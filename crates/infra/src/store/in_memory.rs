//! In-memory lending store.
//!
//! Intended for tests/dev. Batches run against a cloned scratch state that
//! replaces the live state only when the engine succeeds, so a failed batch
//! rolls back wholesale, exactly like the Postgres adapter. The mutex
//! serializes concurrent batches.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;

use gearlog_auth::Caller;
use gearlog_core::{ItemId, LendingResult, SessionId, SetId, TransactionId};
use gearlog_inventory::{Item, NewTransaction, Set, SetComponent, StockTransaction, TransactionKind};
use gearlog_lending::{
    BatchOutcome, BatchRequest, CheckoutSession, ItemTotals, LendingTx, NewSession,
    SessionCheckinRequest, SessionStatus, process_batch, process_session_checkin,
};

#[derive(Debug, Clone, Default)]
struct MemState {
    items: BTreeMap<ItemId, Item>,
    sets: BTreeMap<SetId, Set>,
    transactions: Vec<StockTransaction>,
    sessions: BTreeMap<SessionId, CheckoutSession>,
    next_item_id: i64,
    next_set_id: i64,
    next_transaction_id: i64,
    next_session_id: i64,
}

impl MemState {
    fn totals_for(&self, session_id: SessionId) -> Vec<ItemTotals> {
        let mut by_item: BTreeMap<ItemId, ItemTotals> = BTreeMap::new();
        for t in self.transactions.iter().filter(|t| t.session_id == Some(session_id)) {
            let entry = by_item.entry(t.item_id).or_insert(ItemTotals {
                item_id: t.item_id,
                checked_out: 0,
                checked_in: 0,
            });
            match t.kind {
                TransactionKind::Checkout => entry.checked_out += t.qty,
                TransactionKind::Checkin => entry.checked_in += t.qty,
            }
        }
        by_item.into_values().collect()
    }
}

/// Transactional scratch view over a cloned state.
struct MemTx {
    state: MemState,
}

#[async_trait]
impl LendingTx for MemTx {
    async fn find_item(&mut self, id: ItemId) -> LendingResult<Option<Item>> {
        Ok(self.state.items.get(&id).cloned())
    }

    async fn find_set(&mut self, id: SetId) -> LendingResult<Option<Set>> {
        Ok(self.state.sets.get(&id).cloned())
    }

    async fn update_item_quantity(&mut self, id: ItemId, quantity: i64) -> LendingResult<()> {
        if let Some(item) = self.state.items.get_mut(&id) {
            item.quantity = quantity;
        }
        Ok(())
    }

    async fn insert_transaction(&mut self, new: NewTransaction) -> LendingResult<StockTransaction> {
        self.state.next_transaction_id += 1;
        let recorded = StockTransaction {
            id: TransactionId::new(self.state.next_transaction_id),
            item_id: new.item_id,
            kind: new.kind,
            qty: new.qty,
            note: new.note,
            session_id: new.session_id,
            created_at: Utc::now(),
        };
        self.state.transactions.push(recorded.clone());
        Ok(recorded)
    }

    async fn find_session(&mut self, id: SessionId) -> LendingResult<Option<CheckoutSession>> {
        Ok(self.state.sessions.get(&id).cloned())
    }

    async fn insert_session(&mut self, new: NewSession) -> LendingResult<CheckoutSession> {
        self.state.next_session_id += 1;
        let session = CheckoutSession {
            id: SessionId::new(self.state.next_session_id),
            status: SessionStatus::Open,
            owner_user_id: new.owner_user_id,
            metadata: new.metadata,
            created_at: Utc::now(),
        };
        self.state.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    async fn close_session(&mut self, id: SessionId) -> LendingResult<()> {
        if let Some(session) = self.state.sessions.get_mut(&id) {
            session.status = SessionStatus::Closed;
        }
        Ok(())
    }

    async fn find_session_checkout(
        &mut self,
        session_id: SessionId,
        id: TransactionId,
    ) -> LendingResult<Option<StockTransaction>> {
        Ok(self
            .state
            .transactions
            .iter()
            .find(|t| {
                t.id == id
                    && t.session_id == Some(session_id)
                    && t.kind == TransactionKind::Checkout
            })
            .cloned())
    }

    async fn session_item_totals(&mut self, id: SessionId) -> LendingResult<Vec<ItemTotals>> {
        Ok(self.state.totals_for(id))
    }
}

/// In-memory lending store with commit-on-success batch semantics.
#[derive(Debug, Default)]
pub struct InMemoryLendingStore {
    state: Mutex<MemState>,
}

impl InMemoryLendingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an item (inventory management is an external concern; this
    /// exists for tests and dev fixtures).
    pub async fn insert_item(
        &self,
        name: impl Into<String>,
        quantity: i64,
        restricted: bool,
    ) -> ItemId {
        let mut state = self.state.lock().await;
        state.next_item_id += 1;
        let id = ItemId::new(state.next_item_id);
        state.items.insert(
            id,
            Item {
                id,
                name: name.into(),
                quantity,
                restricted,
            },
        );
        id
    }

    /// Seed a set.
    pub async fn insert_set(
        &self,
        name: impl Into<String>,
        restricted: bool,
        components: Vec<SetComponent>,
    ) -> SetId {
        let mut state = self.state.lock().await;
        state.next_set_id += 1;
        let id = SetId::new(state.next_set_id);
        state.sets.insert(
            id,
            Set {
                id,
                name: name.into(),
                restricted,
                components,
            },
        );
        id
    }

    /// Run a set-expanding movement batch in one atomic scope.
    pub async fn execute_batch(
        &self,
        caller: &Caller,
        req: &BatchRequest,
    ) -> LendingResult<BatchOutcome> {
        let mut state = self.state.lock().await;
        let mut scratch = MemTx {
            state: state.clone(),
        };
        let outcome = process_batch(&mut scratch, caller, req).await?;
        *state = scratch.state;
        Ok(outcome)
    }

    /// Run a session check-in batch in one atomic scope.
    pub async fn execute_session_checkin(
        &self,
        caller: &Caller,
        req: &SessionCheckinRequest,
    ) -> LendingResult<BatchOutcome> {
        let mut state = self.state.lock().await;
        let mut scratch = MemTx {
            state: state.clone(),
        };
        let outcome = process_session_checkin(&mut scratch, caller, req).await?;
        *state = scratch.state;
        Ok(outcome)
    }

    // Read-side queries for collaborators (and assertions in tests).

    pub async fn item(&self, id: ItemId) -> Option<Item> {
        self.state.lock().await.items.get(&id).cloned()
    }

    pub async fn session(&self, id: SessionId) -> Option<CheckoutSession> {
        self.state.lock().await.sessions.get(&id).cloned()
    }

    pub async fn transactions(&self) -> Vec<StockTransaction> {
        self.state.lock().await.transactions.clone()
    }

    /// Derived set availability, computed fresh from current stock.
    pub async fn set_availability(&self, id: SetId) -> Option<i64> {
        let state = self.state.lock().await;
        let set = state.sets.get(&id)?;
        Some(set.availability(|item_id| {
            state.items.get(&item_id).map(|i| i.quantity).unwrap_or(0)
        }))
    }

    /// Open sessions, newest first (the check-in list view).
    pub async fn open_sessions(&self) -> Vec<CheckoutSession> {
        let state = self.state.lock().await;
        let mut sessions: Vec<CheckoutSession> = state
            .sessions
            .values()
            .filter(|s| s.status == SessionStatus::Open)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sessions
    }

    /// Per-item aggregate totals for one session.
    pub async fn session_totals(&self, id: SessionId) -> Vec<ItemTotals> {
        self.state.lock().await.totals_for(id)
    }
}
