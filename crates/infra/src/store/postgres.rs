//! Postgres-backed lending store.
//!
//! One batch runs in one `READ COMMITTED` transaction with explicit
//! `SELECT ... FOR UPDATE` row locks on every touched item (and on the
//! session row for session check-ins), so two concurrent checkouts can
//! never both pass the non-negativity check against a stale read, and the
//! closing-check aggregation sees the rows written earlier in the same
//! batch. Lock waits are bounded via `lock_timeout`.
//!
//! ## Error Mapping
//!
//! | PostgreSQL SQLSTATE | LendingError | Scenario |
//! |---------------------|--------------|----------|
//! | `40001`             | `Conflict`   | Serialization failure |
//! | `40P01`             | `Conflict`   | Deadlock detected |
//! | `55P03`             | `Conflict`   | Lock wait exceeded `lock_timeout` |
//! | anything else       | `Storage`    | Connection/constraint/other failures |
//!
//! `Conflict` errors are retried with exponential backoff up to
//! `max_conflict_retries` times; everything else surfaces immediately.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{Postgres, Row, Transaction};
use tracing::{instrument, warn};

use gearlog_auth::Caller;
use gearlog_core::{
    ItemId, LendingError, LendingResult, SessionId, SetId, TransactionId, UserId,
};
use gearlog_inventory::{Item, NewTransaction, Set, SetComponent, StockTransaction, TransactionKind};
use gearlog_lending::{
    BatchOutcome, BatchRequest, CheckoutSession, ItemTotals, LendingTx, NewSession,
    SessionCheckinRequest, SessionStatus, process_batch, process_session_checkin,
};

use crate::config::StoreConfig;

/// Postgres-backed lending store.
///
/// Thread-safe: the SQLx pool is `Send + Sync` and each batch gets its own
/// transaction.
#[derive(Debug, Clone)]
pub struct PostgresLendingStore {
    pool: PgPool,
    max_conflict_retries: u32,
}

impl PostgresLendingStore {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            max_conflict_retries: 3,
        }
    }

    pub async fn connect(config: &StoreConfig) -> LendingResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect(&config.database_url)
            .await
            .map_err(map_sqlx)?;
        Ok(Self {
            pool,
            max_conflict_retries: config.max_conflict_retries,
        })
    }

    /// Run a set-expanding movement batch in one atomic transaction,
    /// retrying transient conflicts a bounded number of times.
    #[instrument(skip(self, caller, req), fields(kind = %req.kind, lines = req.lines.len()))]
    pub async fn execute_batch(
        &self,
        caller: &Caller,
        req: &BatchRequest,
    ) -> LendingResult<BatchOutcome> {
        let mut attempt = 0;
        loop {
            let mut tx = self.begin().await?;
            let result = match process_batch(&mut tx, caller, req).await {
                Ok(outcome) => tx.commit().await.map(|()| outcome),
                Err(err) => {
                    tx.rollback().await;
                    Err(err)
                }
            };
            match result {
                Ok(outcome) => return Ok(outcome),
                Err(err) if err.is_transient() && attempt < self.max_conflict_retries => {
                    attempt += 1;
                    warn!(attempt, %err, "retrying batch after transient conflict");
                    tokio::time::sleep(backoff(attempt)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Run a session check-in batch in one atomic transaction, with the
    /// same bounded retry policy as [`execute_batch`](Self::execute_batch).
    #[instrument(skip(self, caller, req), fields(session = %req.session_id, lines = req.lines.len()))]
    pub async fn execute_session_checkin(
        &self,
        caller: &Caller,
        req: &SessionCheckinRequest,
    ) -> LendingResult<BatchOutcome> {
        let mut attempt = 0;
        loop {
            let mut tx = self.begin().await?;
            let result = match process_session_checkin(&mut tx, caller, req).await {
                Ok(outcome) => tx.commit().await.map(|()| outcome),
                Err(err) => {
                    tx.rollback().await;
                    Err(err)
                }
            };
            match result {
                Ok(outcome) => return Ok(outcome),
                Err(err) if err.is_transient() && attempt < self.max_conflict_retries => {
                    attempt += 1;
                    warn!(attempt, %err, "retrying session check-in after transient conflict");
                    tokio::time::sleep(backoff(attempt)).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn begin(&self) -> LendingResult<PgTx> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx)?;
        // Bounded lock waits: surfaced as a retryable conflict, never a hang.
        sqlx::query("SET LOCAL lock_timeout = '2s'")
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;
        Ok(PgTx { tx })
    }

    // Read-side queries for collaborators.

    pub async fn item(&self, id: ItemId) -> LendingResult<Option<Item>> {
        let row = sqlx::query("SELECT id, name, quantity, restricted FROM items WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        row.map(|r| item_from_row(&r)).transpose()
    }

    /// Derived set availability, computed fresh from current stock.
    pub async fn set_availability(&self, id: SetId) -> LendingResult<Option<i64>> {
        let set = sqlx::query("SELECT id FROM sets WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx)?;
        if set.is_none() {
            return Ok(None);
        }
        let rows = sqlx::query(
            "SELECT sc.qty_per_set, i.quantity \
             FROM set_components sc JOIN items i ON i.id = sc.item_id \
             WHERE sc.set_id = $1",
        )
        .bind(id.get())
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;

        let mut availability: Option<i64> = None;
        for row in rows {
            let qty_per_set: i64 = row.try_get("qty_per_set").map_err(map_sqlx)?;
            let quantity: i64 = row.try_get("quantity").map_err(map_sqlx)?;
            let per_component = quantity / qty_per_set;
            availability = Some(availability.map_or(per_component, |a| a.min(per_component)));
        }
        Ok(Some(availability.unwrap_or(0)))
    }

    /// Open sessions, newest first (the check-in list view).
    pub async fn open_sessions(&self) -> LendingResult<Vec<CheckoutSession>> {
        let rows = sqlx::query(
            "SELECT id, status, owner_user_id, metadata, created_at \
             FROM checkout_sessions WHERE status = 'OPEN' ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx)?;
        rows.iter().map(session_from_row).collect()
    }

    /// Per-item aggregate totals for one session.
    pub async fn session_totals(&self, id: SessionId) -> LendingResult<Vec<ItemTotals>> {
        let rows = sqlx::query(TOTALS_SQL)
            .bind(id.get())
            .fetch_all(&self.pool)
            .await
            .map_err(map_sqlx)?;
        rows.iter().map(totals_from_row).collect()
    }
}

const TOTALS_SQL: &str = "SELECT item_id, \
     CAST(COALESCE(SUM(qty) FILTER (WHERE kind = 'CHECKOUT'), 0) AS BIGINT) AS checked_out, \
     CAST(COALESCE(SUM(qty) FILTER (WHERE kind = 'CHECKIN'), 0) AS BIGINT) AS checked_in \
     FROM stock_transactions WHERE session_id = $1 \
     GROUP BY item_id ORDER BY item_id";

/// One open transaction implementing the engine's storage port.
pub struct PgTx {
    tx: Transaction<'static, Postgres>,
}

impl PgTx {
    async fn commit(self) -> LendingResult<()> {
        self.tx.commit().await.map_err(map_sqlx)
    }

    async fn rollback(self) {
        // Rollback also happens on drop; an explicit error here would mask
        // the engine error the caller is about to surface.
        let _ = self.tx.rollback().await;
    }
}

#[async_trait]
impl LendingTx for PgTx {
    async fn find_item(&mut self, id: ItemId) -> LendingResult<Option<Item>> {
        let row = sqlx::query(
            "SELECT id, name, quantity, restricted FROM items WHERE id = $1 FOR UPDATE",
        )
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        row.map(|r| item_from_row(&r)).transpose()
    }

    async fn find_set(&mut self, id: SetId) -> LendingResult<Option<Set>> {
        let Some(row) = sqlx::query("SELECT id, name, restricted FROM sets WHERE id = $1")
            .bind(id.get())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(map_sqlx)?
        else {
            return Ok(None);
        };

        let component_rows = sqlx::query(
            "SELECT item_id, qty_per_set FROM set_components WHERE set_id = $1 ORDER BY item_id",
        )
        .bind(id.get())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;

        let mut components = Vec::with_capacity(component_rows.len());
        for r in &component_rows {
            components.push(SetComponent {
                item_id: ItemId::new(r.try_get("item_id").map_err(map_sqlx)?),
                qty_per_set: r.try_get("qty_per_set").map_err(map_sqlx)?,
            });
        }

        Ok(Some(Set {
            id: SetId::new(row.try_get("id").map_err(map_sqlx)?),
            name: row.try_get("name").map_err(map_sqlx)?,
            restricted: row.try_get("restricted").map_err(map_sqlx)?,
            components,
        }))
    }

    async fn update_item_quantity(&mut self, id: ItemId, quantity: i64) -> LendingResult<()> {
        sqlx::query("UPDATE items SET quantity = $2 WHERE id = $1")
            .bind(id.get())
            .bind(quantity)
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn insert_transaction(&mut self, new: NewTransaction) -> LendingResult<StockTransaction> {
        let row = sqlx::query(
            "INSERT INTO stock_transactions (item_id, kind, qty, note, session_id) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id, item_id, kind, qty, note, session_id, created_at",
        )
        .bind(new.item_id.get())
        .bind(new.kind.as_str())
        .bind(new.qty)
        .bind(new.note.as_deref())
        .bind(new.session_id.map(SessionId::get))
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        transaction_from_row(&row)
    }

    async fn find_session(&mut self, id: SessionId) -> LendingResult<Option<CheckoutSession>> {
        // FOR UPDATE: concurrent check-ins against the same session must
        // serialize so the closing check never races.
        let row = sqlx::query(
            "SELECT id, status, owner_user_id, metadata, created_at \
             FROM checkout_sessions WHERE id = $1 FOR UPDATE",
        )
        .bind(id.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        row.map(|r| session_from_row(&r)).transpose()
    }

    async fn insert_session(&mut self, new: NewSession) -> LendingResult<CheckoutSession> {
        let metadata = serde_json::to_value(&new.metadata)
            .map_err(|e| LendingError::storage(format!("serialize session metadata: {e}")))?;
        let row = sqlx::query(
            "INSERT INTO checkout_sessions (status, owner_user_id, metadata) \
             VALUES ('OPEN', $1, $2) \
             RETURNING id, status, owner_user_id, metadata, created_at",
        )
        .bind(new.owner_user_id.get())
        .bind(metadata)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        session_from_row(&row)
    }

    async fn close_session(&mut self, id: SessionId) -> LendingResult<()> {
        sqlx::query("UPDATE checkout_sessions SET status = 'CLOSED' WHERE id = $1")
            .bind(id.get())
            .execute(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }

    async fn find_session_checkout(
        &mut self,
        session_id: SessionId,
        id: TransactionId,
    ) -> LendingResult<Option<StockTransaction>> {
        let row = sqlx::query(
            "SELECT id, item_id, kind, qty, note, session_id, created_at \
             FROM stock_transactions \
             WHERE id = $1 AND session_id = $2 AND kind = 'CHECKOUT'",
        )
        .bind(id.get())
        .bind(session_id.get())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(map_sqlx)?;
        row.map(|r| transaction_from_row(&r)).transpose()
    }

    async fn session_item_totals(&mut self, id: SessionId) -> LendingResult<Vec<ItemTotals>> {
        let rows = sqlx::query(TOTALS_SQL)
            .bind(id.get())
            .fetch_all(&mut *self.tx)
            .await
            .map_err(map_sqlx)?;
        rows.iter().map(totals_from_row).collect()
    }
}

fn item_from_row(row: &PgRow) -> LendingResult<Item> {
    Ok(Item {
        id: ItemId::new(row.try_get("id").map_err(map_sqlx)?),
        name: row.try_get("name").map_err(map_sqlx)?,
        quantity: row.try_get("quantity").map_err(map_sqlx)?,
        restricted: row.try_get("restricted").map_err(map_sqlx)?,
    })
}

fn transaction_from_row(row: &PgRow) -> LendingResult<StockTransaction> {
    Ok(StockTransaction {
        id: TransactionId::new(row.try_get("id").map_err(map_sqlx)?),
        item_id: ItemId::new(row.try_get("item_id").map_err(map_sqlx)?),
        kind: kind_from_str(row.try_get("kind").map_err(map_sqlx)?)?,
        qty: row.try_get("qty").map_err(map_sqlx)?,
        note: row.try_get("note").map_err(map_sqlx)?,
        session_id: row
            .try_get::<Option<i64>, _>("session_id")
            .map_err(map_sqlx)?
            .map(SessionId::new),
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(map_sqlx)?,
    })
}

fn session_from_row(row: &PgRow) -> LendingResult<CheckoutSession> {
    let metadata: serde_json::Value = row.try_get("metadata").map_err(map_sqlx)?;
    Ok(CheckoutSession {
        id: SessionId::new(row.try_get("id").map_err(map_sqlx)?),
        status: status_from_str(row.try_get("status").map_err(map_sqlx)?)?,
        owner_user_id: UserId::new(row.try_get("owner_user_id").map_err(map_sqlx)?),
        metadata: serde_json::from_value(metadata)
            .map_err(|e| LendingError::storage(format!("deserialize session metadata: {e}")))?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at").map_err(map_sqlx)?,
    })
}

fn totals_from_row(row: &PgRow) -> LendingResult<ItemTotals> {
    Ok(ItemTotals {
        item_id: ItemId::new(row.try_get("item_id").map_err(map_sqlx)?),
        checked_out: row.try_get("checked_out").map_err(map_sqlx)?,
        checked_in: row.try_get("checked_in").map_err(map_sqlx)?,
    })
}

fn kind_from_str(raw: String) -> LendingResult<TransactionKind> {
    match raw.as_str() {
        "CHECKOUT" => Ok(TransactionKind::Checkout),
        "CHECKIN" => Ok(TransactionKind::Checkin),
        other => Err(LendingError::storage(format!("unknown transaction kind '{other}'"))),
    }
}

fn status_from_str(raw: String) -> LendingResult<SessionStatus> {
    match raw.as_str() {
        "OPEN" => Ok(SessionStatus::Open),
        "CLOSED" => Ok(SessionStatus::Closed),
        other => Err(LendingError::storage(format!("unknown session status '{other}'"))),
    }
}

fn map_sqlx(err: sqlx::Error) -> LendingError {
    if let sqlx::Error::Database(db) = &err {
        if let Some(code) = db.code() {
            // 40001 serialization failure, 40P01 deadlock, 55P03 lock timeout
            if code == "40001" || code == "40P01" || code == "55P03" {
                return LendingError::conflict(db.message().to_string());
            }
        }
    }
    LendingError::storage(err.to_string())
}

fn backoff(attempt: u32) -> Duration {
    Duration::from_millis(25u64 << attempt.min(5))
}
