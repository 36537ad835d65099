//! `gearlog-lending` — the stock-transaction engine.
//!
//! Atomically moves quantity between available and checked-out state,
//! expands composite sets into component items, accumulates partial returns
//! against an open checkout session, and decides when a session closes.
//!
//! The engine is a set of async functions generic over the [`LendingTx`]
//! storage port; a store adapter (see `gearlog-infra`) opens one atomic
//! scope per batch, runs the engine inside it, and commits only on success.
//! Any error rolls the whole batch back; partial application is never
//! observable.

pub mod engine;
pub mod expand;
pub mod ledger;
pub mod request;
pub mod session;
pub mod store;

pub use engine::{process_batch, process_session_checkin};
pub use request::{
    BatchLine, BatchOutcome, BatchRequest, LineResult, SessionCheckinLine, SessionCheckinRequest,
    SessionSummary,
};
pub use session::{
    CheckoutSession, ItemTotals, NewSession, ProductionMetadata, SessionStatus, session_complete,
};
pub use store::LendingTx;
