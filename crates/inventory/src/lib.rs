//! `gearlog-inventory` — the relational data model for the equipment pool.
//!
//! Items, composite sets, and the append-only movement log. Pure data types
//! and derived-value rules; mutation lives in the lending engine, persistence
//! in the infra adapters.

pub mod item;
pub mod movement;
pub mod set;

pub use item::Item;
pub use movement::{NewTransaction, StockTransaction, TransactionKind};
pub use set::{Set, SetComponent};
