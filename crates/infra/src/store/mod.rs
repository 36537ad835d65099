//! Store adapters implementing the engine's storage port.

pub mod in_memory;
pub mod postgres;

pub use in_memory::InMemoryLendingStore;
pub use postgres::PostgresLendingStore;
