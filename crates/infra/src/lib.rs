//! Infrastructure layer: store adapters and configuration.
//!
//! Each adapter owns the atomic-batch scope the engine runs in: it opens a
//! transaction, drives `gearlog_lending::process_batch` /
//! `process_session_checkin` inside it, commits on success, and rolls the
//! whole batch back on any error. Transient conflicts are retried a bounded
//! number of times before being surfaced.

pub mod config;
pub mod store;

#[cfg(test)]
mod integration_tests;

pub use config::{ConfigError, StoreConfig};
pub use store::{InMemoryLendingStore, PostgresLendingStore};
