//! `gearlog-auth` — pure authorization boundary.
//!
//! This crate is intentionally decoupled from HTTP, cookies, and storage:
//! the external auth collaborator resolves a session into a [`Caller`], and
//! the engine only reads the role for the restricted-entity policy and the
//! user id to stamp session ownership.

pub mod authorize;
pub mod caller;
pub mod roles;

pub use authorize::authorize_restricted;
pub use caller::Caller;
pub use roles::Role;
