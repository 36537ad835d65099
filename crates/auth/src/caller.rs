//! The resolved caller identity.

use serde::{Deserialize, Serialize};

use gearlog_core::UserId;

use crate::roles::Role;

/// A fully resolved caller for authorization decisions.
///
/// Construction is the external auth collaborator's job (session cookie,
/// token, whatever transport applies); the engine consumes it as a fact.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub user_id: UserId,
    pub role: Role,
}

impl Caller {
    pub fn new(user_id: UserId, role: Role) -> Self {
        Self { user_id, role }
    }
}
