//! The fixed role set.

use serde::{Deserialize, Serialize};

/// Role of the calling user.
///
/// Roles come from the external auth collaborator's user table; the engine
/// only distinguishes privileged from non-privileged callers.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    Tech,
    Standard,
    Office,
    Guest,
}

impl Role {
    /// Privileged roles may operate on restricted items and sets.
    pub fn is_privileged(self) -> bool {
        matches!(self, Role::Admin | Role::Tech)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "ADMIN",
            Role::Tech => "TECH",
            Role::Standard => "STANDARD",
            Role::Office => "OFFICE",
            Role::Guest => "GUEST",
        }
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}
