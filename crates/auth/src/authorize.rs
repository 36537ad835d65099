//! Restricted-entity access policy.

use gearlog_core::{LendingError, LendingResult};

use crate::caller::Caller;

/// Check that the caller may touch a restricted item or set.
///
/// - No IO
/// - No panics
/// - Pure policy check, run per resolved line before any mutation
pub fn authorize_restricted(caller: &Caller, entity: &str) -> LendingResult<()> {
    if caller.role.is_privileged() {
        Ok(())
    } else {
        Err(LendingError::AccessDenied {
            entity: entity.to_string(),
        })
    }
}
