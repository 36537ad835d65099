//! Strongly-typed identifiers used across the domain.
//!
//! All identifiers are relational surrogate keys (`BIGSERIAL` in the schema),
//! wrapped in newtypes so that an item id can never be passed where a session
//! id is expected. `LineId` is the one deliberately untyped reference: a batch
//! line id resolves against sets first, then items (see the expander).

use serde::{Deserialize, Serialize};

/// Identifier of an inventory item.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(i64);

/// Identifier of a composite set.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SetId(i64);

/// Identifier of a recorded stock transaction.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionId(i64);

/// Identifier of a checkout session (production loan).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(i64);

/// Identifier of a user (actor identity, owned by the auth collaborator).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(i64);

/// Identifier of a requested batch line, before resolution.
///
/// May name a set or an item; the expander decides which.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(i64);

macro_rules! impl_i64_newtype {
    ($t:ty) => {
        impl $t {
            pub const fn new(value: i64) -> Self {
                Self(value)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                core::fmt::Display::fmt(&self.0, f)
            }
        }

        impl From<i64> for $t {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl From<$t> for i64 {
            fn from(value: $t) -> Self {
                value.0
            }
        }
    };
}

impl_i64_newtype!(ItemId);
impl_i64_newtype!(SetId);
impl_i64_newtype!(TransactionId);
impl_i64_newtype!(SessionId);
impl_i64_newtype!(UserId);
impl_i64_newtype!(LineId);

impl LineId {
    /// View this line id as an item reference.
    pub const fn as_item_id(self) -> ItemId {
        ItemId::new(self.0)
    }

    /// View this line id as a set reference.
    pub const fn as_set_id(self) -> SetId {
        SetId::new(self.0)
    }
}
