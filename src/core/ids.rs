//! Strongly-typed integer ids for every registered entity.
//!
//! Ids are allocated by the owning registry on insert. Until then an entity
//! carries [`UNASSIGNED`](AccountId::UNASSIGNED), which is `-1`.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Common behaviour of all entity id newtypes.
pub trait EntityId: Copy + Eq + Ord + std::hash::Hash + fmt::Debug + fmt::Display {
    fn from_raw(raw: i64) -> Self;
    fn raw(self) -> i64;

    fn is_assigned(self) -> bool {
        self.raw() >= 0
    }
}

macro_rules! define_id {
    ($name:ident, $display_prefix:literal) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub const UNASSIGNED: Self = Self(-1);

            pub fn new(raw: i64) -> Self {
                Self(raw)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::UNASSIGNED
            }
        }

        impl EntityId for $name {
            fn from_raw(raw: i64) -> Self {
                Self(raw)
            }

            fn raw(self) -> i64 {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}{}", $display_prefix, self.0)
            }
        }

        impl From<i64> for $name {
            fn from(raw: i64) -> Self {
                Self(raw)
            }
        }
    };
}

define_id!(AccountId, "acct-");
define_id!(PayeeId, "payee-");
define_id!(CategoryId, "cat-");
define_id!(SecurityId, "sec-");
define_id!(CurrencyId, "cur-");
define_id!(AliasId, "alias-");
define_id!(OnlineAccountId, "online-");
define_id!(TransactionId, "txn-");
define_id!(SplitId, "split-");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unassigned_default() {
        let id = AccountId::default();
        assert_eq!(id, AccountId::UNASSIGNED);
        assert!(!id.is_assigned());
        assert!(AccountId::new(0).is_assigned());
    }

    #[test]
    fn test_display_prefix() {
        assert_eq!(TransactionId::new(42).to_string(), "txn-42");
        assert_eq!(CategoryId::new(3).to_string(), "cat-3");
    }

    #[test]
    fn test_serde_transparent() {
        let json = serde_json::to_string(&PayeeId::new(7)).unwrap();
        assert_eq!(json, "7");
        let back: PayeeId = serde_json::from_str("7").unwrap();
        assert_eq!(back, PayeeId::new(7));
    }
}
