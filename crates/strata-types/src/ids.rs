use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(uuid::Uuid);

        impl $name {
            /// Generate a new time-ordered identifier (UUID v7).
            pub fn new() -> Self {
                Self(uuid::Uuid::now_v7())
            }

            /// Create from an existing UUID.
            pub const fn from_uuid(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }

            /// Create from a raw 128-bit value. Mostly useful for fixtures.
            pub const fn from_u128(value: u128) -> Self {
                Self(uuid::Uuid::from_u128(value))
            }

            /// The underlying UUID.
            pub fn as_uuid(&self) -> &uuid::Uuid {
                &self.0
            }

            /// Short representation (first 8 characters of the UUID).
            pub fn short_id(&self) -> String {
                self.0.to_string()[..8].to_string()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), self.short_id())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = TypeError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                uuid::Uuid::parse_str(s)
                    .map(Self)
                    .map_err(|e| TypeError::InvalidUuid(format!("{s}: {e}")))
            }
        }

        impl From<uuid::Uuid> for $name {
            fn from(uuid: uuid::Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

uuid_id!(
    /// Identity of an item (record) inside an object graph.
    ///
    /// The only stable cross-store reference type: property values refer to
    /// other items through their `ItemId`.
    ItemId,
    "ItemId"
);

uuid_id!(
    /// Portable identity of a revision. Unlike revision numbers, which are
    /// dense store-local indices, a `RevisionId` is valid across stores.
    RevisionId,
    "RevisionId"
);

uuid_id!(
    /// Identity of a branch within a persistent root.
    BranchId,
    "BranchId"
);

uuid_id!(
    /// Identity of a persistent root, the unit of storage for one evolving
    /// object graph.
    PersistentRootId,
    "PersistentRootId"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_unique() {
        let a = ItemId::new();
        let b = ItemId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn v7_ids_are_time_ordered() {
        let first = RevisionId::new();
        let second = RevisionId::new();
        assert!(first < second);
    }

    #[test]
    fn parse_roundtrip() {
        let id = BranchId::new();
        let parsed: BranchId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn parse_rejects_garbage() {
        let err = "not-a-uuid".parse::<PersistentRootId>().unwrap_err();
        assert!(matches!(err, TypeError::InvalidUuid(_)));
    }

    #[test]
    fn short_id_is_eight_chars() {
        let id = ItemId::from_u128(0x1234_5678_9abc_def0_1234_5678_9abc_def0);
        assert_eq!(id.short_id(), "12345678");
        assert_eq!(format!("{id:?}"), "ItemId(12345678)");
    }

    #[test]
    fn serde_roundtrip_json() {
        let id = ItemId::new();
        let json = serde_json::to_string(&id).unwrap();
        let parsed: ItemId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, parsed);
    }
}
