//! Type-safe identifier wrappers around [`Uuid`].
//!
//! Every object in the transport network has its own ID type so that a
//! flag can never be passed where a road is expected. IDs are UUID v7
//! (time-ordered): `BTreeMap` iteration follows creation order, and
//! tie-breaks by identity are deterministic within a session.
//!
//! IDs display with a short kind prefix (`flag:0191...`) so log lines that
//! mention several objects stay readable.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates newtype wrappers around [`Uuid`], one per `Name => "prefix"`.
macro_rules! define_ids {
    ($(
        $(#[$meta:meta])*
        $name:ident => $prefix:literal;
    )+) => {$(
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Prefix used when the ID is displayed.
            pub const PREFIX: &'static str = $prefix;

            /// A fresh time-ordered identifier.
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// The wrapped [`Uuid`].
            pub const fn uuid(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}:{}", Self::PREFIX, self.0.simple())
            }
        }
    )+};
}

define_ids! {
    /// A player owning one transport network.
    PlayerId => "player";
    /// A flag (node in the road graph).
    FlagId => "flag";
    /// A road (edge in the road graph).
    RoadId => "road";
    /// An economy (connected component of flags).
    EconomyId => "economy";
    /// A building attached to a flag.
    BuildingId => "building";
    /// A request for wares or workers.
    RequestId => "request";
    /// A supply of wares or workers.
    SupplyId => "supply";
    /// A committed transfer from a supply to a request.
    TransferId => "transfer";
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn later_ids_sort_after_earlier_ones() {
        let first = EconomyId::new();
        let second = EconomyId::new();
        assert!(first < second);
    }

    #[test]
    fn serializes_as_bare_uuid() {
        let id = FlagId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{}\"", id.uuid()));
        let back: FlagId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn display_carries_kind_prefix() {
        let id = RequestId::new();
        let shown = id.to_string();
        assert!(shown.starts_with("request:"));
        assert_eq!(shown.len(), "request:".len().saturating_add(32));
    }
}
