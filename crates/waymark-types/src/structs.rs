//! Plain data structs shared across the transport economy.

use serde::{Deserialize, Serialize};

/// Map coordinates of a flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Coords {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl Coords {
    /// Create coordinates from a column and row.
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

impl core::fmt::Display for Coords {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Index of a ware or worker type in the tribe description.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct WareIndex(pub u16);

impl WareIndex {
    /// Return the index as a `usize` for table lookups.
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl core::fmt::Display for WareIndex {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Configurable target stock level for one ware type in one economy.
///
/// A ware type is *needed* while warehouse stock is below `temporary`.
/// `temporary` may be raised above `permanent` to stockpile ahead of a
/// planned expansion; every unit that leaves warehouse stock lowers it by
/// one again until it is back at `permanent`.
///
/// `last_modified` (game time in milliseconds) decides which setting
/// survives when two economies merge: the more recent one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetQuantity {
    /// Floor set by configuration.
    pub permanent: u32,
    /// Current working target; never below `permanent`.
    pub temporary: u32,
    /// Game time of the last change.
    pub last_modified: u64,
}

impl TargetQuantity {
    /// A target with equal permanent and temporary levels, never modified.
    pub const fn with_default(quantity: u32) -> Self {
        Self {
            permanent: quantity,
            temporary: quantity,
            last_modified: 0,
        }
    }
}
