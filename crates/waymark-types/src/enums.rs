//! Enumeration types shared across the transport economy.

use serde::{Deserialize, Serialize};

/// Whether a request or supply deals in wares or in workers.
///
/// Wares and workers share the same [`WareIndex`] numbering scheme but live
/// in separate tables of the tribe description, so the kind is always
/// carried alongside the index.
///
/// [`WareIndex`]: crate::WareIndex
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WareKind {
    /// A ware (log, plank, fish, ...).
    Ware,
    /// A worker (carrier, builder, woodcutter, ...).
    Worker,
}

impl core::fmt::Display for WareKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Ware => f.write_str("ware"),
            Self::Worker => f.write_str("worker"),
        }
    }
}

/// Priority class of a request.
///
/// Variants are declared from least to most urgent so that the derived
/// [`Ord`] sorts `High` last; the matching pass iterates in reverse.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum RequestPriority {
    /// Served after everything else.
    Low,
    /// Default priority for wares queues and worker slots.
    #[default]
    Normal,
    /// Served first (construction sites, starving production).
    High,
}

/// Tag naming the role of a building without carrying its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BuildingKind {
    /// Consumes input wares and produces outputs.
    ProductionSite,
    /// Collects building materials until construction completes.
    ConstructionSite,
    /// Stores wares and workers for the whole economy.
    Warehouse,
}
