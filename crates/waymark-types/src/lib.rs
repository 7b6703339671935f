//! Shared type definitions for the Waymark transport economy.
//!
//! This crate is the single source of truth for the identifiers and plain
//! data types passed between the transport crate, the simulation core, and
//! the engine binary.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for flags, roads, economies, etc.
//! - [`enums`] -- Ware kinds, request priorities, building kinds
//! - [`structs`] -- Coordinates, ware indices, target quantities

pub mod enums;
pub mod ids;
pub mod structs;

// Re-export all public types at crate root for convenience.
pub use enums::{BuildingKind, RequestPriority, WareKind};
pub use ids::{
    BuildingId, EconomyId, FlagId, PlayerId, RequestId, RoadId, SupplyId, TransferId,
};
pub use structs::{Coords, TargetQuantity, WareIndex};
