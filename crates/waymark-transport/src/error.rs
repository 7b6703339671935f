//! Error types for the `waymark-transport` crate.
//!
//! All fallible operations in this crate return [`TransportError`]. These are
//! structural errors: the caller asked for something the network cannot do
//! (a flag that does not exist, a road to a full flag, destroying a building
//! whose queues still hold wares). Matching passes that find nothing and
//! route lookups that exceed their cutoff are not errors and never show up
//! here.

use waymark_types::{
    BuildingId, Coords, EconomyId, FlagId, RequestId, RoadId, SupplyId, TransferId, WareIndex,
    WareKind,
};

/// Errors that can occur during transport-network operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// A flag was not found in the road network.
    #[error("flag not found: {0}")]
    FlagNotFound(FlagId),

    /// A road was not found in the road network.
    #[error("road not found: {0}")]
    RoadNotFound(RoadId),

    /// An economy was not found.
    #[error("economy not found: {0}")]
    EconomyNotFound(EconomyId),

    /// A building was not found.
    #[error("building not found: {0}")]
    BuildingNotFound(BuildingId),

    /// A request was not found on any building.
    #[error("request not found: {0}")]
    RequestNotFound(RequestId),

    /// A supply was not found in the economy.
    #[error("supply not found: {0}")]
    SupplyNotFound(SupplyId),

    /// A transfer was not found among the in-flight transfers.
    #[error("transfer not found: {0}")]
    TransferNotFound(TransferId),

    /// Another flag already occupies the position.
    #[error("position {0} is already occupied by a flag")]
    PositionOccupied(Coords),

    /// The flag already has the maximum number of roads attached.
    #[error("flag {0} has no free road slot")]
    RoadSlotsFull(FlagId),

    /// A road must connect two different flags.
    #[error("road would connect flag {0} to itself")]
    RoadToSelf(FlagId),

    /// A road must take at least one step to traverse.
    #[error("road cost must be at least 1")]
    ZeroCostRoad,

    /// The flag is not a member of the economy it claims to belong to.
    #[error("flag {flag} is not a member of economy {economy}")]
    FlagNotInEconomy {
        /// The flag.
        flag: FlagId,
        /// The economy the flag points at.
        economy: EconomyId,
    },

    /// The flag already carries a building.
    #[error("flag {0} already has a building")]
    FlagHasBuilding(FlagId),

    /// The flag's ware buffer is full.
    #[error("flag {0} cannot hold more wares")]
    FlagBufferFull(FlagId),

    /// The ware or worker index is not part of the tribe description.
    #[error("unknown {kind} type {ware}")]
    UnknownWare {
        /// Ware or worker.
        kind: WareKind,
        /// The unknown index.
        ware: WareIndex,
    },

    /// A stock removal asked for more units than are stored.
    #[error("cannot remove {requested} of {kind} {ware}: only {available} in stock")]
    InsufficientStock {
        /// Ware or worker.
        kind: WareKind,
        /// The ware or worker type.
        ware: WareIndex,
        /// Units asked for.
        requested: u32,
        /// Units actually stored.
        available: u32,
    },

    /// The building is not a warehouse.
    #[error("building {0} is not a warehouse")]
    NotAWarehouse(BuildingId),

    /// The building is not a production site.
    #[error("building {0} is not a production site")]
    NotAProductionSite(BuildingId),

    /// The building is not a construction site.
    #[error("building {0} is not a construction site")]
    NotAConstructionSite(BuildingId),

    /// The construction site still misses materials or its builder.
    #[error("construction site {0} is not complete")]
    ConstructionIncomplete(BuildingId),

    /// The building has no wares queue for the ware type.
    #[error("building {building} has no queue for ware {ware}")]
    NoSuchQueue {
        /// The building.
        building: BuildingId,
        /// The ware type.
        ware: WareIndex,
    },

    /// A wares queue still holds units and cannot be destroyed.
    #[error("queue for ware {ware} in building {building} still holds {filled} units")]
    QueueNotDrained {
        /// The building owning the queue.
        building: BuildingId,
        /// The queue's ware type.
        ware: WareIndex,
        /// Units still in the queue.
        filled: u32,
    },

    /// Arithmetic overflow during a checked operation.
    #[error("arithmetic overflow in transport calculation")]
    ArithmeticOverflow,

    /// A persisted snapshot does not describe a valid network.
    #[error("inconsistent snapshot: {reason}")]
    InconsistentSnapshot {
        /// What is wrong with the snapshot.
        reason: String,
    },

    /// A snapshot could not be encoded or decoded.
    #[error("snapshot serialization failed: {source}")]
    Serialization {
        /// The underlying JSON error.
        #[from]
        source: serde_json::Error,
    },
}
