//! Flags, roads, and economies: the transport network of the Waymark
//! settlement simulation.
//!
//! A player's road network is a graph of flags joined by roads. Every
//! connected component is an *economy* that owns the bookkeeping for its
//! part of the graph: which buildings want which wares (requests), where
//! wares and workers can be had (supplies), how much is in stock, and how
//! much the player wants in stock (target quantities). A delayed, coalesced
//! balance pass pairs requests with supplies by route cost and priority and
//! turns each matched unit into a transfer for the carrier system.
//!
//! # Modules
//!
//! - [`transport`] -- The [`Transport`] aggregate owning everything below.
//! - [`road_network`], [`flag`], [`road`] -- The graph and Dijkstra routing.
//! - [`route`], [`route_cache`] -- The pathfinding seam and per-economy cache.
//! - [`economy`] -- One connected component's bookkeeping.
//! - [`connectivity`] -- Flag and road changes, merge and split.
//! - [`building`], [`wares_queue`], [`request`], [`supply`] -- Demand and supply.
//! - [`balance`], [`scheduler`], [`transfer`] -- Matching and its outcome.
//! - [`observer`] -- Read-only queries for a computer player.
//! - [`conservation`] -- Stock conservation and partition checks.
//! - [`persistence`] -- Snapshots.
//!
//! # Usage
//!
//! ```
//! use waymark_transport::{BuildingSpec, Transport, TransportConfig, Tribe};
//! use waymark_types::{Coords, PlayerId, WareIndex};
//!
//! let mut transport = Transport::new(PlayerId::new(), Tribe::default(), TransportConfig::default());
//! let home = transport.add_flag(Coords::new(0, 0))?;
//! let field = transport.add_flag(Coords::new(4, 0))?;
//! transport.build_road(home, field, 4, 0)?;
//!
//! let log = WareIndex(0);
//! transport.build_building(home, &BuildingSpec::warehouse_with(&[(log, 3)], &[]), 0)?;
//!
//! let economy = transport.flag_economy(field)?;
//! assert_eq!(transport.stock_ware(economy, log)?, 3);
//! # Ok::<(), waymark_transport::TransportError>(())
//! ```

pub mod balance;
pub mod building;
pub mod config;
pub mod connectivity;
pub mod conservation;
pub mod economy;
pub mod error;
pub mod flag;
pub mod observer;
pub mod persistence;
pub mod request;
pub mod road;
pub mod road_network;
pub mod route;
pub mod route_cache;
pub mod scheduler;
pub mod supply;
pub mod target_quantity;
pub mod transfer;
pub mod transport;
pub mod tribe;
pub mod ware_list;
pub mod wares_queue;

pub use balance::{BalancePlan, PlannedTransfer, RequestCandidate, SupplyCandidate, plan_balance};
pub use building::{
    Building, BuildingRole, BuildingSpec, ConstructionSite, ProductionProgram, ProductionSite,
    ProgramInput, QueueSpec, StockEntry, Warehouse, WorkerSlot,
};
pub use config::TransportConfig;
pub use conservation::{
    ConservationResult, PartitionViolation, StockAnomaly, StockTotals, verify_conservation,
    verify_partition,
};
pub use economy::Economy;
pub use error::TransportError;
pub use flag::{FLAG_CAPACITY, Flag, FlagWare, MAX_FLAG_ROADS};
pub use observer::{EconomyObserver, EconomySummary, WareNecessity};
pub use persistence::{SNAPSHOT_VERSION, TransportSnapshot};
pub use request::Request;
pub use road::Road;
pub use road_network::{Reach, RoadNetwork};
pub use route::{Route, RouteFinder, within_cutoff};
pub use route_cache::{CachedRouteFinder, RouteCache};
pub use scheduler::{BalanceScheduler, ScheduledBalance};
pub use supply::{Supply, SupplyHandle};
pub use target_quantity::TargetQuantities;
pub use transfer::{Destination, Transfer};
pub use transport::Transport;
pub use tribe::{Tribe, WareDescription, WorkerDescription};
pub use ware_list::WareList;
pub use wares_queue::{QueueCleanup, WaresQueue};
