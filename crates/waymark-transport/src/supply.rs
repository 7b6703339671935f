//! Supplies: things that can hand out wares or workers.
//!
//! Two kinds exist. Warehouse stock is *inactive*: it can wait in the
//! warehouse until a carrier gets through. A ware lying on a flag is
//! *active*: it blocks the flag buffer and has to move now. The economy
//! registers supplies by id and a [`SupplyHandle`]; [`Supply`] is the
//! resolved, borrowed view a matching pass works with.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use waymark_types::{BuildingId, FlagId, SupplyId, WareIndex, WareKind};

use crate::building::{Building, Warehouse};
use crate::flag::FlagWare;
use crate::request::Request;
use crate::road_network::RoadNetwork;

/// Where a registered supply lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum SupplyHandle {
    /// All stock of a warehouse building.
    Warehouse(BuildingId),
    /// One ware waiting in a flag's buffer.
    Flag(FlagId),
}

/// A supply resolved against the current network and buildings.
#[derive(Debug, Clone, Copy)]
pub enum Supply<'a> {
    /// Warehouse stock (inactive).
    Warehouse {
        /// The supply's id.
        id: SupplyId,
        /// The warehouse building.
        building: BuildingId,
        /// The flag in front of the warehouse.
        flag: FlagId,
        /// The warehouse's stock.
        warehouse: &'a Warehouse,
    },
    /// A ware on a flag (active).
    Flag {
        /// The flag holding the ware.
        flag: FlagId,
        /// The waiting ware.
        ware: &'a FlagWare,
    },
}

impl<'a> Supply<'a> {
    /// Resolve a registered supply. Returns `None` if the building, flag,
    /// or ware it points at is gone.
    pub fn resolve(
        id: SupplyId,
        handle: SupplyHandle,
        network: &'a RoadNetwork,
        buildings: &'a BTreeMap<BuildingId, Building>,
    ) -> Option<Self> {
        match handle {
            SupplyHandle::Warehouse(building_id) => {
                let building = buildings.get(&building_id)?;
                let warehouse = building.warehouse()?;
                (warehouse.supply() == id).then_some(Self::Warehouse {
                    id,
                    building: building_id,
                    flag: building.flag(),
                    warehouse,
                })
            }
            SupplyHandle::Flag(flag_id) => {
                let ware = network.flag(flag_id)?.ware_by_supply(id)?;
                Some(Self::Flag {
                    flag: flag_id,
                    ware,
                })
            }
        }
    }

    /// The supply's id.
    pub const fn id(&self) -> SupplyId {
        match self {
            Self::Warehouse { id, .. } => *id,
            Self::Flag { ware, .. } => ware.supply,
        }
    }

    /// The handle the economy registers this supply under.
    pub const fn handle(&self) -> SupplyHandle {
        match self {
            Self::Warehouse { building, .. } => SupplyHandle::Warehouse(*building),
            Self::Flag { flag, .. } => SupplyHandle::Flag(*flag),
        }
    }

    /// The flag units leave from.
    pub const fn position(&self) -> FlagId {
        match self {
            Self::Warehouse { flag, .. } | Self::Flag { flag, .. } => *flag,
        }
    }

    /// Active supplies must move now; inactive ones can wait.
    pub const fn is_active(&self) -> bool {
        matches!(self, Self::Flag { .. })
    }

    /// Units of a type this supply can give right now.
    pub fn available(&self, kind: WareKind, ware: WareIndex) -> u32 {
        match self {
            Self::Warehouse { warehouse, .. } => match kind {
                WareKind::Ware => warehouse.wares().stock(ware),
                WareKind::Worker => warehouse.workers().stock(ware),
            },
            Self::Flag { ware: waiting, .. } => u32::from(
                kind == WareKind::Ware && waiting.ware == ware && waiting.reserved_by.is_none(),
            ),
        }
    }

    /// Units this supply could give towards `request`. The answer changes
    /// as stock moves, so it is only meaningful at the moment of asking.
    pub fn nr_supplies(&self, request: &Request) -> u32 {
        self.available(request.kind(), request.ware())
    }
}
