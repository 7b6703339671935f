//! Flags: the nodes of the road graph.
//!
//! A flag is where roads end and where wares wait for the next carrier. It
//! has six road slots, a small ware buffer, at most one attached building,
//! and always points at exactly one economy.

use serde::{Deserialize, Serialize};
use waymark_types::{BuildingId, Coords, EconomyId, FlagId, RoadId, SupplyId, TransferId, WareIndex};

use crate::error::TransportError;

/// Maximum number of roads that can end at one flag.
pub const MAX_FLAG_ROADS: usize = 6;

/// Number of wares a flag can hold at once.
pub const FLAG_CAPACITY: usize = 8;

/// A ware waiting at a flag.
///
/// Every waiting ware is an active supply; `reserved_by` is set once a
/// transfer has been committed for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagWare {
    /// The ware type.
    pub ware: WareIndex,
    /// The supply registered for this ware.
    pub supply: SupplyId,
    /// The transfer that will carry it away, if any.
    pub reserved_by: Option<TransferId>,
}

/// A node of the road graph.
#[derive(Debug, Clone)]
pub struct Flag {
    id: FlagId,
    position: Coords,
    roads: [Option<RoadId>; MAX_FLAG_ROADS],
    economy: EconomyId,
    building: Option<BuildingId>,
    wares: Vec<FlagWare>,
}

impl Flag {
    /// Create an unconnected flag belonging to `economy`.
    pub(crate) const fn new(id: FlagId, position: Coords, economy: EconomyId) -> Self {
        Self {
            id,
            position,
            roads: [None; MAX_FLAG_ROADS],
            economy,
            building: None,
            wares: Vec::new(),
        }
    }

    /// The flag's identifier.
    pub const fn id(&self) -> FlagId {
        self.id
    }

    /// The flag's map position.
    pub const fn position(&self) -> Coords {
        self.position
    }

    /// The economy this flag belongs to.
    pub const fn economy(&self) -> EconomyId {
        self.economy
    }

    pub(crate) const fn set_economy(&mut self, economy: EconomyId) {
        self.economy = economy;
    }

    /// The building attached to this flag, if any.
    pub const fn building(&self) -> Option<BuildingId> {
        self.building
    }

    pub(crate) const fn set_building(&mut self, building: Option<BuildingId>) {
        self.building = building;
    }

    /// Roads ending at this flag.
    pub fn roads(&self) -> impl Iterator<Item = RoadId> + '_ {
        self.roads.iter().flatten().copied()
    }

    /// Number of roads ending at this flag.
    pub fn road_count(&self) -> usize {
        self.roads.iter().flatten().count()
    }

    /// Whether another road can be attached.
    pub fn has_free_slot(&self) -> bool {
        self.roads.iter().any(Option::is_none)
    }

    /// Attach a road to the first free slot.
    pub(crate) fn attach_road(&mut self, road: RoadId) -> Result<(), TransportError> {
        let slot = self
            .roads
            .iter_mut()
            .find(|s| s.is_none())
            .ok_or(TransportError::RoadSlotsFull(self.id))?;
        *slot = Some(road);
        Ok(())
    }

    /// Detach a road. Returns `false` if it was not attached.
    pub(crate) fn detach_road(&mut self, road: RoadId) -> bool {
        match self.roads.iter_mut().find(|s| **s == Some(road)) {
            Some(slot) => {
                *slot = None;
                true
            }
            None => false,
        }
    }

    /// Wares waiting at this flag.
    pub fn wares(&self) -> &[FlagWare] {
        &self.wares
    }

    /// A flag with a full buffer cannot accept wares passing through.
    pub fn is_congested(&self) -> bool {
        self.wares.len() >= FLAG_CAPACITY
    }

    /// Find the waiting ware registered under a supply.
    pub fn ware_by_supply(&self, supply: SupplyId) -> Option<&FlagWare> {
        self.wares.iter().find(|w| w.supply == supply)
    }

    pub(crate) fn ware_by_supply_mut(&mut self, supply: SupplyId) -> Option<&mut FlagWare> {
        self.wares.iter_mut().find(|w| w.supply == supply)
    }

    /// Put a ware down at this flag.
    pub(crate) fn push_ware(
        &mut self,
        ware: WareIndex,
        supply: SupplyId,
    ) -> Result<(), TransportError> {
        if self.is_congested() {
            return Err(TransportError::FlagBufferFull(self.id));
        }
        self.wares.push(FlagWare {
            ware,
            supply,
            reserved_by: None,
        });
        Ok(())
    }

    /// Pick up the ware registered under a supply.
    pub(crate) fn take_ware(&mut self, supply: SupplyId) -> Option<FlagWare> {
        let pos = self.wares.iter().position(|w| w.supply == supply)?;
        Some(self.wares.remove(pos))
    }

    /// Remove every waiting ware (flag teardown).
    pub(crate) fn take_all_wares(&mut self) -> Vec<FlagWare> {
        std::mem::take(&mut self.wares)
    }
}
