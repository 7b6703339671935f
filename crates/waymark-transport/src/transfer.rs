//! Transfers: committed supply-to-destination moves of single units.
//!
//! A matching pass turns each matched unit into a [`Transfer`] and hands it
//! to the carrier system. The carrier reports back through
//! [`Transport::finish_transfer`] or [`Transport::fail_transfer`]; until
//! then the transfer stays registered with the [`Transport`].

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use waymark_types::{
    BuildingId, EconomyId, FlagId, RequestId, SupplyId, TransferId, WareIndex, WareKind,
};

use crate::building::Building;
use crate::error::TransportError;
use crate::flag::Flag;
use crate::route::Route;
use crate::supply::SupplyHandle;
use crate::transport::Transport;

/// Where a transferred unit ends up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Destination {
    /// Fulfils a request of a building.
    Request {
        /// The request served.
        request: RequestId,
        /// The building owning the request.
        building: BuildingId,
    },
    /// A ware nobody asked for, carried off a flag into a warehouse.
    Warehouse(BuildingId),
}

impl Destination {
    /// The receiving building.
    pub const fn building(&self) -> BuildingId {
        match self {
            Self::Request { building, .. } | Self::Warehouse(building) => *building,
        }
    }
}

/// One unit on its way from a supply to a destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// The transfer's identifier.
    pub id: TransferId,
    /// Where the unit goes.
    pub destination: Destination,
    /// The supply the unit came from.
    pub supply: SupplyId,
    /// Where that supply lives.
    pub source: SupplyHandle,
    /// Ware or worker.
    pub kind: WareKind,
    /// Type of the unit.
    pub ware: WareIndex,
    /// The route chosen when the transfer was committed.
    pub route: Route,
    /// Game time of the commit.
    pub created_at: u64,
}

impl Transport {
    /// The carrier delivered a transfer's unit.
    ///
    /// A ware goes into the destination's queue (or warehouse stock), a
    /// worker takes its slot. Units that find no room are dropped at the
    /// destination's flag (wares) or stored in a warehouse of the economy
    /// (workers). Returns transfers orphaned because the delivery filled a
    /// queue and withdrew its request.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::TransferNotFound`] for unknown transfers.
    pub fn finish_transfer(
        &mut self,
        id: TransferId,
        now: u64,
    ) -> Result<Vec<TransferId>, TransportError> {
        let transfer = self
            .transfers
            .remove(&id)
            .ok_or(TransportError::TransferNotFound(id))?;

        // A flag ware physically leaves its flag only now.
        if let SupplyHandle::Flag(flag) = transfer.source {
            if let Some(f) = self.network.flag_mut(flag) {
                f.take_ware(transfer.supply);
                let economy = f.economy();
                if let Some(e) = self.economies.get_mut(&economy) {
                    e.remove_supply(transfer.supply);
                }
            }
        }

        let destination = transfer.destination.building();
        let Some(flag) = self.buildings.get(&destination).map(Building::flag)
        else {
            warn!(transfer = %id, building = %destination, "destination vanished, unit lost");
            return Ok(Vec::new());
        };
        let economy = self.flag_economy(flag)?;

        let mut orphaned = Vec::new();
        let stored = match transfer.destination {
            Destination::Request { .. } => {
                let (building, economy_ref) = self.building_and_economy(destination)?;
                match transfer.kind {
                    WareKind::Ware => {
                        let queue = building.queue_mut(transfer.ware)?;
                        let stored = queue.deliver(id);
                        orphaned.extend(queue.update(Some(economy_ref)));
                        stored
                    }
                    WareKind::Worker => {
                        let stored = building
                            .worker_slot_mut()
                            .is_some_and(|slot| slot.deliver(id));
                        orphaned.extend(building.update_requests(Some(economy_ref)));
                        stored
                    }
                }
            }
            Destination::Warehouse(warehouse) => {
                self.store_in_warehouse(warehouse, transfer.kind, transfer.ware)?;
                true
            }
        };

        if !stored {
            self.rehome_unit(flag, economy, transfer.kind, transfer.ware, now)?;
        }
        debug!(transfer = %id, ware = %transfer.ware, kind = %transfer.kind, "transfer finished");
        self.request_balance(economy, now)?;
        Ok(orphaned)
    }

    /// The carrier gave up on a transfer (or it was orphaned and aborted).
    ///
    /// The transfer is detached from its request and the unit goes back to
    /// where it came from: warehouse stock is restored without touching
    /// target quantities, a flag ware becomes free again. A balance pass is
    /// requested so the demand is retried.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::TransferNotFound`] for unknown transfers.
    pub fn fail_transfer(&mut self, id: TransferId, now: u64) -> Result<(), TransportError> {
        let transfer = self
            .transfers
            .remove(&id)
            .ok_or(TransportError::TransferNotFound(id))?;

        let mut to_balance: Vec<EconomyId> = Vec::new();

        if let Destination::Request { request, building } = transfer.destination {
            if let Some(b) = self.buildings.get_mut(&building) {
                if let Some(r) = b.request_mut(request) {
                    r.remove_transfer(id);
                }
                let flag = b.flag();
                to_balance.extend(self.network.flag(flag).map(Flag::economy));
            }
        }

        match transfer.source {
            SupplyHandle::Warehouse(warehouse) => {
                if self.buildings.contains_key(&warehouse) {
                    let (w, economy) = self.warehouse_and_economy(warehouse)?;
                    w.stock_mut(transfer.kind).add(transfer.ware, 1)?;
                    match transfer.kind {
                        WareKind::Ware => economy.add_wares(transfer.ware, 1)?,
                        WareKind::Worker => economy.add_workers(transfer.ware, 1)?,
                    }
                    to_balance.push(economy.id());
                } else {
                    warn!(transfer = %id, warehouse = %warehouse, "origin warehouse vanished, unit lost");
                }
            }
            SupplyHandle::Flag(flag) => {
                if let Some(f) = self.network.flag_mut(flag) {
                    if let Some(ware) = f.ware_by_supply_mut(transfer.supply) {
                        ware.reserved_by = None;
                    }
                    to_balance.push(f.economy());
                }
            }
        }

        debug!(transfer = %id, ware = %transfer.ware, kind = %transfer.kind, "transfer failed, unit returned");
        to_balance.sort();
        to_balance.dedup();
        for economy in to_balance {
            if self.economies.contains_key(&economy) {
                self.request_balance(economy, now)?;
            }
        }
        Ok(())
    }

    /// Put a delivered unit into warehouse stock.
    fn store_in_warehouse(
        &mut self,
        warehouse: BuildingId,
        kind: WareKind,
        ware: WareIndex,
    ) -> Result<(), TransportError> {
        let (w, economy) = self.warehouse_and_economy(warehouse)?;
        match kind {
            WareKind::Ware => economy.add_wares(ware, 1)?,
            WareKind::Worker => economy.add_workers(ware, 1)?,
        }
        w.stock_mut(kind).add(ware, 1)
    }

    /// Find a place for a unit its destination could not take.
    fn rehome_unit(
        &mut self,
        flag: FlagId,
        economy: EconomyId,
        kind: WareKind,
        ware: WareIndex,
        now: u64,
    ) -> Result<(), TransportError> {
        match kind {
            WareKind::Ware => {
                if self.drop_ware_at_flag(flag, ware, now).is_err() {
                    warn!(flag = %flag, ware = %ware, "flag full, surplus ware lost");
                }
            }
            WareKind::Worker => {
                let home = self
                    .economies
                    .get(&economy)
                    .and_then(|e| e.warehouses().first().copied());
                match home {
                    Some(warehouse) => self.store_in_warehouse(warehouse, kind, ware)?,
                    None => warn!(economy = %economy, worker = %ware, "no warehouse for surplus worker"),
                }
            }
        }
        Ok(())
    }
}
