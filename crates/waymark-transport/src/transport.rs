//! The transport aggregate of one player.
//!
//! [`Transport`] owns the road network, every economy, every building, and
//! every in-flight transfer of a player. All mutation goes through it so
//! that the cross-references (flag to economy, request to building, supply
//! to flag or warehouse) stay consistent. Graph changes live in
//! `connectivity`, matching in `balance`, carrier callbacks in `transfer`.

use std::collections::BTreeMap;

use tracing::{debug, info};
use waymark_types::{
    BuildingId, EconomyId, FlagId, PlayerId, RequestPriority, SupplyId, TargetQuantity,
    TransferId, WareIndex, WareKind,
};

use crate::building::{Building, BuildingSpec, Warehouse};
use crate::config::TransportConfig;
use crate::economy::Economy;
use crate::error::TransportError;
use crate::road_network::RoadNetwork;
use crate::scheduler::BalanceScheduler;
use crate::supply::SupplyHandle;
use crate::target_quantity::TargetQuantities;
use crate::transfer::{Destination, Transfer};
use crate::tribe::Tribe;
use crate::ware_list::WareList;
use crate::wares_queue::WaresQueue;

/// All flags, roads, economies, buildings, and transfers of one player.
#[derive(Debug, Clone)]
pub struct Transport {
    pub(crate) owner: PlayerId,
    pub(crate) tribe: Tribe,
    pub(crate) config: TransportConfig,
    pub(crate) network: RoadNetwork,
    pub(crate) economies: BTreeMap<EconomyId, Economy>,
    pub(crate) buildings: BTreeMap<BuildingId, Building>,
    pub(crate) transfers: BTreeMap<TransferId, Transfer>,
    pub(crate) scheduler: BalanceScheduler,
}

impl Transport {
    /// Create an empty transport network for a player.
    pub fn new(owner: PlayerId, tribe: Tribe, config: TransportConfig) -> Self {
        Self {
            owner,
            tribe,
            config,
            network: RoadNetwork::new(),
            economies: BTreeMap::new(),
            buildings: BTreeMap::new(),
            transfers: BTreeMap::new(),
            scheduler: BalanceScheduler::new(),
        }
    }

    // -------------------------------------------------------------------
    // Accessors
    // -------------------------------------------------------------------

    /// The owning player.
    pub const fn owner(&self) -> PlayerId {
        self.owner
    }

    /// The tribe description in use.
    pub const fn tribe(&self) -> &Tribe {
        &self.tribe
    }

    /// Transport tunables.
    pub const fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// The road graph.
    pub const fn network(&self) -> &RoadNetwork {
        &self.network
    }

    /// Look up an economy.
    pub fn economy(&self, id: EconomyId) -> Option<&Economy> {
        self.economies.get(&id)
    }

    /// Iterate over all economies in id order.
    pub fn economies(&self) -> impl Iterator<Item = &Economy> {
        self.economies.values()
    }

    /// Number of economies.
    pub fn economy_count(&self) -> usize {
        self.economies.len()
    }

    /// Look up a building.
    pub fn building(&self, id: BuildingId) -> Option<&Building> {
        self.buildings.get(&id)
    }

    /// Iterate over all buildings in id order.
    pub fn buildings(&self) -> impl Iterator<Item = &Building> {
        self.buildings.values()
    }

    /// Look up an in-flight transfer.
    pub fn transfer(&self, id: TransferId) -> Option<&Transfer> {
        self.transfers.get(&id)
    }

    /// Iterate over in-flight transfers.
    pub fn transfers(&self) -> impl Iterator<Item = &Transfer> {
        self.transfers.values()
    }

    /// The balance scheduler.
    pub const fn scheduler(&self) -> &BalanceScheduler {
        &self.scheduler
    }

    /// The economy a flag belongs to.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::FlagNotFound`] for unknown flags.
    pub fn flag_economy(&self, flag: FlagId) -> Result<EconomyId, TransportError> {
        Ok(self.network.require_flag(flag)?.economy())
    }

    /// The economy a building belongs to (that of its flag).
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::BuildingNotFound`] for unknown buildings.
    pub fn building_economy(&self, building: BuildingId) -> Result<EconomyId, TransportError> {
        let flag = self.require_building(building)?.flag();
        self.flag_economy(flag)
    }

    pub(crate) fn require_economy(&self, id: EconomyId) -> Result<&Economy, TransportError> {
        self.economies.get(&id).ok_or(TransportError::EconomyNotFound(id))
    }

    pub(crate) fn require_economy_mut(
        &mut self,
        id: EconomyId,
    ) -> Result<&mut Economy, TransportError> {
        self.economies
            .get_mut(&id)
            .ok_or(TransportError::EconomyNotFound(id))
    }

    pub(crate) fn require_building(&self, id: BuildingId) -> Result<&Building, TransportError> {
        self.buildings
            .get(&id)
            .ok_or(TransportError::BuildingNotFound(id))
    }

    /// A fresh economy with the tribe's default target quantities.
    pub(crate) fn new_economy(&self, id: EconomyId) -> Economy {
        Economy::new(id, self.owner, TargetQuantities::from_tribe(&self.tribe))
    }

    /// A building and its economy, borrowed together.
    pub(crate) fn building_and_economy(
        &mut self,
        id: BuildingId,
    ) -> Result<(&mut Building, &mut Economy), TransportError> {
        let economy_id = self.building_economy(id)?;
        let building = self
            .buildings
            .get_mut(&id)
            .ok_or(TransportError::BuildingNotFound(id))?;
        let economy = self
            .economies
            .get_mut(&economy_id)
            .ok_or(TransportError::EconomyNotFound(economy_id))?;
        Ok((building, economy))
    }

    /// A warehouse and its economy, borrowed together.
    pub(crate) fn warehouse_and_economy(
        &mut self,
        id: BuildingId,
    ) -> Result<(&mut Warehouse, &mut Economy), TransportError> {
        let (building, economy) = self.building_and_economy(id)?;
        let warehouse = building
            .warehouse_mut()
            .ok_or(TransportError::NotAWarehouse(id))?;
        Ok((warehouse, economy))
    }

    fn check_index(&self, kind: WareKind, ware: WareIndex) -> Result<(), TransportError> {
        if self.tribe.contains(kind, ware) {
            Ok(())
        } else {
            Err(TransportError::UnknownWare { kind, ware })
        }
    }

    // -------------------------------------------------------------------
    // Buildings
    // -------------------------------------------------------------------

    /// Place a building at a flag and register its requests, stock, and
    /// supply with the flag's economy.
    ///
    /// # Errors
    ///
    /// Returns an error if the spec names unknown types, the flag does not
    /// exist, or the flag already has a building.
    pub fn build_building(
        &mut self,
        flag: FlagId,
        spec: &BuildingSpec,
        now: u64,
    ) -> Result<BuildingId, TransportError> {
        spec.validate(&self.tribe)?;
        let f = self.network.require_flag(flag)?;
        if f.building().is_some() {
            return Err(TransportError::FlagHasBuilding(flag));
        }
        let economy_id = f.economy();

        let id = BuildingId::new();
        let mut building = Building::new(id, flag, spec)?;
        building.attach(self.require_economy_mut(economy_id)?)?;
        self.network.require_flag_mut(flag)?.set_building(Some(id));
        self.buildings.insert(id, building);

        info!(building = %id, flag = %flag, kind = ?spec.kind(), economy = %economy_id, "building placed");
        self.request_balance(economy_id, now)?;
        Ok(id)
    }

    /// Remove a building. Every input queue must be empty.
    ///
    /// Requests are withdrawn and a warehouse's stock leaves the economy.
    /// Returns the transfers that were heading for the building; the
    /// caller aborts them with the carrier and reports them through
    /// [`Transport::fail_transfer`].
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::QueueNotDrained`] if a queue still holds
    /// units; nothing changes in that case.
    pub fn destroy_building(
        &mut self,
        id: BuildingId,
        now: u64,
    ) -> Result<Vec<TransferId>, TransportError> {
        let economy_id = self.building_economy(id)?;
        let (building, economy) = self.building_and_economy(id)?;
        let mut orphaned = building.detach(economy)?;
        let flag = building.flag();

        orphaned.extend(
            self.transfers
                .values()
                .filter(|t| t.destination == Destination::Warehouse(id))
                .map(|t| t.id),
        );
        orphaned.sort();
        orphaned.dedup();

        self.buildings.remove(&id);
        self.network.require_flag_mut(flag)?.set_building(None);
        info!(building = %id, flag = %flag, orphaned = orphaned.len(), "building destroyed");
        self.request_balance(economy_id, now)?;
        Ok(orphaned)
    }

    /// Empty every input queue of a building and close it.
    ///
    /// Each queue's size drops to zero and its request is withdrawn, so
    /// the building, which still stands, asks for nothing until a queue
    /// is reopened with [`Transport::set_queue_size`]. Returns the drained
    /// stock and the orphaned transfers.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::BuildingNotFound`] for unknown buildings.
    pub fn drain_building(
        &mut self,
        id: BuildingId,
    ) -> Result<(WareList, Vec<TransferId>), TransportError> {
        let (building, economy) = self.building_and_economy(id)?;
        building.drain_queues(Some(economy))
    }

    /// Turn a fully supplied construction site into its target building.
    ///
    /// The materials are used up and the builder is released. Returns the
    /// new building's id and the orphaned transfers.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NotAConstructionSite`] or
    /// [`TransportError::ConstructionIncomplete`] when the building cannot
    /// be completed.
    pub fn complete_construction(
        &mut self,
        id: BuildingId,
        now: u64,
    ) -> Result<(BuildingId, Vec<TransferId>), TransportError> {
        let building = self.require_building(id)?;
        let site = building
            .construction_site()
            .ok_or(TransportError::NotAConstructionSite(id))?;
        if !site.is_complete() {
            return Err(TransportError::ConstructionIncomplete(id));
        }
        let target = site.target().clone();
        let flag = building.flag();

        let (_, mut orphaned) = self.drain_building(id)?;
        orphaned.extend(self.destroy_building(id, now)?);
        let new_id = self.build_building(flag, &target, now)?;
        info!(site = %id, building = %new_id, "construction complete");
        Ok((new_id, orphaned))
    }

    // -------------------------------------------------------------------
    // Stock entry points
    // -------------------------------------------------------------------

    /// Wares entered a warehouse (production, delivery from outside).
    ///
    /// # Errors
    ///
    /// Returns an error for unknown buildings, non-warehouses, or unknown
    /// ware types.
    pub fn add_wares(
        &mut self,
        warehouse: BuildingId,
        ware: WareIndex,
        count: u32,
        now: u64,
    ) -> Result<(), TransportError> {
        self.add_stock(warehouse, WareKind::Ware, ware, count, now)
    }

    /// Wares left a warehouse for consumption. The temporary target
    /// quantity decays by one per unit.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InsufficientStock`] if the warehouse holds
    /// fewer units; nothing changes in that case.
    pub fn remove_wares(
        &mut self,
        warehouse: BuildingId,
        ware: WareIndex,
        count: u32,
    ) -> Result<(), TransportError> {
        self.remove_stock(warehouse, WareKind::Ware, ware, count)
    }

    /// Workers entered a warehouse.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown buildings, non-warehouses, or unknown
    /// worker types.
    pub fn add_workers(
        &mut self,
        warehouse: BuildingId,
        worker: WareIndex,
        count: u32,
        now: u64,
    ) -> Result<(), TransportError> {
        self.add_stock(warehouse, WareKind::Worker, worker, count, now)
    }

    /// Workers left a warehouse.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InsufficientStock`] if the warehouse holds
    /// fewer units.
    pub fn remove_workers(
        &mut self,
        warehouse: BuildingId,
        worker: WareIndex,
        count: u32,
    ) -> Result<(), TransportError> {
        self.remove_stock(warehouse, WareKind::Worker, worker, count)
    }

    fn add_stock(
        &mut self,
        warehouse: BuildingId,
        kind: WareKind,
        ware: WareIndex,
        count: u32,
        now: u64,
    ) -> Result<(), TransportError> {
        self.check_index(kind, ware)?;
        let (w, economy) = self.warehouse_and_economy(warehouse)?;
        // Economy stock is never below warehouse stock, so it overflows first.
        match kind {
            WareKind::Ware => economy.add_wares(ware, count)?,
            WareKind::Worker => economy.add_workers(ware, count)?,
        }
        w.stock_mut(kind).add(ware, count)?;
        let economy_id = economy.id();
        self.request_balance(economy_id, now)
    }

    fn remove_stock(
        &mut self,
        warehouse: BuildingId,
        kind: WareKind,
        ware: WareIndex,
        count: u32,
    ) -> Result<(), TransportError> {
        self.check_index(kind, ware)?;
        let (w, economy) = self.warehouse_and_economy(warehouse)?;
        w.stock_mut(kind).remove(ware, count)?;
        match kind {
            WareKind::Ware => economy.remove_wares(ware, count),
            WareKind::Worker => economy.remove_workers(ware, count),
        }
    }

    /// Put a ware down at a flag, where it waits as an active supply.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::FlagBufferFull`] if the flag is congested.
    pub fn drop_ware_at_flag(
        &mut self,
        flag: FlagId,
        ware: WareIndex,
        now: u64,
    ) -> Result<SupplyId, TransportError> {
        self.check_index(WareKind::Ware, ware)?;
        let supply = SupplyId::new();
        let f = self.network.require_flag_mut(flag)?;
        f.push_ware(ware, supply)?;
        let economy_id = f.economy();
        self.require_economy_mut(economy_id)?
            .add_supply(supply, SupplyHandle::Flag(flag));
        debug!(flag = %flag, ware = %ware, supply = %supply, "ware dropped at flag");
        self.request_balance(economy_id, now)?;
        Ok(supply)
    }

    // -------------------------------------------------------------------
    // Target quantities
    // -------------------------------------------------------------------

    /// Set a ware's target quantity in one economy.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown economies or ware types.
    pub fn set_target_quantity(
        &mut self,
        economy: EconomyId,
        ware: WareIndex,
        permanent: u32,
        temporary: u32,
        now: u64,
    ) -> Result<(), TransportError> {
        self.require_economy_mut(economy)?
            .targets_mut()
            .set(ware, permanent, temporary, now)
    }

    /// Reset a ware's target quantity to the tribe default.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown economies or ware types.
    pub fn reset_target_quantity(
        &mut self,
        economy: EconomyId,
        ware: WareIndex,
        now: u64,
    ) -> Result<(), TransportError> {
        let tribe = &self.tribe;
        self.economies
            .get_mut(&economy)
            .ok_or(TransportError::EconomyNotFound(economy))?
            .targets_mut()
            .reset(ware, tribe, now)
    }

    /// Target quantity of a ware in an economy.
    ///
    /// # Errors
    ///
    /// Returns an error for unknown economies or ware types.
    pub fn target_quantity(
        &self,
        economy: EconomyId,
        ware: WareIndex,
    ) -> Result<TargetQuantity, TransportError> {
        self.require_economy(economy)?
            .target_quantity(ware)
            .copied()
            .ok_or(TransportError::UnknownWare {
                kind: WareKind::Ware,
                ware,
            })
    }

    /// Warehouse stock of a ware in an economy.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::EconomyNotFound`] for unknown economies.
    pub fn stock_ware(&self, economy: EconomyId, ware: WareIndex) -> Result<u32, TransportError> {
        Ok(self.require_economy(economy)?.stock_ware(ware))
    }

    /// Warehouse stock of a worker type in an economy.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::EconomyNotFound`] for unknown economies.
    pub fn stock_worker(&self, economy: EconomyId, worker: WareIndex) -> Result<u32, TransportError> {
        Ok(self.require_economy(economy)?.stock_worker(worker))
    }

    /// Whether an economy's stock of a ware is below its target.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::EconomyNotFound`] for unknown economies.
    pub fn needs_ware(&self, economy: EconomyId, ware: WareIndex) -> Result<bool, TransportError> {
        Ok(self.require_economy(economy)?.needs_ware(ware))
    }

    // -------------------------------------------------------------------
    // Wares queues
    // -------------------------------------------------------------------

    /// Apply `change` to one queue of a building, then reconcile its
    /// request and schedule a balance pass.
    fn with_queue<R>(
        &mut self,
        building: BuildingId,
        ware: WareIndex,
        now: u64,
        change: impl FnOnce(&mut WaresQueue) -> Result<R, TransportError>,
    ) -> Result<(R, Vec<TransferId>), TransportError> {
        let (b, economy) = self.building_and_economy(building)?;
        let economy_id = economy.id();
        let queue = b.queue_mut(ware)?;
        let result = change(queue)?;
        let orphaned = queue.update(Some(economy));
        self.request_balance(economy_id, now)?;
        Ok((result, orphaned))
    }

    /// Change a queue's capacity. Returns orphaned transfers.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NoSuchQueue`] if the building has no queue
    /// for the ware.
    pub fn set_queue_size(
        &mut self,
        building: BuildingId,
        ware: WareIndex,
        size: u32,
        now: u64,
    ) -> Result<Vec<TransferId>, TransportError> {
        self.with_queue(building, ware, now, |q| {
            q.set_size(size);
            Ok(())
        })
        .map(|((), orphaned)| orphaned)
    }

    /// Change a queue's request priority.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NoSuchQueue`] if the building has no queue
    /// for the ware.
    pub fn set_queue_priority(
        &mut self,
        building: BuildingId,
        ware: WareIndex,
        priority: RequestPriority,
        now: u64,
    ) -> Result<(), TransportError> {
        self.with_queue(building, ware, now, |q| {
            q.set_priority(priority);
            Ok(())
        })
        .map(|_| ())
    }

    /// Change a queue's consumption interval hint.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::NoSuchQueue`] if the building has no queue
    /// for the ware.
    pub fn set_queue_consume_interval(
        &mut self,
        building: BuildingId,
        ware: WareIndex,
        ms: u64,
    ) -> Result<(), TransportError> {
        let (b, _) = self.building_and_economy(building)?;
        b.queue_mut(ware)?.set_consume_interval(ms);
        Ok(())
    }

    /// Use up units from a queue; the freed space is requested again.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InsufficientStock`] if the queue holds
    /// fewer units.
    pub fn consume_from_queue(
        &mut self,
        building: BuildingId,
        ware: WareIndex,
        count: u32,
        now: u64,
    ) -> Result<(), TransportError> {
        self.with_queue(building, ware, now, |q| q.consume(count))
            .map(|_| ())
    }

    // -------------------------------------------------------------------
    // Balance scheduling
    // -------------------------------------------------------------------

    /// Ask for a balance pass of an economy after the configured delay.
    /// Joins an already scheduled pass if there is one.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::EconomyNotFound`] for unknown economies.
    pub fn request_balance(&mut self, economy: EconomyId, now: u64) -> Result<(), TransportError> {
        if self.require_economy(economy)?.pending_balance().is_some() {
            return Ok(());
        }
        self.schedule_balance(economy, now)
    }

    /// Schedule a pass under a fresh token, invalidating any command
    /// scheduled earlier. Used when the economy's identity changed.
    pub(crate) fn force_balance(&mut self, economy: EconomyId, now: u64) -> Result<(), TransportError> {
        self.schedule_balance(economy, now)
    }

    fn schedule_balance(&mut self, economy: EconomyId, now: u64) -> Result<(), TransportError> {
        let due = now.saturating_add(self.config.balance_delay_ms);
        let e = self
            .economies
            .get_mut(&economy)
            .ok_or(TransportError::EconomyNotFound(economy))?;
        let Some(flag) = e.any_flag() else {
            return Ok(());
        };
        let token = self.scheduler.issue_token();
        e.set_pending_balance(Some(token));
        self.scheduler.schedule(due, flag, token);
        Ok(())
    }

    /// Run every balance command due at `now`. Commands whose flag is gone
    /// or whose token no longer matches the flag's current economy are
    /// dropped. Returns all transfers created.
    ///
    /// # Errors
    ///
    /// Propagates structural errors from the matching passes.
    pub fn run_due_balances(&mut self, now: u64) -> Result<Vec<Transfer>, TransportError> {
        let mut created = Vec::new();
        while let Some(cmd) = self.scheduler.pop_due(now) {
            let Some(economy_id) = self.network.flag(cmd.flag).map(crate::flag::Flag::economy)
            else {
                debug!(flag = %cmd.flag, token = cmd.token, "balance command for removed flag dropped");
                continue;
            };
            let Some(economy) = self.economies.get_mut(&economy_id) else {
                continue;
            };
            if economy.pending_balance() != Some(cmd.token) {
                debug!(economy = %economy_id, token = cmd.token, "stale balance command dropped");
                continue;
            }
            economy.set_pending_balance(None);
            created.extend(self.balance_economy(economy_id, now)?);
        }
        Ok(created)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use waymark_types::Coords;

    use super::*;

    const LOG: WareIndex = WareIndex(0);

    fn transport() -> Transport {
        Transport::new(PlayerId::new(), Tribe::default(), TransportConfig::default())
    }

    #[test]
    fn building_registers_with_flag_economy() {
        let mut t = transport();
        let flag = t.add_flag(Coords::new(0, 0)).unwrap();
        let spec = BuildingSpec::warehouse_with(&[(LOG, 3)], &[]);
        let wh = t.build_building(flag, &spec, 0).unwrap();
        let economy = t.flag_economy(flag).unwrap();
        assert_eq!(t.stock_ware(economy, LOG).unwrap(), 3);
        assert!(matches!(
            t.build_building(flag, &spec, 0),
            Err(TransportError::FlagHasBuilding(_))
        ));
        assert_eq!(t.building_economy(wh).unwrap(), economy);
    }

    #[test]
    fn warehouse_stock_entry_points_stay_in_sync() {
        let mut t = transport();
        let flag = t.add_flag(Coords::new(0, 0)).unwrap();
        let wh = t
            .build_building(flag, &BuildingSpec::warehouse_with(&[], &[]), 0)
            .unwrap();
        let economy = t.flag_economy(flag).unwrap();
        t.set_target_quantity(economy, LOG, 1, 4, 10).unwrap();

        t.add_wares(wh, LOG, 5, 0).unwrap();
        t.remove_wares(wh, LOG, 2).unwrap();
        assert_eq!(t.stock_ware(economy, LOG).unwrap(), 3);
        let warehouse_stock = t.building(wh).unwrap().warehouse().unwrap().wares().stock(LOG);
        assert_eq!(warehouse_stock, 3);
        assert_eq!(t.target_quantity(economy, LOG).unwrap().temporary, 2);

        assert!(matches!(
            t.remove_wares(wh, LOG, 10),
            Err(TransportError::InsufficientStock { .. })
        ));
        assert_eq!(t.stock_ware(economy, LOG).unwrap(), 3);
    }

    #[test]
    fn drained_building_stands_with_closed_queues() {
        let mut t = transport();
        let home = t.add_flag(Coords::new(0, 0)).unwrap();
        let mill_flag = t.add_flag(Coords::new(2, 0)).unwrap();
        t.build_road(home, mill_flag, 2, 0).unwrap();
        t.build_building(home, &BuildingSpec::warehouse_with(&[(LOG, 2)], &[]), 0)
            .unwrap();
        let spec = BuildingSpec::ProductionSite {
            worker: WareIndex(2),
            inputs: vec![crate::QueueSpec {
                ware: LOG,
                size: 3,
                priority: RequestPriority::Normal,
                consume_interval_ms: 0,
            }],
            program: crate::ProductionProgram {
                inputs: Vec::new(),
                output: None,
                duration_ms: 1000,
            },
        };
        let mill = t.build_building(mill_flag, &spec, 0).unwrap();
        let economy = t.flag_economy(home).unwrap();
        for transfer in t.balance_economy(economy, 0).unwrap() {
            t.finish_transfer(transfer.id, 10).unwrap();
        }
        assert_eq!(t.building(mill).unwrap().queue(LOG).unwrap().filled(), 2);

        let (drained, orphaned) = t.drain_building(mill).unwrap();
        assert_eq!(drained.stock(LOG), 2);
        assert!(orphaned.is_empty());
        let queue = t.building(mill).unwrap().queue(LOG).unwrap();
        assert_eq!(queue.size(), 0);
        assert!(queue.request().is_none());

        t.set_queue_size(mill, LOG, 3, 20).unwrap();
        let queue = t.building(mill).unwrap().queue(LOG).unwrap();
        assert_eq!(queue.request().map(crate::Request::open_count), Some(3));
    }

    #[test]
    fn stock_entry_points_reject_non_warehouse() {
        let mut t = transport();
        let flag = t.add_flag(Coords::new(0, 0)).unwrap();
        let spec = BuildingSpec::ConstructionSite {
            builder: WareIndex(1),
            inputs: Vec::new(),
            target: Box::new(BuildingSpec::warehouse_with(&[], &[])),
        };
        let site = t.build_building(flag, &spec, 0).unwrap();
        assert!(matches!(
            t.add_wares(site, LOG, 1, 0),
            Err(TransportError::NotAWarehouse(_))
        ));
    }

    #[test]
    fn balance_requests_coalesce() {
        let mut t = transport();
        let flag = t.add_flag(Coords::new(0, 0)).unwrap();
        let economy = t.flag_economy(flag).unwrap();
        let before = t.scheduler().len();
        t.request_balance(economy, 0).unwrap();
        t.request_balance(economy, 50).unwrap();
        t.request_balance(economy, 100).unwrap();
        assert_eq!(t.scheduler().len(), before + 1);
        assert_eq!(t.scheduler().next_due(), Some(200));
    }

    #[test]
    fn reset_target_restores_tribe_default() {
        let mut t = transport();
        let flag = t.add_flag(Coords::new(0, 0)).unwrap();
        let economy = t.flag_economy(flag).unwrap();
        t.set_target_quantity(economy, LOG, 3, 3, 5).unwrap();
        t.reset_target_quantity(economy, LOG, 9).unwrap();
        let target = t.target_quantity(economy, LOG).unwrap();
        assert_eq!((target.permanent, target.last_modified), (20, 9));
    }

    #[test]
    fn drop_ware_registers_flag_supply() {
        let mut t = transport();
        let flag = t.add_flag(Coords::new(0, 0)).unwrap();
        let supply = t.drop_ware_at_flag(flag, LOG, 0).unwrap();
        let economy = t.economy(t.flag_economy(flag).unwrap()).unwrap();
        assert_eq!(
            economy.supplies().get(&supply),
            Some(&SupplyHandle::Flag(flag))
        );
    }
}
