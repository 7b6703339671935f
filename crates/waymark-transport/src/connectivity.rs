//! Keeping economies equal to the connected components of the road graph.
//!
//! Every flag belongs to exactly one economy and two flags share an
//! economy iff roads connect them. Building a road between two economies
//! merges them; removing a road or flag runs a split check, a flood fill
//! from one endpoint that stops as soon as it reaches the other. The
//! common case (the graph is still connected) ends early and only bumps
//! the rebuild cycle.

use std::collections::BTreeSet;

use tracing::{debug, error, info};
use waymark_types::{Coords, EconomyId, FlagId, RoadId, TransferId};

use crate::building::Building;
use crate::conservation::{ConservationResult, StockTotals, verify_conservation};
use crate::error::TransportError;
use crate::flag::Flag;
use crate::road::Road;
use crate::road_network::Reach;
use crate::supply::SupplyHandle;
use crate::transport::Transport;
use crate::ware_list::WareList;

impl Transport {
    /// Place a new flag. It starts out in a singleton economy seeded with
    /// the tribe's default target quantities.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::PositionOccupied`] if a flag already stands
    /// at the position.
    pub fn add_flag(&mut self, position: Coords) -> Result<FlagId, TransportError> {
        if self.network.flag_at(position).is_some() {
            return Err(TransportError::PositionOccupied(position));
        }
        let id = FlagId::new();
        let economy_id = EconomyId::new();
        self.network.insert_flag(Flag::new(id, position, economy_id))?;

        let mut economy = self.new_economy(economy_id);
        economy.add_flag(id);
        self.economies.insert(economy_id, economy);
        debug!(flag = %id, position = %position, economy = %economy_id, "flag placed");
        Ok(id)
    }

    /// Build a road. Connecting two economies merges them.
    ///
    /// # Errors
    ///
    /// Returns an error if either flag is missing or full, the flags are
    /// identical, or the cost is zero. Nothing changes in that case.
    pub fn build_road(
        &mut self,
        start: FlagId,
        end: FlagId,
        cost: u32,
        now: u64,
    ) -> Result<RoadId, TransportError> {
        self.network.check_road(start, end, cost)?;
        let a = self.flag_economy(start)?;
        let b = self.flag_economy(end)?;

        let id = RoadId::new();
        self.network.insert_road(Road::new(id, start, end, cost))?;
        debug!(road = %id, start = %start, end = %end, cost, "road built");

        if a == b {
            self.require_economy_mut(a)?.bump_rebuild_cycle();
            self.request_balance(a, now)?;
        } else {
            self.merge_economies(a, b, now)?;
        }
        Ok(id)
    }

    /// Fold the smaller economy into the larger. Returns the survivor.
    fn merge_economies(
        &mut self,
        a: EconomyId,
        b: EconomyId,
        now: u64,
    ) -> Result<EconomyId, TransportError> {
        let before = StockTotals::capture(self);
        let size_a = self.require_economy(a)?.flag_count();
        let size_b = self.require_economy(b)?.flag_count();
        let (winner, loser) = if size_a > size_b || (size_a == size_b && a < b) {
            (a, b)
        } else {
            (b, a)
        };

        let absorbed = self
            .economies
            .remove(&loser)
            .ok_or(TransportError::EconomyNotFound(loser))?;
        for &flag in absorbed.flags() {
            self.network.require_flag_mut(flag)?.set_economy(winner);
        }
        let moved = absorbed.flag_count();
        self.require_economy_mut(winner)?.absorb(absorbed)?;
        self.force_balance(winner, now)?;

        info!(winner = %winner, absorbed = %loser, flags_moved = moved, "economies merged");
        self.check_conservation(&before, "merge");
        Ok(winner)
    }

    /// Remove a road. Returns the id of the economy split off, if the
    /// removal disconnected the graph.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::RoadNotFound`] for unknown roads.
    pub fn remove_road(
        &mut self,
        road: RoadId,
        now: u64,
    ) -> Result<Option<EconomyId>, TransportError> {
        let removed = self.network.take_road(road)?;
        debug!(road = %road, start = %removed.start(), end = %removed.end(), "road removed");
        let economy = self.flag_economy(removed.start())?;
        self.split_check(economy, removed.start(), removed.end(), now)
    }

    /// Check whether `a` and `b` are still connected after an edge between
    /// them went away, and split the economy if not.
    fn split_check(
        &mut self,
        economy: EconomyId,
        a: FlagId,
        b: FlagId,
        now: u64,
    ) -> Result<Option<EconomyId>, TransportError> {
        let side_a = match self.network.flood_until(a, b) {
            Reach::Connected => {
                self.require_economy_mut(economy)?.bump_rebuild_cycle();
                self.request_balance(economy, now)?;
                return Ok(None);
            }
            Reach::Component(side_a) => side_a,
        };

        let total = self.require_economy(economy)?.flag_count();
        let moved: BTreeSet<FlagId> = if side_a.len().saturating_mul(2) < total {
            side_a
        } else {
            self.network.component(b)
        };

        let before = StockTotals::capture(self);
        let new_id = EconomyId::new();
        let buildings = &self.buildings;
        let split = self
            .economies
            .get_mut(&economy)
            .ok_or(TransportError::EconomyNotFound(economy))?
            .split_off(
                new_id,
                &moved,
                |building| buildings.get(&building).map(Building::flag),
                |handle| match handle {
                    SupplyHandle::Warehouse(building) => buildings.get(building).map(Building::flag),
                    SupplyHandle::Flag(flag) => Some(*flag),
                },
            );
        self.economies.insert(new_id, split);
        for &flag in &moved {
            self.network.require_flag_mut(flag)?.set_economy(new_id);
        }
        self.recompute_stock(economy)?;
        self.recompute_stock(new_id)?;
        self.force_balance(economy, now)?;
        self.force_balance(new_id, now)?;

        info!(economy = %economy, split_off = %new_id, flags_moved = moved.len(), "economy split");
        self.check_conservation(&before, "split");
        Ok(Some(new_id))
    }

    /// Rebuild an economy's aggregate stock from its warehouses.
    fn recompute_stock(&mut self, economy: EconomyId) -> Result<(), TransportError> {
        let mut wares = WareList::new(waymark_types::WareKind::Ware);
        let mut workers = WareList::new(waymark_types::WareKind::Worker);
        for id in self.require_economy(economy)?.warehouses() {
            if let Some(warehouse) = self.buildings.get(id).and_then(Building::warehouse) {
                wares.add_all(warehouse.wares())?;
                workers.add_all(warehouse.workers())?;
            }
        }
        self.require_economy_mut(economy)?.set_stock(wares, workers);
        Ok(())
    }

    fn check_conservation(&self, before: &StockTotals, operation: &str) {
        let after = StockTotals::capture(self);
        if let ConservationResult::Anomaly(anomalies) = verify_conservation(before, &after) {
            for anomaly in &anomalies {
                error!(
                    operation,
                    kind = %anomaly.kind,
                    ware = %anomaly.ware,
                    before = anomaly.before,
                    after = anomaly.after,
                    "stock not conserved"
                );
            }
        }
    }

    /// Remove a flag together with its building, roads, and waiting wares.
    ///
    /// Wares still in the building's queues and on the flag are lost.
    /// Returns the transfers that lost their destination or source; the
    /// caller aborts them with the carrier.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::FlagNotFound`] for unknown flags.
    pub fn remove_flag(
        &mut self,
        flag: FlagId,
        now: u64,
    ) -> Result<Vec<TransferId>, TransportError> {
        let mut orphaned = Vec::new();
        if let Some(building) = self.network.require_flag(flag)?.building() {
            let (lost, inbound) = self.drain_building(building)?;
            orphaned.extend(inbound);
            orphaned.extend(self.destroy_building(building, now)?);
            if !lost.is_empty() {
                info!(building = %building, lost = lost.total(), "queued wares lost with building");
            }
        }

        let roads: Vec<RoadId> = self.network.require_flag(flag)?.roads().collect();
        for road in roads {
            self.remove_road(road, now)?;
        }

        let f = self.network.require_flag_mut(flag)?;
        let economy_id = f.economy();
        let wares = f.take_all_wares();
        let economy = self.require_economy_mut(economy_id)?;
        for ware in &wares {
            economy.remove_supply(ware.supply);
            orphaned.extend(ware.reserved_by);
        }
        economy.remove_flag(flag);
        let empty = economy.flag_count() == 0;
        self.network.take_flag(flag)?;
        if empty {
            self.economies.remove(&economy_id);
            debug!(economy = %economy_id, "economy dissolved");
        }

        orphaned.sort();
        orphaned.dedup();
        info!(flag = %flag, wares_lost = wares.len(), orphaned = orphaned.len(), "flag removed");
        Ok(orphaned)
    }

    /// Split a road in two by planting a flag on it. The new flag joins
    /// the road's economy; connectivity does not change.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ZeroCostRoad`] unless
    /// `0 < cost_to_start < cost`, and [`TransportError::PositionOccupied`]
    /// if a flag already stands at the position.
    pub fn insert_flag_on_road(
        &mut self,
        road: RoadId,
        position: Coords,
        cost_to_start: u32,
        now: u64,
    ) -> Result<FlagId, TransportError> {
        let old = self
            .network
            .road(road)
            .cloned()
            .ok_or(TransportError::RoadNotFound(road))?;
        let Some(cost_to_end) = old.cost().checked_sub(cost_to_start) else {
            return Err(TransportError::ZeroCostRoad);
        };
        if cost_to_start == 0 || cost_to_end == 0 {
            return Err(TransportError::ZeroCostRoad);
        }
        if self.network.flag_at(position).is_some() {
            return Err(TransportError::PositionOccupied(position));
        }
        let economy = self.flag_economy(old.start())?;

        self.network.take_road(road)?;
        let id = FlagId::new();
        self.network.insert_flag(Flag::new(id, position, economy))?;
        self.network
            .insert_road(Road::new(RoadId::new(), old.start(), id, cost_to_start))?;
        self.network
            .insert_road(Road::new(RoadId::new(), id, old.end(), cost_to_end))?;

        let e = self.require_economy_mut(economy)?;
        e.add_flag(id);
        e.bump_rebuild_cycle();
        self.request_balance(economy, now)?;
        debug!(flag = %id, road = %road, "flag planted on road");
        Ok(id)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use waymark_types::{PlayerId, WareIndex};

    use super::*;
    use crate::building::BuildingSpec;
    use crate::config::TransportConfig;
    use crate::tribe::Tribe;

    const LOG: WareIndex = WareIndex(0);

    fn transport() -> Transport {
        Transport::new(PlayerId::new(), Tribe::default(), TransportConfig::default())
    }

    fn line(t: &mut Transport, n: i32) -> Vec<FlagId> {
        let flags: Vec<FlagId> = (0..n).map(|x| t.add_flag(Coords::new(x, 0)).unwrap()).collect();
        for pair in flags.windows(2) {
            t.build_road(pair[0], pair[1], 2, 0).unwrap();
        }
        flags
    }

    #[test]
    fn new_flag_gets_its_own_economy() {
        let mut t = transport();
        let a = t.add_flag(Coords::new(0, 0)).unwrap();
        let b = t.add_flag(Coords::new(1, 0)).unwrap();
        assert_ne!(t.flag_economy(a).unwrap(), t.flag_economy(b).unwrap());
        assert!(matches!(
            t.add_flag(Coords::new(0, 0)),
            Err(TransportError::PositionOccupied(_))
        ));
    }

    #[test]
    fn road_merges_into_larger_economy() {
        let mut t = transport();
        let big = line(&mut t, 3);
        let lone = t.add_flag(Coords::new(9, 9)).unwrap();
        let survivor = t.flag_economy(big[0]).unwrap();

        t.build_road(big[2], lone, 4, 0).unwrap();
        assert_eq!(t.economy_count(), 1);
        assert_eq!(t.flag_economy(lone).unwrap(), survivor);
        assert_eq!(t.economy(survivor).unwrap().flag_count(), 4);
    }

    #[test]
    fn road_inside_economy_only_bumps_cycle() {
        let mut t = transport();
        let flags = line(&mut t, 3);
        let economy = t.flag_economy(flags[0]).unwrap();
        let cycle = t.economy(economy).unwrap().rebuild_cycle();
        t.build_road(flags[0], flags[2], 9, 0).unwrap();
        assert_eq!(t.economy(economy).unwrap().rebuild_cycle(), cycle + 1);
        assert_eq!(t.economy_count(), 1);
    }

    #[test]
    fn removing_bridge_splits_and_moves_warehouse() {
        let mut t = transport();
        let flags = line(&mut t, 4);
        let spec = BuildingSpec::warehouse_with(&[(LOG, 7)], &[]);
        let wh = t.build_building(flags[3], &spec, 0).unwrap();
        let economy = t.flag_economy(flags[0]).unwrap();
        assert_eq!(t.stock_ware(economy, LOG).unwrap(), 7);

        let bridge = t.network().flag(flags[3]).unwrap().roads().next().unwrap();
        let split = t.remove_road(bridge, 0).unwrap().unwrap();

        assert_eq!(t.flag_economy(flags[3]).unwrap(), split);
        assert_eq!(t.building_economy(wh).unwrap(), split);
        assert_eq!(t.stock_ware(split, LOG).unwrap(), 7);
        assert_eq!(t.stock_ware(economy, LOG).unwrap(), 0);
        assert!(t.economy(split).unwrap().has_warehouse());
        assert!(!t.economy(economy).unwrap().has_warehouse());
    }

    #[test]
    fn removing_cycle_edge_keeps_economy() {
        let mut t = transport();
        let flags = line(&mut t, 3);
        let shortcut = t.build_road(flags[0], flags[2], 1, 0).unwrap();
        assert_eq!(t.remove_road(shortcut, 0).unwrap(), None);
        assert_eq!(t.economy_count(), 1);
    }

    #[test]
    fn removing_flag_dissolves_its_economy() {
        let mut t = transport();
        let flags = line(&mut t, 3);
        t.drop_ware_at_flag(flags[1], LOG, 0).unwrap();
        t.remove_flag(flags[1], 0).unwrap();
        assert!(t.network().flag(flags[1]).is_none());
        assert_eq!(t.economy_count(), 2);
        assert_ne!(t.flag_economy(flags[0]).unwrap(), t.flag_economy(flags[2]).unwrap());
        for economy in t.economies() {
            assert!(economy.supplies().is_empty());
        }
    }

    #[test]
    fn flag_on_road_splits_the_cost() {
        let mut t = transport();
        let flags = line(&mut t, 2);
        let road = t.network().roads().next().unwrap().id();
        assert!(matches!(
            t.insert_flag_on_road(road, Coords::new(5, 5), 2, 0),
            Err(TransportError::ZeroCostRoad)
        ));
        let mid = t.insert_flag_on_road(road, Coords::new(5, 5), 1, 0).unwrap();
        assert_eq!(t.network().road_count(), 2);
        assert_eq!(t.flag_economy(mid).unwrap(), t.flag_economy(flags[0]).unwrap());
        let route = t.network().shortest_route(flags[0], flags[1], true, None).unwrap();
        assert_eq!(route.cost, 2);
        assert_eq!(route.flags.len(), 3);
    }
}
