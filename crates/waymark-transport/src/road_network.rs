//! The road graph of one player: flags, roads, and graph algorithms.
//!
//! Provides:
//! - Flag and road storage in `BTreeMap` arenas (deterministic iteration)
//! - Slot-checked road insertion and removal
//! - Reachability flood fill for the economy split check
//! - Dijkstra shortest-route search with a cost cutoff and congestion rule

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use waymark_types::{Coords, FlagId, RoadId};

use crate::error::TransportError;
use crate::flag::Flag;
use crate::road::Road;
use crate::route::{Route, RouteFinder};

/// Outcome of a flood fill that stops early when it finds its goal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reach {
    /// The goal was reached from the start.
    Connected,
    /// The goal was not reached; holds every flag reachable from the start.
    Component(BTreeSet<FlagId>),
}

/// Flags and roads of one player.
#[derive(Debug, Clone, Default)]
pub struct RoadNetwork {
    flags: BTreeMap<FlagId, Flag>,
    roads: BTreeMap<RoadId, Road>,
    positions: BTreeMap<Coords, FlagId>,
}

impl RoadNetwork {
    /// Create an empty network.
    pub const fn new() -> Self {
        Self {
            flags: BTreeMap::new(),
            roads: BTreeMap::new(),
            positions: BTreeMap::new(),
        }
    }

    // -------------------------------------------------------------------
    // Flags
    // -------------------------------------------------------------------

    /// Add a flag.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::PositionOccupied`] if another flag already
    /// stands at the flag's position.
    pub(crate) fn insert_flag(&mut self, flag: Flag) -> Result<(), TransportError> {
        let position = flag.position();
        if self.positions.contains_key(&position) {
            return Err(TransportError::PositionOccupied(position));
        }
        self.positions.insert(position, flag.id());
        self.flags.insert(flag.id(), flag);
        Ok(())
    }

    /// Remove a flag. Its roads must have been removed first.
    pub(crate) fn take_flag(&mut self, id: FlagId) -> Result<Flag, TransportError> {
        let flag = self.flags.remove(&id).ok_or(TransportError::FlagNotFound(id))?;
        self.positions.remove(&flag.position());
        Ok(flag)
    }

    /// Look up a flag.
    pub fn flag(&self, id: FlagId) -> Option<&Flag> {
        self.flags.get(&id)
    }

    pub(crate) fn flag_mut(&mut self, id: FlagId) -> Option<&mut Flag> {
        self.flags.get_mut(&id)
    }

    /// Look up a flag, failing with [`TransportError::FlagNotFound`].
    pub fn require_flag(&self, id: FlagId) -> Result<&Flag, TransportError> {
        self.flag(id).ok_or(TransportError::FlagNotFound(id))
    }

    pub(crate) fn require_flag_mut(&mut self, id: FlagId) -> Result<&mut Flag, TransportError> {
        self.flag_mut(id).ok_or(TransportError::FlagNotFound(id))
    }

    /// The flag standing at a position, if any.
    pub fn flag_at(&self, position: Coords) -> Option<FlagId> {
        self.positions.get(&position).copied()
    }

    /// Iterate over all flags in id order.
    pub fn flags(&self) -> impl Iterator<Item = &Flag> {
        self.flags.values()
    }

    /// Number of flags.
    pub fn flag_count(&self) -> usize {
        self.flags.len()
    }

    // -------------------------------------------------------------------
    // Roads
    // -------------------------------------------------------------------

    /// Check that a road between `start` and `end` could be built.
    ///
    /// # Errors
    ///
    /// Returns an error if the flags are identical or missing, the cost is
    /// zero, or either flag has no free road slot.
    pub fn check_road(&self, start: FlagId, end: FlagId, cost: u32) -> Result<(), TransportError> {
        if start == end {
            return Err(TransportError::RoadToSelf(start));
        }
        if cost == 0 {
            return Err(TransportError::ZeroCostRoad);
        }
        for id in [start, end] {
            if !self.require_flag(id)?.has_free_slot() {
                return Err(TransportError::RoadSlotsFull(id));
            }
        }
        Ok(())
    }

    /// Add a road between two flags and attach it to both.
    ///
    /// # Errors
    ///
    /// See [`RoadNetwork::check_road`]. Nothing is changed on error.
    pub(crate) fn insert_road(&mut self, road: Road) -> Result<(), TransportError> {
        self.check_road(road.start(), road.end(), road.cost())?;
        self.require_flag_mut(road.start())?.attach_road(road.id())?;
        self.require_flag_mut(road.end())?.attach_road(road.id())?;
        self.roads.insert(road.id(), road);
        Ok(())
    }

    /// Remove a road and detach it from both endpoints.
    pub(crate) fn take_road(&mut self, id: RoadId) -> Result<Road, TransportError> {
        let road = self.roads.remove(&id).ok_or(TransportError::RoadNotFound(id))?;
        for flag in [road.start(), road.end()] {
            if let Some(f) = self.flags.get_mut(&flag) {
                f.detach_road(id);
            }
        }
        Ok(road)
    }

    /// Look up a road.
    pub fn road(&self, id: RoadId) -> Option<&Road> {
        self.roads.get(&id)
    }

    /// Iterate over all roads in id order.
    pub fn roads(&self) -> impl Iterator<Item = &Road> {
        self.roads.values()
    }

    /// Number of roads.
    pub fn road_count(&self) -> usize {
        self.roads.len()
    }

    /// Return `(neighbor, road, cost)` for every road ending at `flag`.
    pub fn neighbors(&self, flag: FlagId) -> Vec<(FlagId, RoadId, u32)> {
        let Some(f) = self.flags.get(&flag) else {
            return Vec::new();
        };
        f.roads()
            .filter_map(|road_id| {
                let road = self.roads.get(&road_id)?;
                let other = road.other_end(flag)?;
                Some((other, road_id, road.cost()))
            })
            .collect()
    }

    // -------------------------------------------------------------------
    // Graph algorithms
    // -------------------------------------------------------------------

    /// Breadth-first flood fill from `start` over roads, stopping as soon
    /// as `goal` is reached.
    pub fn flood_until(&self, start: FlagId, goal: FlagId) -> Reach {
        self.flood(start, Some(goal))
    }

    /// Every flag reachable from `start`, including `start` itself.
    pub fn component(&self, start: FlagId) -> BTreeSet<FlagId> {
        match self.flood(start, None) {
            Reach::Component(set) => set,
            Reach::Connected => BTreeSet::from([start]),
        }
    }

    fn flood(&self, start: FlagId, goal: Option<FlagId>) -> Reach {
        let mut visited = BTreeSet::new();
        let mut queue = VecDeque::new();
        visited.insert(start);
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            if goal == Some(current) {
                return Reach::Connected;
            }
            for (neighbor, _, _) in self.neighbors(current) {
                if visited.insert(neighbor) {
                    queue.push_back(neighbor);
                }
            }
        }
        Reach::Component(visited)
    }

    /// Dijkstra's shortest route from `start` to `end`.
    ///
    /// Costs are road step counts. Frontier entries costing more than
    /// `cost_cutoff` are never expanded. With `wait == false`, congested
    /// flags other than `start` are impassable.
    pub fn shortest_route(
        &self,
        start: FlagId,
        end: FlagId,
        wait: bool,
        cost_cutoff: Option<u32>,
    ) -> Option<Route> {
        if !self.flags.contains_key(&start) || !self.flags.contains_key(&end) {
            return None;
        }
        if start == end {
            return Some(Route::trivial(start));
        }

        let mut dist: BTreeMap<FlagId, u32> = BTreeMap::new();
        let mut prev: BTreeMap<FlagId, (FlagId, RoadId)> = BTreeMap::new();
        // BTreeSet ordered by (distance, flag) doubles as the priority queue.
        let mut queue: BTreeSet<(u32, FlagId)> = BTreeSet::new();

        dist.insert(start, 0);
        queue.insert((0, start));

        while let Some((current_dist, current)) = queue.pop_first() {
            if current == end {
                break;
            }

            for (neighbor, road_id, cost) in self.neighbors(current) {
                let Some(new_dist) = current_dist.checked_add(cost) else {
                    continue;
                };
                if cost_cutoff.is_some_and(|limit| new_dist > limit) {
                    continue;
                }
                if !wait && self.flags.get(&neighbor).is_some_and(Flag::is_congested) {
                    continue;
                }

                let is_shorter = dist
                    .get(&neighbor)
                    .is_none_or(|&existing| new_dist < existing);

                if is_shorter {
                    if let Some(&old_dist) = dist.get(&neighbor) {
                        queue.remove(&(old_dist, neighbor));
                    }
                    dist.insert(neighbor, new_dist);
                    prev.insert(neighbor, (current, road_id));
                    queue.insert((new_dist, neighbor));
                }
            }
        }

        let cost = *dist.get(&end)?;

        let mut flags = VecDeque::new();
        let mut roads = VecDeque::new();
        let mut current = end;
        flags.push_front(current);
        while let Some(&(predecessor, road)) = prev.get(&current) {
            flags.push_front(predecessor);
            roads.push_front(road);
            current = predecessor;
            if current == start {
                break;
            }
        }

        Some(Route {
            flags: flags.into_iter().collect(),
            roads: roads.into_iter().collect(),
            cost,
        })
    }
}

impl RouteFinder for RoadNetwork {
    fn find_route(
        &self,
        start: FlagId,
        end: FlagId,
        wait: bool,
        cost_cutoff: Option<u32>,
    ) -> Option<Route> {
        self.shortest_route(start, end, wait, cost_cutoff)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use waymark_types::{EconomyId, SupplyId, WareIndex};

    use super::*;
    use crate::flag::FLAG_CAPACITY;

    fn add_flag(net: &mut RoadNetwork, x: i32) -> FlagId {
        let id = FlagId::new();
        net.insert_flag(Flag::new(id, Coords::new(x, 0), EconomyId::new()))
            .unwrap();
        id
    }

    fn add_road(net: &mut RoadNetwork, a: FlagId, b: FlagId, cost: u32) -> RoadId {
        let id = RoadId::new();
        net.insert_road(Road::new(id, a, b, cost)).unwrap();
        id
    }

    /// a -> c direct costs 10; a -> b -> c costs 3 + 5.
    fn triangle() -> (RoadNetwork, FlagId, FlagId, FlagId) {
        let mut net = RoadNetwork::new();
        let a = add_flag(&mut net, 0);
        let b = add_flag(&mut net, 1);
        let c = add_flag(&mut net, 2);
        add_road(&mut net, a, b, 3);
        add_road(&mut net, b, c, 5);
        add_road(&mut net, a, c, 10);
        (net, a, b, c)
    }

    #[test]
    fn position_collision_rejected() {
        let mut net = RoadNetwork::new();
        add_flag(&mut net, 0);
        let dup = Flag::new(FlagId::new(), Coords::new(0, 0), EconomyId::new());
        assert!(matches!(
            net.insert_flag(dup),
            Err(TransportError::PositionOccupied(_))
        ));
    }

    #[test]
    fn road_validation() {
        let mut net = RoadNetwork::new();
        let a = add_flag(&mut net, 0);
        let b = add_flag(&mut net, 1);
        assert!(matches!(
            net.check_road(a, a, 1),
            Err(TransportError::RoadToSelf(_))
        ));
        assert!(matches!(
            net.check_road(a, b, 0),
            Err(TransportError::ZeroCostRoad)
        ));
        assert!(matches!(
            net.check_road(a, FlagId::new(), 1),
            Err(TransportError::FlagNotFound(_))
        ));
    }

    #[test]
    fn full_flag_rejects_road_without_side_effects() {
        let mut net = RoadNetwork::new();
        let hub = add_flag(&mut net, 0);
        for x in 1..=6 {
            let leaf = add_flag(&mut net, x);
            add_road(&mut net, hub, leaf, 1);
        }
        let extra = add_flag(&mut net, 99);
        let err = net.insert_road(Road::new(RoadId::new(), extra, hub, 1));
        assert!(matches!(err, Err(TransportError::RoadSlotsFull(f)) if f == hub));
        assert_eq!(net.flag(extra).unwrap().road_count(), 0);
        assert_eq!(net.road_count(), 6);
    }

    #[test]
    fn shortest_route_prefers_cheaper_detour() {
        let (net, a, b, c) = triangle();
        let route = net.shortest_route(a, c, true, None).unwrap();
        assert_eq!(route.flags, vec![a, b, c]);
        assert_eq!(route.roads.len(), 2);
        assert_eq!(route.cost, 8);
    }

    #[test]
    fn shortest_route_same_flag() {
        let (net, a, _, _) = triangle();
        assert_eq!(net.shortest_route(a, a, true, None), Some(Route::trivial(a)));
    }

    #[test]
    fn cutoff_prunes_expensive_routes() {
        let (net, a, _, c) = triangle();
        assert!(net.shortest_route(a, c, true, Some(7)).is_none());
        assert_eq!(net.shortest_route(a, c, true, Some(8)).unwrap().cost, 8);
    }

    #[test]
    fn congested_flag_blocks_only_without_wait() {
        let (mut net, a, b, c) = triangle();
        let flag_b = net.flag_mut(b).unwrap();
        for _ in 0..FLAG_CAPACITY {
            flag_b.push_ware(WareIndex(0), SupplyId::new()).unwrap();
        }
        let immediate = net.shortest_route(a, c, false, None).unwrap();
        assert_eq!(immediate.cost, 10);
        let waiting = net.shortest_route(a, c, true, None).unwrap();
        assert_eq!(waiting.cost, 8);
    }

    #[test]
    fn flood_fill_short_circuits_or_returns_component() {
        let (mut net, a, b, c) = triangle();
        assert_eq!(net.flood_until(a, c), Reach::Connected);

        let lonely = add_flag(&mut net, 50);
        match net.flood_until(a, lonely) {
            Reach::Component(set) => {
                assert_eq!(set, BTreeSet::from([a, b, c]));
            }
            Reach::Connected => panic!("isolated flag must not be reachable"),
        }
        assert_eq!(net.component(lonely), BTreeSet::from([lonely]));
        assert_eq!(net.component(b).len(), 3);
    }

    #[test]
    fn take_road_detaches_endpoints() {
        let mut net = RoadNetwork::new();
        let a = add_flag(&mut net, 0);
        let b = add_flag(&mut net, 1);
        let road = add_road(&mut net, a, b, 2);
        net.take_road(road).unwrap();
        assert_eq!(net.flag(a).unwrap().road_count(), 0);
        assert!(net.shortest_route(a, b, true, None).is_none());
        assert!(matches!(
            net.take_road(road),
            Err(TransportError::RoadNotFound(_))
        ));
    }
}
