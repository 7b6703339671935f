//! Routes and the pathfinding seam.
//!
//! The economy never walks the road graph itself when matching requests to
//! supplies. It asks a [`RouteFinder`] for the cheapest route between two
//! flags under a cost cutoff. [`RoadNetwork`] provides a Dijkstra
//! implementation; tests and alternative pathfinders plug in their own.
//!
//! Costs are road step counts. The cutoff is in the same unit, otherwise
//! cutoffs in matching passes would be meaningless.
//!
//! [`RoadNetwork`]: crate::road_network::RoadNetwork

use serde::{Deserialize, Serialize};
use waymark_types::{FlagId, RoadId};

/// An ordered walk over roads from one flag to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Route {
    /// Flags visited, `start` first and `end` last.
    pub flags: Vec<FlagId>,
    /// Roads walked, one fewer than `flags`.
    pub roads: Vec<RoadId>,
    /// Sum of the road costs.
    pub cost: u32,
}

impl Route {
    /// The zero-length route from a flag to itself.
    pub fn trivial(flag: FlagId) -> Self {
        Self {
            flags: vec![flag],
            roads: Vec::new(),
            cost: 0,
        }
    }

    /// First flag of the route.
    pub fn start(&self) -> Option<FlagId> {
        self.flags.first().copied()
    }

    /// Last flag of the route.
    pub fn end(&self) -> Option<FlagId> {
        self.flags.last().copied()
    }

    /// Number of roads walked.
    pub fn len(&self) -> usize {
        self.roads.len()
    }

    /// Whether the route stays at one flag.
    pub fn is_empty(&self) -> bool {
        self.roads.is_empty()
    }
}

/// Whether `cost` is acceptable under `cutoff` (`None` is unbounded).
pub fn within_cutoff(cost: u32, cutoff: Option<u32>) -> bool {
    cutoff.is_none_or(|limit| cost <= limit)
}

/// Something that can compute routes between flags.
pub trait RouteFinder {
    /// Find the cheapest route from `start` to `end`.
    ///
    /// With `wait == false` only routes that are walkable right now qualify:
    /// congested flags along the way block the route. With `wait == true`
    /// the caller accepts waiting for congestion to clear.
    ///
    /// With `cost_cutoff == Some(c)` the search may stop as soon as no route
    /// costing at most `c` can exist, and returns `None` for routes costing
    /// more. `None` searches without bound.
    fn find_route(
        &self,
        start: FlagId,
        end: FlagId,
        wait: bool,
        cost_cutoff: Option<u32>,
    ) -> Option<Route>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trivial_route() {
        let flag = FlagId::new();
        let route = Route::trivial(flag);
        assert!(route.is_empty());
        assert_eq!(route.start(), Some(flag));
        assert_eq!(route.end(), Some(flag));
        assert_eq!(route.cost, 0);
    }

    #[test]
    fn cutoff_semantics() {
        assert!(within_cutoff(10, None));
        assert!(within_cutoff(10, Some(10)));
        assert!(!within_cutoff(11, Some(10)));
    }
}
