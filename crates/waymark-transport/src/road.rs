//! Roads: weighted edges between two flags.

use serde::{Deserialize, Serialize};
use waymark_types::{FlagId, RoadId};

/// An edge of the road graph.
///
/// Roads are walkable in both directions; `start` and `end` only record
/// the order in which the road was built. `cost` is the number of steps a
/// carrier needs to walk it, the same unit route cutoffs are expressed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Road {
    id: RoadId,
    start: FlagId,
    end: FlagId,
    cost: u32,
}

impl Road {
    pub(crate) const fn new(id: RoadId, start: FlagId, end: FlagId, cost: u32) -> Self {
        Self {
            id,
            start,
            end,
            cost,
        }
    }

    /// The road's identifier.
    pub const fn id(&self) -> RoadId {
        self.id
    }

    /// The flag the road was built from.
    pub const fn start(&self) -> FlagId {
        self.start
    }

    /// The flag the road was built to.
    pub const fn end(&self) -> FlagId {
        self.end
    }

    /// Steps needed to walk the road.
    pub const fn cost(&self) -> u32 {
        self.cost
    }

    /// Given one endpoint, return the other. `None` if `flag` is not an
    /// endpoint of this road.
    pub fn other_end(&self, flag: FlagId) -> Option<FlagId> {
        if flag == self.start {
            Some(self.end)
        } else if flag == self.end {
            Some(self.start)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn other_end_both_directions() {
        let a = FlagId::new();
        let b = FlagId::new();
        let road = Road::new(RoadId::new(), a, b, 4);
        assert_eq!(road.other_end(a), Some(b));
        assert_eq!(road.other_end(b), Some(a));
        assert_eq!(road.other_end(FlagId::new()), None);
    }
}
