//! Read-only economy queries for a computer player.
//!
//! The building AI decides what to build from stock levels and from which
//! outputs its economies still need. Economies without a warehouse have no
//! stock to report and are skipped by every query here.

use waymark_types::{EconomyId, FlagId, WareIndex};

use crate::economy::Economy;
use crate::transport::Transport;

/// Summary of one economy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EconomySummary {
    /// The economy.
    pub economy: EconomyId,
    /// Its member flags in id order.
    pub flags: Vec<FlagId>,
    /// Whether it has at least one warehouse.
    pub has_warehouse: bool,
}

/// How much a building's outputs are wanted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WareNecessity {
    /// Some economy with a warehouse needs at least one output.
    pub needed: bool,
    /// Highest preciousness among the outputs.
    pub max_preciousness: u32,
    /// Highest preciousness among the needed outputs.
    pub max_needed_preciousness: u32,
}

/// Borrowed view over a player's economies.
#[derive(Debug, Clone, Copy)]
pub struct EconomyObserver<'a> {
    transport: &'a Transport,
}

impl<'a> EconomyObserver<'a> {
    /// Observe a transport network.
    pub const fn new(transport: &'a Transport) -> Self {
        Self { transport }
    }

    fn stocked(&self) -> impl Iterator<Item = &'a Economy> + 'a {
        let transport = self.transport;
        transport.economies().filter(|e| e.has_warehouse())
    }

    /// One summary per economy, in id order.
    pub fn economies(&self) -> Vec<EconomySummary> {
        self.transport
            .economies()
            .map(|e| EconomySummary {
                economy: e.id(),
                flags: e.flags().iter().copied().collect(),
                has_warehouse: e.has_warehouse(),
            })
            .collect()
    }

    /// Economies that cannot store anything.
    pub fn economies_without_warehouse(&self) -> Vec<EconomyId> {
        self.transport
            .economies()
            .filter(|e| !e.has_warehouse())
            .map(Economy::id)
            .collect()
    }

    /// Total stock of one ware over all economies with a warehouse.
    pub fn stocklevel_by_hint(&self, ware: WareIndex) -> u32 {
        self.stocked()
            .map(|e| e.stock_ware(ware))
            .fold(0, u32::saturating_add)
    }

    /// Lowest stock of any output in any economy with a warehouse;
    /// `u32::MAX` when there are no outputs or no such economy.
    pub fn stocklevel(&self, outputs: &[WareIndex]) -> u32 {
        self.stocked()
            .flat_map(|e| outputs.iter().map(|&ware| e.stock_ware(ware)))
            .min()
            .unwrap_or(u32::MAX)
    }

    /// Whether any output is needed, and how precious the outputs are.
    pub fn check_ware_necessity(&self, outputs: &[WareIndex]) -> WareNecessity {
        let tribe = self.transport.tribe();
        let mut result = WareNecessity::default();
        for economy in self.stocked() {
            for &ware in outputs {
                let preciousness = tribe.ware(ware).map_or(0, |w| w.preciousness);
                if economy.needs_ware(ware) {
                    result.needed = true;
                    result.max_needed_preciousness =
                        result.max_needed_preciousness.max(preciousness);
                }
                result.max_preciousness = result.max_preciousness.max(preciousness);
            }
        }
        result
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use waymark_types::{Coords, PlayerId};

    use super::*;
    use crate::building::BuildingSpec;
    use crate::config::TransportConfig;
    use crate::tribe::Tribe;

    const LOG: WareIndex = WareIndex(0);
    const PLANKS: WareIndex = WareIndex(1);

    fn setup() -> (Transport, EconomyId) {
        let mut t = Transport::new(PlayerId::new(), Tribe::default(), TransportConfig::default());
        let a = t.add_flag(Coords::new(0, 0)).unwrap();
        t.add_flag(Coords::new(5, 5)).unwrap();
        t.build_building(a, &BuildingSpec::warehouse_with(&[(LOG, 30), (PLANKS, 2)], &[]), 0)
            .unwrap();
        let economy = t.flag_economy(a).unwrap();
        (t, economy)
    }

    #[test]
    fn stock_queries_skip_economies_without_warehouse() {
        let (t, economy) = setup();
        let observer = EconomyObserver::new(&t);
        assert_eq!(observer.stocklevel_by_hint(LOG), 30);
        assert_eq!(observer.stocklevel(&[LOG, PLANKS]), 2);
        assert_eq!(observer.stocklevel(&[]), u32::MAX);
        let lonely = observer.economies_without_warehouse();
        assert_eq!(lonely.len(), 1);
        assert_ne!(lonely[0], economy);
        assert_eq!(observer.economies().len(), 2);
    }

    #[test]
    fn necessity_follows_targets() {
        let (t, _) = setup();
        let observer = EconomyObserver::new(&t);
        // 30 logs exceed the default target of 20; planks are short.
        let necessity = observer.check_ware_necessity(&[LOG]);
        assert!(!necessity.needed);
        assert_eq!(necessity.max_needed_preciousness, 0);
        assert_eq!(necessity.max_preciousness, 14);

        let necessity = observer.check_ware_necessity(&[LOG, PLANKS]);
        assert!(necessity.needed);
    }
}
