//! Integrity checks: stock conservation and the economy partition.
//!
//! Merging and splitting economies only moves bookkeeping around; no unit
//! may appear or vanish. [`StockTotals`] counts every unit a player owns
//! wherever it is (warehouse stock, flag buffers, input queues, occupied
//! worker slots, units in flight out of a warehouse) and
//! [`verify_conservation`] compares two counts.
//!
//! [`verify_partition`] checks the structural invariant: economies
//! partition the flags exactly along road connectivity.

use std::collections::{BTreeMap, BTreeSet};

use waymark_types::{EconomyId, FlagId, RoadId, WareIndex, WareKind};

use crate::supply::SupplyHandle;
use crate::transport::Transport;

/// Units owned per type, over the whole transport network.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StockTotals {
    /// Wares per type.
    pub wares: BTreeMap<WareIndex, u64>,
    /// Workers per type.
    pub workers: BTreeMap<WareIndex, u64>,
}

impl StockTotals {
    /// Count every unit currently held by `transport`.
    pub fn capture(transport: &Transport) -> Self {
        let mut totals = Self::default();

        for building in transport.buildings() {
            if let Some(warehouse) = building.warehouse() {
                for (ware, count) in warehouse.wares().iter() {
                    totals.add(WareKind::Ware, ware, count);
                }
                for (worker, count) in warehouse.workers().iter() {
                    totals.add(WareKind::Worker, worker, count);
                }
            }
            for queue in building.queues() {
                totals.add(WareKind::Ware, queue.ware(), queue.filled());
            }
            if let Some(slot) = building.worker_slot() {
                totals.add(WareKind::Worker, slot.worker(), u32::from(slot.is_present()));
            }
        }

        for flag in transport.network().flags() {
            for waiting in flag.wares() {
                totals.add(WareKind::Ware, waiting.ware, 1);
            }
        }

        // Flag-sourced units stay in their flag buffer until delivery.
        for transfer in transport.transfers() {
            if matches!(transfer.source, SupplyHandle::Warehouse(_)) {
                totals.add(transfer.kind, transfer.ware, 1);
            }
        }

        totals
    }

    fn add(&mut self, kind: WareKind, ware: WareIndex, count: u32) {
        if count == 0 {
            return;
        }
        let map = match kind {
            WareKind::Ware => &mut self.wares,
            WareKind::Worker => &mut self.workers,
        };
        let entry = map.entry(ware).or_insert(0);
        *entry = entry.saturating_add(u64::from(count));
    }

    /// Units of one type.
    pub fn get(&self, kind: WareKind, ware: WareIndex) -> u64 {
        let map = match kind {
            WareKind::Ware => &self.wares,
            WareKind::Worker => &self.workers,
        };
        map.get(&ware).copied().unwrap_or(0)
    }
}

/// One type whose count changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockAnomaly {
    /// Ware or worker.
    pub kind: WareKind,
    /// The type.
    pub ware: WareIndex,
    /// Count before the operation.
    pub before: u64,
    /// Count after the operation.
    pub after: u64,
}

/// Result of comparing two stock counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConservationResult {
    /// Every type has the same count.
    Balanced,
    /// Some types changed.
    Anomaly(Vec<StockAnomaly>),
}

/// Compare stock counts taken before and after an operation that must
/// not create or destroy units.
pub fn verify_conservation(before: &StockTotals, after: &StockTotals) -> ConservationResult {
    let mut anomalies = Vec::new();
    for kind in [WareKind::Ware, WareKind::Worker] {
        let (b, a) = match kind {
            WareKind::Ware => (&before.wares, &after.wares),
            WareKind::Worker => (&before.workers, &after.workers),
        };
        let types: BTreeSet<WareIndex> = b.keys().chain(a.keys()).copied().collect();
        for ware in types {
            let before = before.get(kind, ware);
            let after = after.get(kind, ware);
            if before != after {
                anomalies.push(StockAnomaly {
                    kind,
                    ware,
                    before,
                    after,
                });
            }
        }
    }

    if anomalies.is_empty() {
        ConservationResult::Balanced
    } else {
        ConservationResult::Anomaly(anomalies)
    }
}

/// A breach of the economy partition invariant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionViolation {
    /// A flag points at an economy that does not list it (or does not exist).
    FlagNotInEconomy {
        /// The flag.
        flag: FlagId,
        /// The economy it points at.
        economy: EconomyId,
    },
    /// An economy lists a flag that does not point back at it.
    StrayMember {
        /// The economy.
        economy: EconomyId,
        /// The flag.
        flag: FlagId,
    },
    /// A road joins flags of two different economies.
    RoadAcrossEconomies {
        /// The road.
        road: RoadId,
    },
    /// An economy's flags are not all connected.
    Disconnected {
        /// The economy.
        economy: EconomyId,
    },
    /// An economy has no flags left.
    Empty {
        /// The economy.
        economy: EconomyId,
    },
}

impl core::fmt::Display for PartitionViolation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::FlagNotInEconomy { flag, economy } => {
                write!(f, "flag {flag} is not a member of economy {economy}")
            }
            Self::StrayMember { economy, flag } => {
                write!(f, "economy {economy} lists foreign flag {flag}")
            }
            Self::RoadAcrossEconomies { road } => write!(f, "road {road} joins two economies"),
            Self::Disconnected { economy } => write!(f, "economy {economy} is not connected"),
            Self::Empty { economy } => write!(f, "economy {economy} has no flags"),
        }
    }
}

/// Check that economies partition the flags exactly along roads.
pub fn verify_partition(transport: &Transport) -> Vec<PartitionViolation> {
    let network = transport.network();
    let mut violations = Vec::new();

    for flag in network.flags() {
        let listed = transport
            .economy(flag.economy())
            .is_some_and(|e| e.contains_flag(flag.id()));
        if !listed {
            violations.push(PartitionViolation::FlagNotInEconomy {
                flag: flag.id(),
                economy: flag.economy(),
            });
        }
    }

    for road in network.roads() {
        let start = network.flag(road.start()).map(crate::flag::Flag::economy);
        let end = network.flag(road.end()).map(crate::flag::Flag::economy);
        if start.is_none() || start != end {
            violations.push(PartitionViolation::RoadAcrossEconomies { road: road.id() });
        }
    }

    for economy in transport.economies() {
        for &flag in economy.flags() {
            let points_back = network
                .flag(flag)
                .is_some_and(|f| f.economy() == economy.id());
            if !points_back {
                violations.push(PartitionViolation::StrayMember {
                    economy: economy.id(),
                    flag,
                });
            }
        }
        match economy.any_flag() {
            None => violations.push(PartitionViolation::Empty {
                economy: economy.id(),
            }),
            Some(first) => {
                if network.component(first) != *economy.flags() {
                    violations.push(PartitionViolation::Disconnected {
                        economy: economy.id(),
                    });
                }
            }
        }
    }

    violations
}
