//! Tribe description: the ware and worker types known to one game session.
//!
//! A [`Tribe`] is passed explicitly into every [`Transport`] instead of
//! living in a process-wide registry. Ware and worker types are addressed
//! by [`WareIndex`], their position in the respective table.
//!
//! [`Transport`]: crate::Transport

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use waymark_types::{WareIndex, WareKind};

/// One ware type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WareDescription {
    /// Internal name, e.g. `"log"`.
    pub name: String,

    /// Target quantity a fresh economy starts with (both permanent and
    /// temporary).
    #[serde(default = "default_target_quantity")]
    pub default_target_quantity: u32,

    /// How valuable the ware is to the building AI.
    #[serde(default)]
    pub preciousness: u32,
}

/// One worker type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerDescription {
    /// Internal name, e.g. `"builder"`.
    pub name: String,

    /// Wares, by name, a warehouse spends to create one of these workers
    /// when a request finds none in stock. Empty means the worker cannot
    /// be created.
    #[serde(default)]
    pub buildcost: BTreeMap<String, u32>,
}

/// The ware and worker tables of a tribe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tribe {
    /// Tribe name.
    pub name: String,
    /// Ware table, indexed by [`WareIndex`].
    pub wares: Vec<WareDescription>,
    /// Worker table, indexed by [`WareIndex`].
    pub workers: Vec<WorkerDescription>,
}

impl Tribe {
    /// Look up a ware type by name.
    pub fn ware_index(&self, name: &str) -> Option<WareIndex> {
        self.wares
            .iter()
            .position(|w| w.name == name)
            .and_then(|i| u16::try_from(i).ok())
            .map(WareIndex)
    }

    /// Look up a worker type by name.
    pub fn worker_index(&self, name: &str) -> Option<WareIndex> {
        self.workers
            .iter()
            .position(|w| w.name == name)
            .and_then(|i| u16::try_from(i).ok())
            .map(WareIndex)
    }

    /// Look up an index by kind and name.
    pub fn index_of(&self, kind: WareKind, name: &str) -> Option<WareIndex> {
        match kind {
            WareKind::Ware => self.ware_index(name),
            WareKind::Worker => self.worker_index(name),
        }
    }

    /// Return the description of a ware type.
    pub fn ware(&self, ware: WareIndex) -> Option<&WareDescription> {
        self.wares.get(ware.as_usize())
    }

    /// Return the description of a worker type.
    pub fn worker(&self, worker: WareIndex) -> Option<&WorkerDescription> {
        self.workers.get(worker.as_usize())
    }

    /// Whether the index is valid for the given kind.
    pub fn contains(&self, kind: WareKind, index: WareIndex) -> bool {
        match kind {
            WareKind::Ware => self.ware(index).is_some(),
            WareKind::Worker => self.worker(index).is_some(),
        }
    }

    /// Human-readable name for log output; `"?"` for unknown indices.
    pub fn name_of(&self, kind: WareKind, index: WareIndex) -> &str {
        match kind {
            WareKind::Ware => self.ware(index).map_or("?", |w| w.name.as_str()),
            WareKind::Worker => self.worker(index).map_or("?", |w| w.name.as_str()),
        }
    }

    /// The wares needed to create one worker, resolved to indices.
    ///
    /// `None` if the worker is unknown, has no build cost, or its cost
    /// names a ware this tribe lacks.
    pub fn buildcost(&self, worker: WareIndex) -> Option<Vec<(WareIndex, u32)>> {
        let description = self.worker(worker)?;
        if description.buildcost.is_empty() {
            return None;
        }
        description
            .buildcost
            .iter()
            .map(|(name, &amount)| Some((self.ware_index(name)?, amount)))
            .collect()
    }

    /// Iterate over all ware indices.
    pub fn ware_indices(&self) -> impl Iterator<Item = WareIndex> + '_ {
        (0..self.wares.len()).filter_map(|i| u16::try_from(i).ok().map(WareIndex))
    }
}

impl Default for Tribe {
    /// A small settler tribe covering the basic wood, stone, and food chains.
    fn default() -> Self {
        let ware = |name: &str, target: u32, preciousness: u32| WareDescription {
            name: name.to_owned(),
            default_target_quantity: target,
            preciousness,
        };
        let worker = |name: &str, cost: &[(&str, u32)]| WorkerDescription {
            name: name.to_owned(),
            buildcost: cost.iter().map(|&(w, n)| (w.to_owned(), n)).collect(),
        };
        Self {
            name: String::from("settlers"),
            wares: vec![
                ware("log", 20, 14),
                ware("planks", 20, 10),
                ware("granite", 10, 6),
                ware("fish", 15, 4),
                ware("meat", 15, 4),
                ware("ration", 10, 6),
                ware("coal", 10, 8),
                ware("iron_ore", 10, 6),
                ware("iron", 5, 10),
                ware("pick", 2, 2),
                ware("felling_ax", 2, 3),
            ],
            workers: vec![
                worker("carrier", &[]),
                worker("builder", &[]),
                worker("lumberjack", &[("felling_ax", 1)]),
                worker("stonemason", &[("pick", 1)]),
                worker("fisher", &[]),
                worker("miner", &[("pick", 1), ("ration", 1)]),
                worker("smelter", &[]),
            ],
        }
    }
}

const fn default_target_quantity() -> u32 {
    1
}
