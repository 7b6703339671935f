//! Saving and restoring a player's transport network.
//!
//! A [`TransportSnapshot`] holds what cannot be derived: flags with their
//! waiting wares, roads, per-economy target quantities, and buildings with
//! their queue fill levels and warehouse stock. Requests, supplies, and
//! economy stock totals are rebuilt on restore. Transfers in flight are not
//! saved; a unit launched from a warehouse is written back into that
//! warehouse's stock, so loading a snapshot is like every carrier giving
//! up at once.
//!
//! Tables keyed by [`WareIndex`] are stored as lists so that the snapshot
//! encodes to JSON.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use waymark_types::{
    BuildingId, Coords, EconomyId, FlagId, PlayerId, RoadId, SupplyId, TargetQuantity, WareIndex,
    WareKind,
};

use crate::building::{Building, BuildingSpec};
use crate::config::TransportConfig;
use crate::conservation::verify_partition;
use crate::error::TransportError;
use crate::flag::Flag;
use crate::road::Road;
use crate::supply::SupplyHandle;
use crate::transport::Transport;
use crate::tribe::Tribe;

/// Snapshot format version written by this crate.
pub const SNAPSHOT_VERSION: u32 = 1;

/// A flag and the wares waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlagRecord {
    /// The flag's id.
    pub id: FlagId,
    /// Map position.
    pub position: Coords,
    /// Economy the flag belongs to.
    pub economy: EconomyId,
    /// Waiting wares, oldest first.
    #[serde(default)]
    pub wares: Vec<WareIndex>,
}

/// A road.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoadRecord {
    /// The road's id.
    pub id: RoadId,
    /// First endpoint.
    pub start: FlagId,
    /// Second endpoint.
    pub end: FlagId,
    /// Steps to walk it.
    pub cost: u32,
}

/// One ware's target quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetRecord {
    /// Ware type.
    pub ware: WareIndex,
    /// The target.
    pub target: TargetQuantity,
}

/// An economy's identity and settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomyRecord {
    /// The economy's id.
    pub id: EconomyId,
    /// Member flags.
    pub flags: Vec<FlagId>,
    /// Target quantities.
    pub targets: Vec<TargetRecord>,
}

/// Fill level of one input queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueRecord {
    /// Queue ware type.
    pub ware: WareIndex,
    /// Units stored.
    pub filled: u32,
}

/// A building with its mutable state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingRecord {
    /// The building's id.
    pub id: BuildingId,
    /// Flag it stands at.
    pub flag: FlagId,
    /// Role, queue settings, and warehouse stock.
    pub spec: BuildingSpec,
    /// Queue fill levels.
    #[serde(default)]
    pub queues: Vec<QueueRecord>,
    /// Whether the worker slot is occupied.
    #[serde(default)]
    pub worker_present: bool,
}

/// Everything needed to rebuild a [`Transport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportSnapshot {
    /// Format version, see [`SNAPSHOT_VERSION`].
    pub version: u32,
    /// Owning player.
    pub owner: PlayerId,
    /// Transport tunables.
    pub config: TransportConfig,
    /// Wall-clock time the snapshot was taken.
    pub saved_at: DateTime<Utc>,
    /// Game time the snapshot was taken.
    pub game_time: u64,
    /// All flags.
    pub flags: Vec<FlagRecord>,
    /// All roads.
    pub roads: Vec<RoadRecord>,
    /// All economies.
    pub economies: Vec<EconomyRecord>,
    /// All buildings.
    pub buildings: Vec<BuildingRecord>,
}

impl TransportSnapshot {
    /// Encode as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> Result<String, TransportError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Decode from JSON.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Serialization`] if the input is not a
    /// valid snapshot.
    pub fn from_json(json: &str) -> Result<Self, TransportError> {
        Ok(serde_json::from_str(json)?)
    }
}

fn inconsistent(reason: impl Into<String>) -> TransportError {
    TransportError::InconsistentSnapshot {
        reason: reason.into(),
    }
}

impl Transport {
    /// Capture the network at game time `now`.
    pub fn snapshot(&self, now: u64) -> TransportSnapshot {
        // Units launched from a warehouse go back into its stock.
        let mut returning: BTreeMap<BuildingId, Vec<(WareKind, WareIndex)>> = BTreeMap::new();
        for transfer in self.transfers.values() {
            if let SupplyHandle::Warehouse(warehouse) = transfer.source {
                returning
                    .entry(warehouse)
                    .or_default()
                    .push((transfer.kind, transfer.ware));
            }
        }

        let flags = self
            .network
            .flags()
            .map(|f| FlagRecord {
                id: f.id(),
                position: f.position(),
                economy: f.economy(),
                wares: f.wares().iter().map(|w| w.ware).collect(),
            })
            .collect();

        let roads = self
            .network
            .roads()
            .map(|r| RoadRecord {
                id: r.id(),
                start: r.start(),
                end: r.end(),
                cost: r.cost(),
            })
            .collect();

        let economies = self
            .economies
            .values()
            .map(|e| EconomyRecord {
                id: e.id(),
                flags: e.flags().iter().copied().collect(),
                targets: e
                    .targets()
                    .iter()
                    .map(|(ware, target)| TargetRecord {
                        ware,
                        target: *target,
                    })
                    .collect(),
            })
            .collect();

        let buildings = self
            .buildings
            .values()
            .map(|b| {
                let mut spec = b.spec();
                if let (BuildingSpec::Warehouse { wares, workers }, Some(units)) =
                    (&mut spec, returning.get(&b.id()))
                {
                    for &(kind, ware) in units {
                        let list = match kind {
                            WareKind::Ware => &mut *wares,
                            WareKind::Worker => &mut *workers,
                        };
                        match list.iter_mut().find(|e| e.ware == ware) {
                            Some(entry) => entry.count = entry.count.saturating_add(1),
                            None => list.push(crate::building::StockEntry { ware, count: 1 }),
                        }
                    }
                }
                BuildingRecord {
                    id: b.id(),
                    flag: b.flag(),
                    spec,
                    queues: b
                        .queues()
                        .iter()
                        .map(|q| QueueRecord {
                            ware: q.ware(),
                            filled: q.filled(),
                        })
                        .collect(),
                    worker_present: b
                        .worker_slot()
                        .is_some_and(crate::building::WorkerSlot::is_present),
                }
            })
            .collect();

        TransportSnapshot {
            version: SNAPSHOT_VERSION,
            owner: self.owner,
            config: self.config.clone(),
            saved_at: Utc::now(),
            game_time: now,
            flags,
            roads,
            economies,
            buildings,
        }
    }

    /// Rebuild a network from a snapshot. Every economy gets a balance
    /// pass scheduled at the snapshot's game time.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InconsistentSnapshot`] if the snapshot
    /// references missing objects, names unknown types, or does not
    /// partition its flags along roads.
    pub fn restore(snapshot: TransportSnapshot, tribe: Tribe) -> Result<Self, TransportError> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(inconsistent(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        let mut transport = Self::new(snapshot.owner, tribe, snapshot.config);

        for record in &snapshot.economies {
            let mut economy = transport.new_economy(record.id);
            for target in &record.targets {
                if transport.tribe.ware(target.ware).is_none() {
                    return Err(inconsistent(format!("unknown ware {} in targets", target.ware)));
                }
                economy.targets_mut().insert(target.ware, target.target);
            }
            for &flag in &record.flags {
                economy.add_flag(flag);
            }
            transport.economies.insert(record.id, economy);
        }

        for record in &snapshot.flags {
            let mut flag = Flag::new(record.id, record.position, record.economy);
            let economy = transport
                .economies
                .get_mut(&record.economy)
                .ok_or_else(|| inconsistent(format!("flag {} has no economy", record.id)))?;
            for &ware in &record.wares {
                let supply = SupplyId::new();
                flag.push_ware(ware, supply)?;
                economy.add_supply(supply, SupplyHandle::Flag(record.id));
            }
            transport.network.insert_flag(flag)?;
        }

        for record in &snapshot.roads {
            transport
                .network
                .insert_road(Road::new(record.id, record.start, record.end, record.cost))?;
        }

        let violations = verify_partition(&transport);
        if let Some(first) = violations.first() {
            return Err(inconsistent(first.to_string()));
        }

        for record in &snapshot.buildings {
            record
                .spec
                .validate(&transport.tribe)
                .map_err(|e| inconsistent(e.to_string()))?;
            let flag = transport.network.require_flag(record.flag)?;
            if flag.building().is_some() {
                return Err(inconsistent(format!("flag {} has two buildings", record.flag)));
            }
            let economy_id = flag.economy();

            let mut building = Building::new(record.id, record.flag, &record.spec)?;
            for queue in &record.queues {
                building.queue_mut(queue.ware)?.set_filled(queue.filled);
            }
            if let Some(slot) = building.worker_slot_mut() {
                slot.set_present(record.worker_present);
            }
            building.attach(transport.require_economy_mut(economy_id)?)?;
            transport
                .network
                .require_flag_mut(record.flag)?
                .set_building(Some(record.id));
            transport.buildings.insert(record.id, building);
        }

        let ids: Vec<EconomyId> = transport.economies.keys().copied().collect();
        for id in ids {
            transport.request_balance(id, snapshot.game_time)?;
        }

        info!(
            owner = %transport.owner,
            flags = transport.network.flag_count(),
            economies = transport.economies.len(),
            buildings = transport.buildings.len(),
            "transport restored"
        );
        Ok(transport)
    }
}
