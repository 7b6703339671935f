//! Scenarios: the starting road network plus timed changes to it.
//!
//! A scenario names its flags and refers to ware and worker types by their
//! tribe names, so files stay readable and survive reordering of the tribe
//! tables. [`Scenario::apply`] builds the network into a [`Transport`];
//! timed [`ScenarioEvent`]s are replayed by the tick loop through
//! [`apply_action`].

use std::collections::BTreeMap;
use std::path::Path;

use rand::Rng;
use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use waymark_transport::{
    BuildingSpec, ProductionProgram, ProgramInput, QueueSpec, StockEntry, Transport,
    TransportError, Tribe,
};
use waymark_types::{Coords, FlagId, RequestPriority, TransferId, WareIndex, WareKind};

/// Errors raised while loading or applying a scenario.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    /// The scenario file could not be read.
    #[error("failed to read scenario file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// The scenario file is not valid YAML.
    #[error("failed to parse scenario YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// Two flags share a name.
    #[error("flag name {name:?} is used twice")]
    DuplicateFlag {
        /// The repeated name.
        name: String,
    },

    /// A flag name that no flag carries.
    #[error("unknown flag {name:?}")]
    UnknownFlag {
        /// The name looked up.
        name: String,
    },

    /// A ware or worker name the tribe does not know.
    #[error("unknown {kind} type {name:?}")]
    UnknownType {
        /// Ware or worker.
        kind: WareKind,
        /// The name looked up.
        name: String,
    },

    /// No road joins the two flags.
    #[error("no road between {from:?} and {to:?}")]
    NoRoad {
        /// One end.
        from: String,
        /// The other end.
        to: String,
    },

    /// The flag carries no building.
    #[error("no building at flag {flag:?}")]
    NoBuilding {
        /// The flag name.
        flag: String,
    },

    /// The transport layer rejected an operation.
    #[error("transport error: {source}")]
    Transport {
        /// The underlying transport error.
        #[from]
        source: TransportError,
    },
}

impl From<serde_yml::Error> for ScenarioError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// A named flag position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioFlag {
    /// Name other entries refer to.
    pub name: String,
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

/// A road between two named flags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioRoad {
    /// Start flag.
    pub from: String,
    /// End flag.
    pub to: String,
    /// Step cost.
    pub cost: u32,
}

/// One input queue, by ware name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuePlan {
    /// Ware name.
    pub ware: String,
    /// Capacity.
    pub size: u32,
    /// Priority of the queue's request.
    #[serde(default)]
    pub priority: RequestPriority,
    /// Consumption pacing in game milliseconds.
    #[serde(default)]
    pub consume_interval_ms: u64,
}

/// A building description using tribe names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildingPlan {
    /// A warehouse with initial stock.
    Warehouse {
        /// Ware stock by name.
        #[serde(default)]
        wares: BTreeMap<String, u32>,
        /// Worker stock by name.
        #[serde(default)]
        workers: BTreeMap<String, u32>,
    },
    /// A production site.
    ProductionSite {
        /// Worker type name.
        worker: String,
        /// Input queues.
        #[serde(default)]
        inputs: Vec<QueuePlan>,
        /// Units used per cycle, by ware name.
        #[serde(default)]
        consumes: BTreeMap<String, u32>,
        /// Ware produced per cycle.
        #[serde(default)]
        output: Option<String>,
        /// Cycle length in game milliseconds.
        duration_ms: u64,
    },
    /// A construction site.
    ConstructionSite {
        /// Builder type name.
        builder: String,
        /// Material queues.
        #[serde(default)]
        materials: Vec<QueuePlan>,
        /// What gets built.
        target: Box<BuildingPlan>,
    },
}

impl BuildingPlan {
    /// Resolve names against a tribe.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::UnknownType`] for names the tribe lacks.
    pub fn to_spec(&self, tribe: &Tribe) -> Result<BuildingSpec, ScenarioError> {
        match self {
            Self::Warehouse { wares, workers } => Ok(BuildingSpec::Warehouse {
                wares: stock(tribe, WareKind::Ware, wares)?,
                workers: stock(tribe, WareKind::Worker, workers)?,
            }),
            Self::ProductionSite {
                worker,
                inputs,
                consumes,
                output,
                duration_ms,
            } => Ok(BuildingSpec::ProductionSite {
                worker: resolve(tribe, WareKind::Worker, worker)?,
                inputs: queues(tribe, inputs)?,
                program: ProductionProgram {
                    inputs: consumes
                        .iter()
                        .map(|(name, &amount)| {
                            Ok(ProgramInput {
                                ware: resolve(tribe, WareKind::Ware, name)?,
                                amount,
                            })
                        })
                        .collect::<Result<_, ScenarioError>>()?,
                    output: output
                        .as_deref()
                        .map(|name| resolve(tribe, WareKind::Ware, name))
                        .transpose()?,
                    duration_ms: *duration_ms,
                },
            }),
            Self::ConstructionSite {
                builder,
                materials,
                target,
            } => Ok(BuildingSpec::ConstructionSite {
                builder: resolve(tribe, WareKind::Worker, builder)?,
                inputs: queues(tribe, materials)?,
                target: Box::new(target.to_spec(tribe)?),
            }),
        }
    }
}

fn resolve(tribe: &Tribe, kind: WareKind, name: &str) -> Result<WareIndex, ScenarioError> {
    tribe
        .index_of(kind, name)
        .ok_or_else(|| ScenarioError::UnknownType {
            kind,
            name: name.to_owned(),
        })
}

fn stock(
    tribe: &Tribe,
    kind: WareKind,
    entries: &BTreeMap<String, u32>,
) -> Result<Vec<StockEntry>, ScenarioError> {
    entries
        .iter()
        .map(|(name, &count)| {
            Ok(StockEntry {
                ware: resolve(tribe, kind, name)?,
                count,
            })
        })
        .collect()
}

fn queues(tribe: &Tribe, plans: &[QueuePlan]) -> Result<Vec<QueueSpec>, ScenarioError> {
    plans
        .iter()
        .map(|plan| {
            Ok(QueueSpec {
                ware: resolve(tribe, WareKind::Ware, &plan.ware)?,
                size: plan.size,
                priority: plan.priority,
                consume_interval_ms: plan.consume_interval_ms,
            })
        })
        .collect()
}

/// A building placed at a named flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioBuilding {
    /// Flag name.
    pub flag: String,
    /// What to place.
    pub building: BuildingPlan,
}

/// Wares lying at a flag when the scenario starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioWare {
    /// Flag name.
    pub flag: String,
    /// Ware name.
    pub ware: String,
    /// Units.
    #[serde(default = "default_count")]
    pub count: u32,
}

/// A target quantity override for the economy containing a flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioTarget {
    /// Any flag of the economy.
    pub flag: String,
    /// Ware name.
    pub ware: String,
    /// Permanent floor.
    pub permanent: u32,
    /// Temporary target.
    pub temporary: u32,
}

/// A change applied while the simulation runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScenarioAction {
    /// Build a road.
    BuildRoad {
        /// Start flag.
        from: String,
        /// End flag.
        to: String,
        /// Step cost.
        cost: u32,
    },
    /// Remove the road joining two flags.
    RemoveRoad {
        /// One end.
        from: String,
        /// The other end.
        to: String,
    },
    /// Remove a flag with everything attached to it.
    RemoveFlag {
        /// Flag name.
        flag: String,
    },
    /// Place a building.
    PlaceBuilding {
        /// Flag name.
        flag: String,
        /// What to place.
        building: BuildingPlan,
    },
    /// Empty and remove the building at a flag.
    DestroyBuilding {
        /// Flag name.
        flag: String,
    },
    /// Change a target quantity.
    SetTarget(ScenarioTarget),
    /// Put wares down at a flag.
    DropWares(ScenarioWare),
}

/// An action due at a given tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioEvent {
    /// Tick at which the action runs.
    pub at_tick: u64,
    /// The action.
    pub action: ScenarioAction,
}

/// A complete scenario file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Flags.
    pub flags: Vec<ScenarioFlag>,
    /// Roads.
    #[serde(default)]
    pub roads: Vec<ScenarioRoad>,
    /// Buildings.
    #[serde(default)]
    pub buildings: Vec<ScenarioBuilding>,
    /// Wares lying at flags.
    #[serde(default)]
    pub wares: Vec<ScenarioWare>,
    /// Target quantity overrides, applied after all roads exist.
    #[serde(default)]
    pub targets: Vec<ScenarioTarget>,
    /// Timed changes.
    #[serde(default)]
    pub events: Vec<ScenarioEvent>,
}

/// Flag names resolved after [`Scenario::apply`], plus the pending events.
#[derive(Debug, Clone, Default)]
pub struct LoadedScenario {
    /// Flag ids by scenario name.
    pub flags: BTreeMap<String, FlagId>,
    /// Events sorted by tick.
    pub events: Vec<ScenarioEvent>,
}

impl LoadedScenario {
    /// Remove and return the events due at or before `tick`.
    pub fn take_due(&mut self, tick: u64) -> Vec<ScenarioEvent> {
        let split = self.events.partition_point(|e| e.at_tick <= tick);
        self.events.drain(..split).collect()
    }
}

impl Scenario {
    /// Load a scenario from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::Io`] or [`ScenarioError::Yaml`].
    pub fn from_file(path: &Path) -> Result<Self, ScenarioError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse a scenario from a YAML string.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError::Yaml`] if the string is not a scenario.
    pub fn parse(yaml: &str) -> Result<Self, ScenarioError> {
        Ok(serde_yml::from_str(yaml)?)
    }

    /// Build the scenario's network into `transport` at game time `now`.
    ///
    /// # Errors
    ///
    /// Returns an error for duplicate or unknown names and for operations
    /// the transport layer rejects. The transport may be partially built
    /// in that case.
    pub fn apply(&self, transport: &mut Transport, now: u64) -> Result<LoadedScenario, ScenarioError> {
        let mut flags = BTreeMap::new();
        for flag in &self.flags {
            if flags.contains_key(&flag.name) {
                return Err(ScenarioError::DuplicateFlag {
                    name: flag.name.clone(),
                });
            }
            let id = transport.add_flag(Coords::new(flag.x, flag.y))?;
            flags.insert(flag.name.clone(), id);
        }
        for road in &self.roads {
            apply_action(
                transport,
                &flags,
                &ScenarioAction::BuildRoad {
                    from: road.from.clone(),
                    to: road.to.clone(),
                    cost: road.cost,
                },
                now,
            )?;
        }
        for building in &self.buildings {
            let flag = flag_id(&flags, &building.flag)?;
            let spec = building.building.to_spec(transport.tribe())?;
            transport.build_building(flag, &spec, now)?;
        }
        for ware in &self.wares {
            apply_action(transport, &flags, &ScenarioAction::DropWares(ware.clone()), now)?;
        }
        for target in &self.targets {
            apply_action(transport, &flags, &ScenarioAction::SetTarget(target.clone()), now)?;
        }

        let mut events = self.events.clone();
        events.sort_by_key(|e| e.at_tick);
        info!(
            scenario = %self.name,
            flags = flags.len(),
            roads = self.roads.len(),
            buildings = self.buildings.len(),
            economies = transport.economy_count(),
            events = events.len(),
            "scenario applied"
        );
        Ok(LoadedScenario { flags, events })
    }
}

fn flag_id(flags: &BTreeMap<String, FlagId>, name: &str) -> Result<FlagId, ScenarioError> {
    flags
        .get(name)
        .copied()
        .ok_or_else(|| ScenarioError::UnknownFlag {
            name: name.to_owned(),
        })
}

/// Run one scenario action. Returns transfers orphaned by it; the caller
/// aborts them with the carriers and fails them.
///
/// # Errors
///
/// Returns an error for unknown names or rejected transport operations.
pub fn apply_action(
    transport: &mut Transport,
    flags: &BTreeMap<String, FlagId>,
    action: &ScenarioAction,
    now: u64,
) -> Result<Vec<TransferId>, ScenarioError> {
    match action {
        ScenarioAction::BuildRoad { from, to, cost } => {
            transport.build_road(flag_id(flags, from)?, flag_id(flags, to)?, *cost, now)?;
            Ok(Vec::new())
        }
        ScenarioAction::RemoveRoad { from, to } => {
            let (a, b) = (flag_id(flags, from)?, flag_id(flags, to)?);
            let road = transport
                .network()
                .roads()
                .find(|r| (r.start() == a && r.end() == b) || (r.start() == b && r.end() == a))
                .map(waymark_transport::Road::id)
                .ok_or_else(|| ScenarioError::NoRoad {
                    from: from.clone(),
                    to: to.clone(),
                })?;
            transport.remove_road(road, now)?;
            Ok(Vec::new())
        }
        ScenarioAction::RemoveFlag { flag } => {
            Ok(transport.remove_flag(flag_id(flags, flag)?, now)?)
        }
        ScenarioAction::PlaceBuilding { flag, building } => {
            let spec = building.to_spec(transport.tribe())?;
            transport.build_building(flag_id(flags, flag)?, &spec, now)?;
            Ok(Vec::new())
        }
        ScenarioAction::DestroyBuilding { flag } => {
            let id = flag_id(flags, flag)?;
            let building = transport
                .network()
                .require_flag(id)?
                .building()
                .ok_or_else(|| ScenarioError::NoBuilding { flag: flag.clone() })?;
            let (drained, mut orphaned) = transport.drain_building(building)?;
            if !drained.is_empty() {
                warn!(building = %building, units = drained.total(), "queued wares lost with building");
            }
            orphaned.extend(transport.destroy_building(building, now)?);
            Ok(orphaned)
        }
        ScenarioAction::SetTarget(target) => {
            let economy = transport.flag_economy(flag_id(flags, &target.flag)?)?;
            let ware = resolve(transport.tribe(), WareKind::Ware, &target.ware)?;
            transport.set_target_quantity(economy, ware, target.permanent, target.temporary, now)?;
            Ok(Vec::new())
        }
        ScenarioAction::DropWares(drop) => {
            let flag = flag_id(flags, &drop.flag)?;
            let ware = resolve(transport.tribe(), WareKind::Ware, &drop.ware)?;
            for _ in 0..drop.count {
                transport.drop_ware_at_flag(flag, ware, now)?;
            }
            Ok(Vec::new())
        }
    }
}

/// Generate a `rows` x `cols` grid of flags with a random road network.
///
/// The flag at `r0c0` holds a warehouse stocked from the tribe's default
/// targets. Every row is a chain of roads and neighbouring rows are joined
/// by at least one road, so the network starts as a single economy; extra
/// vertical roads are added at random. Other flags get production sites
/// and construction sites at random. Two events cut one road at tick 40 and
/// rebuild it at tick 120, so the run exercises a split and a merge.
pub fn generate_grid_scenario(rows: u32, cols: u32, seed: u64, tribe: &Tribe) -> Scenario {
    let mut rng = SmallRng::seed_from_u64(seed);
    let name = |r: u32, c: u32| format!("r{r}c{c}");
    let coord = |i: u32| i32::try_from(i.saturating_mul(4)).unwrap_or(i32::MAX);

    let mut flags = Vec::new();
    for r in 0..rows {
        for c in 0..cols {
            flags.push(ScenarioFlag {
                name: name(r, c),
                x: coord(c),
                y: coord(r),
            });
        }
    }

    let mut roads = Vec::new();
    for r in 0..rows {
        for c in 1..cols {
            roads.push(ScenarioRoad {
                from: name(r, c.saturating_sub(1)),
                to: name(r, c),
                cost: rng.random_range(2..=6),
            });
        }
        if r == 0 {
            continue;
        }
        let bridge = rng.random_range(0..cols);
        for c in 0..cols {
            if c == bridge || rng.random_bool(0.3) {
                roads.push(ScenarioRoad {
                    from: name(r.saturating_sub(1), c),
                    to: name(r, c),
                    cost: rng.random_range(2..=6),
                });
            }
        }
    }

    let ware_names: Vec<&str> = tribe.wares.iter().map(|w| w.name.as_str()).collect();
    let worker_names: Vec<&str> = tribe.workers.iter().map(|w| w.name.as_str()).collect();

    let mut buildings = vec![ScenarioBuilding {
        flag: name(0, 0),
        building: BuildingPlan::Warehouse {
            wares: tribe
                .wares
                .iter()
                .map(|w| (w.name.clone(), w.default_target_quantity / 2))
                .collect(),
            workers: tribe.workers.iter().map(|w| (w.name.clone(), 3)).collect(),
        },
    }];

    for r in 0..rows {
        for c in 0..cols {
            if (r, c) == (0, 0) || worker_names.is_empty() || ware_names.is_empty() {
                continue;
            }
            let roll: u32 = rng.random_range(0..10);
            let pick_ware = |rng: &mut SmallRng| {
                ware_names
                    .get(rng.random_range(0..ware_names.len()))
                    .map_or_else(String::new, |n| (*n).to_owned())
            };
            let worker = worker_names
                .get(rng.random_range(0..worker_names.len()))
                .map_or_else(String::new, |n| (*n).to_owned());
            let plan = if roll < 5 {
                let input = pick_ware(&mut rng);
                let output = pick_ware(&mut rng);
                let size = rng.random_range(2..=5);
                BuildingPlan::ProductionSite {
                    worker,
                    inputs: vec![QueuePlan {
                        ware: input.clone(),
                        size,
                        priority: RequestPriority::Normal,
                        consume_interval_ms: 0,
                    }],
                    consumes: BTreeMap::from([(input, 1)]),
                    output: Some(output),
                    duration_ms: rng.random_range(2_000..=8_000),
                }
            } else if roll < 7 {
                let material = pick_ware(&mut rng);
                BuildingPlan::ConstructionSite {
                    builder: worker,
                    materials: vec![QueuePlan {
                        ware: material,
                        size: rng.random_range(1..=4),
                        priority: RequestPriority::High,
                        consume_interval_ms: 0,
                    }],
                    target: Box::new(BuildingPlan::Warehouse {
                        wares: BTreeMap::new(),
                        workers: BTreeMap::new(),
                    }),
                }
            } else {
                continue;
            };
            buildings.push(ScenarioBuilding {
                flag: name(r, c),
                building: plan,
            });
        }
    }

    let events = roads
        .get(rng.random_range(0..roads.len().max(1)))
        .map(|road| {
            vec![
                ScenarioEvent {
                    at_tick: 40,
                    action: ScenarioAction::RemoveRoad {
                        from: road.from.clone(),
                        to: road.to.clone(),
                    },
                },
                ScenarioEvent {
                    at_tick: 120,
                    action: ScenarioAction::BuildRoad {
                        from: road.from.clone(),
                        to: road.to.clone(),
                        cost: road.cost,
                    },
                },
            ]
        })
        .unwrap_or_default();

    Scenario {
        name: format!("grid {rows}x{cols} seed {seed}"),
        description: String::from("generated"),
        flags,
        roads,
        buildings,
        wares: Vec::new(),
        targets: Vec::new(),
        events,
    }
}

const fn default_count() -> u32 {
    1
}
