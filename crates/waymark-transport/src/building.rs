//! Buildings attached to flags.
//!
//! A building is a closed set of roles. Production and construction
//! sites consume wares through [`WaresQueue`]s and need a worker;
//! warehouses store wares and workers and act as one inactive supply.

use serde::{Deserialize, Serialize};
use waymark_types::{
    BuildingId, BuildingKind, FlagId, RequestId, RequestPriority, SupplyId, TransferId, WareIndex,
    WareKind,
};

use crate::economy::Economy;
use crate::error::TransportError;
use crate::request::Request;
use crate::supply::SupplyHandle;
use crate::tribe::Tribe;
use crate::ware_list::WareList;
use crate::wares_queue::{WaresQueue, withdraw_request};

// ---------------------------------------------------------------------------
// Specs
// ---------------------------------------------------------------------------

/// Input queue of a building to be placed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueSpec {
    /// Ware type.
    pub ware: WareIndex,
    /// Capacity.
    pub size: u32,
    /// Request priority.
    #[serde(default)]
    pub priority: RequestPriority,
    /// Consumption interval hint in game milliseconds.
    #[serde(default)]
    pub consume_interval_ms: u64,
}

/// A `(type, count)` pair of initial warehouse stock.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockEntry {
    /// Ware or worker type.
    pub ware: WareIndex,
    /// Units.
    pub count: u32,
}

/// Input consumed by one production cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramInput {
    /// Ware type, taken from the matching queue.
    pub ware: WareIndex,
    /// Units per cycle.
    pub amount: u32,
}

/// What a production site does each cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductionProgram {
    /// Inputs used up when a cycle starts.
    #[serde(default)]
    pub inputs: Vec<ProgramInput>,
    /// Ware dropped on the building's flag, if any.
    #[serde(default)]
    pub output: Option<WareIndex>,
    /// Cycle length in game milliseconds.
    pub duration_ms: u64,
}

/// Description of a building to place on a flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BuildingSpec {
    /// A production site.
    ProductionSite {
        /// Worker type operating the site.
        worker: WareIndex,
        /// Input queues.
        #[serde(default)]
        inputs: Vec<QueueSpec>,
        /// Production program.
        program: ProductionProgram,
    },
    /// A construction site that becomes `target` once supplied.
    ConstructionSite {
        /// Worker type doing the construction.
        builder: WareIndex,
        /// Building materials.
        #[serde(default)]
        inputs: Vec<QueueSpec>,
        /// What gets built.
        target: Box<BuildingSpec>,
    },
    /// A warehouse.
    Warehouse {
        /// Initial ware stock.
        #[serde(default)]
        wares: Vec<StockEntry>,
        /// Initial worker stock.
        #[serde(default)]
        workers: Vec<StockEntry>,
    },
}

impl BuildingSpec {
    /// A warehouse spec from `(type, count)` slices.
    pub fn warehouse_with(wares: &[(WareIndex, u32)], workers: &[(WareIndex, u32)]) -> Self {
        let entries = |list: &[(WareIndex, u32)]| {
            list.iter()
                .map(|&(ware, count)| StockEntry { ware, count })
                .collect()
        };
        Self::Warehouse {
            wares: entries(wares),
            workers: entries(workers),
        }
    }

    /// The building kind this spec places.
    pub const fn kind(&self) -> BuildingKind {
        match self {
            Self::ProductionSite { .. } => BuildingKind::ProductionSite,
            Self::ConstructionSite { .. } => BuildingKind::ConstructionSite,
            Self::Warehouse { .. } => BuildingKind::Warehouse,
        }
    }

    /// Check every ware and worker index against the tribe.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::UnknownWare`] for the first unknown index.
    pub fn validate(&self, tribe: &Tribe) -> Result<(), TransportError> {
        let check = |kind: WareKind, ware: WareIndex| {
            if tribe.contains(kind, ware) {
                Ok(())
            } else {
                Err(TransportError::UnknownWare { kind, ware })
            }
        };
        match self {
            Self::ProductionSite {
                worker,
                inputs,
                program,
            } => {
                check(WareKind::Worker, *worker)?;
                for q in inputs {
                    check(WareKind::Ware, q.ware)?;
                }
                for input in &program.inputs {
                    check(WareKind::Ware, input.ware)?;
                }
                if let Some(output) = program.output {
                    check(WareKind::Ware, output)?;
                }
                Ok(())
            }
            Self::ConstructionSite {
                builder,
                inputs,
                target,
            } => {
                check(WareKind::Worker, *builder)?;
                for q in inputs {
                    check(WareKind::Ware, q.ware)?;
                }
                target.validate(tribe)
            }
            Self::Warehouse { wares, workers } => {
                for e in wares {
                    check(WareKind::Ware, e.ware)?;
                }
                for e in workers {
                    check(WareKind::Worker, e.ware)?;
                }
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// A slot for one worker, requesting it while empty.
#[derive(Debug, Clone)]
pub struct WorkerSlot {
    building: BuildingId,
    flag: FlagId,
    worker: WareIndex,
    present: bool,
    request: Option<Request>,
}

impl WorkerSlot {
    /// Create an empty slot.
    pub const fn new(building: BuildingId, flag: FlagId, worker: WareIndex) -> Self {
        Self {
            building,
            flag,
            worker,
            present: false,
            request: None,
        }
    }

    /// Worker type.
    pub const fn worker(&self) -> WareIndex {
        self.worker
    }

    /// Whether the worker has arrived.
    pub const fn is_present(&self) -> bool {
        self.present
    }

    /// The live worker request, if any.
    pub const fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    pub(crate) const fn request_mut(&mut self) -> Option<&mut Request> {
        self.request.as_mut()
    }

    pub(crate) const fn set_present(&mut self, present: bool) {
        self.present = present;
    }

    /// Keep one request for the worker while the slot is empty.
    pub(crate) fn update(&mut self, economy: Option<&mut Economy>) -> Vec<TransferId> {
        if self.present {
            return withdraw_request(&mut self.request, economy);
        }
        if self.request.is_none() {
            let request = Request::new(WareKind::Worker, self.worker, self.building, self.flag, 1);
            if let Some(economy) = economy {
                economy.add_request(request.id(), self.building);
            }
            self.request = Some(request);
        }
        Vec::new()
    }

    /// The worker arrived for `transfer`. Returns `false` if the slot was
    /// already taken.
    pub(crate) fn deliver(&mut self, transfer: TransferId) -> bool {
        if let Some(request) = self.request.as_mut() {
            request.remove_transfer(transfer);
        }
        if self.present {
            return false;
        }
        self.present = true;
        true
    }
}

/// A building turning inputs into outputs.
#[derive(Debug, Clone)]
pub struct ProductionSite {
    queues: Vec<WaresQueue>,
    worker: WorkerSlot,
    program: ProductionProgram,
}

impl ProductionSite {
    /// The production program.
    pub const fn program(&self) -> &ProductionProgram {
        &self.program
    }

    /// The worker slot.
    pub const fn worker(&self) -> &WorkerSlot {
        &self.worker
    }

    /// Whether one cycle can run: the worker is present and every input
    /// queue holds enough units.
    pub fn can_produce(&self) -> bool {
        self.worker.is_present()
            && self.program.inputs.iter().all(|input| {
                self.queues
                    .iter()
                    .find(|q| q.ware() == input.ware)
                    .is_some_and(|q| q.filled() >= input.amount)
            })
    }
}

/// A building under construction.
#[derive(Debug, Clone)]
pub struct ConstructionSite {
    queues: Vec<WaresQueue>,
    builder: WorkerSlot,
    target: BuildingSpec,
}

impl ConstructionSite {
    /// The builder slot.
    pub const fn builder(&self) -> &WorkerSlot {
        &self.builder
    }

    /// What the site turns into.
    pub const fn target(&self) -> &BuildingSpec {
        &self.target
    }

    /// Whether all materials and the builder have arrived.
    pub fn is_complete(&self) -> bool {
        self.builder.is_present() && self.queues.iter().all(|q| q.missing() == 0)
    }
}

/// A store of wares and workers.
#[derive(Debug, Clone)]
pub struct Warehouse {
    wares: WareList,
    workers: WareList,
    supply: SupplyId,
}

impl Warehouse {
    /// Stored wares.
    pub const fn wares(&self) -> &WareList {
        &self.wares
    }

    /// Stored workers.
    pub const fn workers(&self) -> &WareList {
        &self.workers
    }

    /// Stock of one kind.
    pub const fn stock(&self, kind: WareKind) -> &WareList {
        match kind {
            WareKind::Ware => &self.wares,
            WareKind::Worker => &self.workers,
        }
    }

    pub(crate) const fn stock_mut(&mut self, kind: WareKind) -> &mut WareList {
        match kind {
            WareKind::Ware => &mut self.wares,
            WareKind::Worker => &mut self.workers,
        }
    }

    /// The id this warehouse's stock is offered under.
    pub const fn supply(&self) -> SupplyId {
        self.supply
    }
}

/// What a building does.
#[derive(Debug, Clone)]
pub enum BuildingRole {
    /// Produces wares.
    ProductionSite(ProductionSite),
    /// Being built.
    ConstructionSite(ConstructionSite),
    /// Stores wares and workers.
    Warehouse(Warehouse),
}

/// A building standing at a flag.
#[derive(Debug, Clone)]
pub struct Building {
    id: BuildingId,
    flag: FlagId,
    role: BuildingRole,
}

impl Building {
    /// Build the role state for a spec. Queues are empty, worker slots
    /// vacant, and no request exists until the building is attached.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ArithmeticOverflow`] if initial warehouse
    /// stock overflows a counter.
    pub fn new(id: BuildingId, flag: FlagId, spec: &BuildingSpec) -> Result<Self, TransportError> {
        let make_queues = |inputs: &[QueueSpec]| {
            inputs
                .iter()
                .map(|q| {
                    let mut queue = WaresQueue::new(id, flag, q.ware, q.size);
                    queue.set_priority(q.priority);
                    queue.set_consume_interval(q.consume_interval_ms);
                    queue
                })
                .collect()
        };
        let role = match spec {
            BuildingSpec::ProductionSite {
                worker,
                inputs,
                program,
            } => BuildingRole::ProductionSite(ProductionSite {
                queues: make_queues(inputs),
                worker: WorkerSlot::new(id, flag, *worker),
                program: program.clone(),
            }),
            BuildingSpec::ConstructionSite {
                builder,
                inputs,
                target,
            } => BuildingRole::ConstructionSite(ConstructionSite {
                queues: make_queues(inputs),
                builder: WorkerSlot::new(id, flag, *builder),
                target: target.as_ref().clone(),
            }),
            BuildingSpec::Warehouse { wares, workers } => {
                let mut ware_list = WareList::new(WareKind::Ware);
                let mut worker_list = WareList::new(WareKind::Worker);
                for e in wares {
                    ware_list.add(e.ware, e.count)?;
                }
                for e in workers {
                    worker_list.add(e.ware, e.count)?;
                }
                BuildingRole::Warehouse(Warehouse {
                    wares: ware_list,
                    workers: worker_list,
                    supply: SupplyId::new(),
                })
            }
        };
        Ok(Self { id, flag, role })
    }

    /// The building's identifier.
    pub const fn id(&self) -> BuildingId {
        self.id
    }

    /// The flag the building stands at.
    pub const fn flag(&self) -> FlagId {
        self.flag
    }

    /// Role state.
    pub const fn role(&self) -> &BuildingRole {
        &self.role
    }

    /// The building kind.
    pub const fn kind(&self) -> BuildingKind {
        match self.role {
            BuildingRole::ProductionSite(_) => BuildingKind::ProductionSite,
            BuildingRole::ConstructionSite(_) => BuildingKind::ConstructionSite,
            BuildingRole::Warehouse(_) => BuildingKind::Warehouse,
        }
    }

    /// A spec that rebuilds this building with its current queue settings
    /// and warehouse stock. Queue fill levels and worker presence are not
    /// part of a spec.
    pub fn spec(&self) -> BuildingSpec {
        let inputs = |queues: &[WaresQueue]| {
            queues
                .iter()
                .map(|q| QueueSpec {
                    ware: q.ware(),
                    size: q.size(),
                    priority: q.priority(),
                    consume_interval_ms: q.consume_interval_ms(),
                })
                .collect()
        };
        let entries = |list: &WareList| {
            list.iter()
                .map(|(ware, count)| StockEntry { ware, count })
                .collect()
        };
        match &self.role {
            BuildingRole::ProductionSite(p) => BuildingSpec::ProductionSite {
                worker: p.worker.worker(),
                inputs: inputs(&p.queues),
                program: p.program.clone(),
            },
            BuildingRole::ConstructionSite(c) => BuildingSpec::ConstructionSite {
                builder: c.builder.worker(),
                inputs: inputs(&c.queues),
                target: Box::new(c.target.clone()),
            },
            BuildingRole::Warehouse(w) => BuildingSpec::Warehouse {
                wares: entries(&w.wares),
                workers: entries(&w.workers),
            },
        }
    }

    /// Warehouse state, if this is a warehouse.
    pub const fn warehouse(&self) -> Option<&Warehouse> {
        match &self.role {
            BuildingRole::Warehouse(w) => Some(w),
            _ => None,
        }
    }

    pub(crate) const fn warehouse_mut(&mut self) -> Option<&mut Warehouse> {
        match &mut self.role {
            BuildingRole::Warehouse(w) => Some(w),
            _ => None,
        }
    }

    /// Production-site state, if this is a production site.
    pub const fn production_site(&self) -> Option<&ProductionSite> {
        match &self.role {
            BuildingRole::ProductionSite(p) => Some(p),
            _ => None,
        }
    }

    /// Construction-site state, if this is a construction site.
    pub const fn construction_site(&self) -> Option<&ConstructionSite> {
        match &self.role {
            BuildingRole::ConstructionSite(c) => Some(c),
            _ => None,
        }
    }

    /// Input queues (empty for warehouses).
    pub fn queues(&self) -> &[WaresQueue] {
        match &self.role {
            BuildingRole::ProductionSite(p) => &p.queues,
            BuildingRole::ConstructionSite(c) => &c.queues,
            BuildingRole::Warehouse(_) => &[],
        }
    }

    pub(crate) fn queues_mut(&mut self) -> &mut [WaresQueue] {
        match &mut self.role {
            BuildingRole::ProductionSite(p) => &mut p.queues,
            BuildingRole::ConstructionSite(c) => &mut c.queues,
            BuildingRole::Warehouse(_) => &mut [],
        }
    }

    /// The queue for a ware type.
    pub fn queue(&self, ware: WareIndex) -> Option<&WaresQueue> {
        self.queues().iter().find(|q| q.ware() == ware)
    }

    pub(crate) fn queue_mut(&mut self, ware: WareIndex) -> Result<&mut WaresQueue, TransportError> {
        let building = self.id;
        self.queues_mut()
            .iter_mut()
            .find(|q| q.ware() == ware)
            .ok_or(TransportError::NoSuchQueue { building, ware })
    }

    /// The worker slot (production worker or builder).
    pub const fn worker_slot(&self) -> Option<&WorkerSlot> {
        match &self.role {
            BuildingRole::ProductionSite(p) => Some(&p.worker),
            BuildingRole::ConstructionSite(c) => Some(&c.builder),
            BuildingRole::Warehouse(_) => None,
        }
    }

    pub(crate) const fn worker_slot_mut(&mut self) -> Option<&mut WorkerSlot> {
        match &mut self.role {
            BuildingRole::ProductionSite(p) => Some(&mut p.worker),
            BuildingRole::ConstructionSite(c) => Some(&mut c.builder),
            BuildingRole::Warehouse(_) => None,
        }
    }

    /// Every live request owned by this building.
    pub fn requests(&self) -> impl Iterator<Item = &Request> + '_ {
        self.queues()
            .iter()
            .filter_map(WaresQueue::request)
            .chain(self.worker_slot().and_then(WorkerSlot::request))
    }

    /// Look up one of this building's requests.
    pub fn request(&self, id: RequestId) -> Option<&Request> {
        self.requests().find(|r| r.id() == id)
    }

    pub(crate) fn request_mut(&mut self, id: RequestId) -> Option<&mut Request> {
        match &mut self.role {
            BuildingRole::ProductionSite(ProductionSite { queues, worker, .. })
            | BuildingRole::ConstructionSite(ConstructionSite {
                queues,
                builder: worker,
                ..
            }) => queues
                .iter_mut()
                .filter_map(WaresQueue::request_mut)
                .chain(worker.request_mut())
                .find(|r| r.id() == id),
            BuildingRole::Warehouse(_) => None,
        }
    }

    /// Reconcile every queue and the worker slot with their requests.
    pub(crate) fn update_requests(&mut self, mut economy: Option<&mut Economy>) -> Vec<TransferId> {
        let mut orphaned = Vec::new();
        for queue in self.queues_mut() {
            orphaned.extend(queue.update(economy.as_deref_mut()));
        }
        if let Some(slot) = self.worker_slot_mut() {
            orphaned.extend(slot.update(economy));
        }
        orphaned
    }

    /// Register the building with an economy: requests, and for a
    /// warehouse its stock and supply.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ArithmeticOverflow`] if economy stock
    /// overflows.
    pub(crate) fn attach(&mut self, economy: &mut Economy) -> Result<(), TransportError> {
        self.update_requests(Some(&mut *economy));
        if let BuildingRole::Warehouse(w) = &self.role {
            economy.deposit_stock(&w.wares, &w.workers)?;
            economy.add_warehouse(self.id);
            economy.add_supply(w.supply, SupplyHandle::Warehouse(self.id));
        }
        Ok(())
    }

    /// Unregister the building from its economy. Returns transfers whose
    /// request was withdrawn.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::QueueNotDrained`] if a queue still holds
    /// units; nothing changes in that case.
    pub(crate) fn detach(&mut self, economy: &mut Economy) -> Result<Vec<TransferId>, TransportError> {
        if let Some(q) = self.queues().iter().find(|q| q.filled() > 0) {
            return Err(TransportError::QueueNotDrained {
                building: self.id,
                ware: q.ware(),
                filled: q.filled(),
            });
        }
        let mut orphaned = Vec::new();
        for queue in self.queues_mut() {
            orphaned.extend(queue.cleanup(Some(&mut *economy)).orphaned);
        }
        if let Some(slot) = self.worker_slot_mut() {
            orphaned.extend(withdraw_request(&mut slot.request, Some(&mut *economy)));
        }
        if let BuildingRole::Warehouse(w) = &self.role {
            economy.withdraw_stock(&w.wares, &w.workers)?;
            economy.remove_warehouse(self.id);
            economy.remove_supply(w.supply);
        }
        Ok(orphaned)
    }

    /// Take every stored unit out of the input queues (materials used up
    /// by construction, or salvaged before demolition).
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ArithmeticOverflow`] if the drained totals
    /// overflow.
    pub(crate) fn drain_queues(
        &mut self,
        mut economy: Option<&mut Economy>,
    ) -> Result<(WareList, Vec<TransferId>), TransportError> {
        let mut drained = WareList::new(WareKind::Ware);
        let mut orphaned = Vec::new();
        for queue in self.queues_mut() {
            let ware = queue.ware();
            let result = queue.cleanup(economy.as_deref_mut());
            drained.add(ware, result.drained)?;
            orphaned.extend(result.orphaned);
        }
        Ok((drained, orphaned))
    }
}
