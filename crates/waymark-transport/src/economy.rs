//! The economy: one connected component of the road graph.
//!
//! An [`Economy`] owns the bookkeeping of one component: its member flags,
//! the ids of the requests, supplies, and warehouses rooted at those flags,
//! the aggregate warehouse stock, and the target quantities. It never owns
//! the requests or supplies themselves; those live in buildings and on
//! flags and are looked up through [`Transport`].
//!
//! Merge and split are driven by [`Transport`] (see `connectivity`), which
//! moves the ids between economies with [`Economy::absorb`] and
//! [`Economy::split_off`].
//!
//! [`Transport`]: crate::Transport

use std::collections::{BTreeMap, BTreeSet};

use waymark_types::{
    BuildingId, EconomyId, FlagId, PlayerId, RequestId, SupplyId, TargetQuantity, WareIndex,
    WareKind,
};

use crate::error::TransportError;
use crate::route_cache::RouteCache;
use crate::supply::SupplyHandle;
use crate::target_quantity::TargetQuantities;
use crate::ware_list::WareList;

/// One connected component of a player's road network.
#[derive(Debug, Clone)]
pub struct Economy {
    id: EconomyId,
    owner: PlayerId,
    flags: BTreeSet<FlagId>,
    wares: WareList,
    workers: WareList,
    warehouses: BTreeSet<BuildingId>,
    requests: BTreeMap<RequestId, BuildingId>,
    supplies: BTreeMap<SupplyId, SupplyHandle>,
    targets: TargetQuantities,
    rebuild_cycle: u64,
    pending_balance: Option<u64>,
    route_cache: RouteCache,
}

impl Economy {
    /// Create an empty economy.
    pub fn new(id: EconomyId, owner: PlayerId, targets: TargetQuantities) -> Self {
        Self {
            id,
            owner,
            flags: BTreeSet::new(),
            wares: WareList::new(WareKind::Ware),
            workers: WareList::new(WareKind::Worker),
            warehouses: BTreeSet::new(),
            requests: BTreeMap::new(),
            supplies: BTreeMap::new(),
            targets,
            rebuild_cycle: 0,
            pending_balance: None,
            route_cache: RouteCache::default(),
        }
    }

    /// The economy's identifier.
    pub const fn id(&self) -> EconomyId {
        self.id
    }

    /// The owning player.
    pub const fn owner(&self) -> PlayerId {
        self.owner
    }

    // -------------------------------------------------------------------
    // Flags
    // -------------------------------------------------------------------

    /// Add a flag to the member set. Connectivity is the caller's concern.
    pub fn add_flag(&mut self, flag: FlagId) {
        self.flags.insert(flag);
    }

    /// Remove a flag from the member set.
    pub fn remove_flag(&mut self, flag: FlagId) -> bool {
        self.flags.remove(&flag)
    }

    /// Member flags in id order.
    pub const fn flags(&self) -> &BTreeSet<FlagId> {
        &self.flags
    }

    /// Whether the flag is a member.
    pub fn contains_flag(&self, flag: FlagId) -> bool {
        self.flags.contains(&flag)
    }

    /// Number of member flags.
    pub fn flag_count(&self) -> usize {
        self.flags.len()
    }

    /// Any member flag; balance commands remember one to find the
    /// economy again after merges and splits.
    pub fn any_flag(&self) -> Option<FlagId> {
        self.flags.first().copied()
    }

    // -------------------------------------------------------------------
    // Requests, supplies, warehouses
    // -------------------------------------------------------------------

    /// Register a request owned by `building`.
    pub fn add_request(&mut self, request: RequestId, building: BuildingId) {
        self.requests.insert(request, building);
    }

    /// Unregister a request.
    pub fn remove_request(&mut self, request: RequestId) -> bool {
        self.requests.remove(&request).is_some()
    }

    /// Registered requests and the buildings owning them.
    pub const fn requests(&self) -> &BTreeMap<RequestId, BuildingId> {
        &self.requests
    }

    /// Register a supply.
    pub fn add_supply(&mut self, supply: SupplyId, handle: SupplyHandle) {
        self.supplies.insert(supply, handle);
    }

    /// Unregister a supply.
    pub fn remove_supply(&mut self, supply: SupplyId) -> bool {
        self.supplies.remove(&supply).is_some()
    }

    /// Registered supplies and where to find them.
    pub const fn supplies(&self) -> &BTreeMap<SupplyId, SupplyHandle> {
        &self.supplies
    }

    /// Register a warehouse.
    pub fn add_warehouse(&mut self, warehouse: BuildingId) {
        self.warehouses.insert(warehouse);
    }

    /// Unregister a warehouse.
    pub fn remove_warehouse(&mut self, warehouse: BuildingId) -> bool {
        self.warehouses.remove(&warehouse)
    }

    /// Member warehouses.
    pub const fn warehouses(&self) -> &BTreeSet<BuildingId> {
        &self.warehouses
    }

    /// Whether any warehouse belongs to this economy.
    pub fn has_warehouse(&self) -> bool {
        !self.warehouses.is_empty()
    }

    // -------------------------------------------------------------------
    // Stock
    // -------------------------------------------------------------------

    /// Units of a ware type stored in this economy's warehouses.
    pub fn stock_ware(&self, ware: WareIndex) -> u32 {
        self.wares.stock(ware)
    }

    /// Units of a worker type stored in this economy's warehouses.
    pub fn stock_worker(&self, worker: WareIndex) -> u32 {
        self.workers.stock(worker)
    }

    /// Aggregate ware stock.
    pub const fn wares(&self) -> &WareList {
        &self.wares
    }

    /// Aggregate worker stock.
    pub const fn workers(&self) -> &WareList {
        &self.workers
    }

    /// Wares entered warehouse stock.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ArithmeticOverflow`] on counter overflow.
    pub fn add_wares(&mut self, ware: WareIndex, count: u32) -> Result<(), TransportError> {
        self.wares.add(ware, count)
    }

    /// Wares left warehouse stock; each unit lowers the temporary target.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InsufficientStock`] if the economy holds
    /// fewer units; nothing changes in that case.
    pub fn remove_wares(&mut self, ware: WareIndex, count: u32) -> Result<(), TransportError> {
        self.wares.remove(ware, count)?;
        self.targets.consume(ware, count);
        Ok(())
    }

    /// Workers entered warehouse stock.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ArithmeticOverflow`] on counter overflow.
    pub fn add_workers(&mut self, worker: WareIndex, count: u32) -> Result<(), TransportError> {
        self.workers.add(worker, count)
    }

    /// Workers left warehouse stock.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InsufficientStock`] if the economy holds
    /// fewer units.
    pub fn remove_workers(&mut self, worker: WareIndex, count: u32) -> Result<(), TransportError> {
        self.workers.remove(worker, count)
    }

    /// Add a warehouse's whole stock (a warehouse joining the economy).
    pub(crate) fn deposit_stock(&mut self, wares: &WareList, workers: &WareList) -> Result<(), TransportError> {
        self.wares.add_all(wares)?;
        self.workers.add_all(workers)
    }

    /// Take stock out without touching target quantities (a warehouse
    /// leaving the economy).
    pub(crate) fn withdraw_stock(&mut self, wares: &WareList, workers: &WareList) -> Result<(), TransportError> {
        for (ware, count) in wares.iter() {
            self.wares.remove(ware, count)?;
        }
        for (worker, count) in workers.iter() {
            self.workers.remove(worker, count)?;
        }
        Ok(())
    }

    /// Replace the aggregate stock (recomputed after a split).
    pub(crate) fn set_stock(&mut self, wares: WareList, workers: WareList) {
        self.wares = wares;
        self.workers = workers;
    }

    // -------------------------------------------------------------------
    // Target quantities
    // -------------------------------------------------------------------

    /// Whether the economy wants more of a ware: warehouse stock is below
    /// the temporary target. Unknown wares are never needed.
    pub fn needs_ware(&self, ware: WareIndex) -> bool {
        self.targets
            .get(ware)
            .is_some_and(|t| self.wares.stock(ware) < t.temporary)
    }

    /// Target quantity for a ware type.
    pub fn target_quantity(&self, ware: WareIndex) -> Option<&TargetQuantity> {
        self.targets.get(ware)
    }

    /// The whole target table.
    pub const fn targets(&self) -> &TargetQuantities {
        &self.targets
    }

    pub(crate) const fn targets_mut(&mut self) -> &mut TargetQuantities {
        &mut self.targets
    }

    // -------------------------------------------------------------------
    // Cycle, balance token, route cache
    // -------------------------------------------------------------------

    /// Counter bumped on every structural change of the economy's graph.
    pub const fn rebuild_cycle(&self) -> u64 {
        self.rebuild_cycle
    }

    pub(crate) const fn bump_rebuild_cycle(&mut self) {
        self.rebuild_cycle = self.rebuild_cycle.wrapping_add(1);
    }

    /// Token of the balance pass scheduled for this economy, if any.
    pub const fn pending_balance(&self) -> Option<u64> {
        self.pending_balance
    }

    pub(crate) const fn set_pending_balance(&mut self, token: Option<u64>) {
        self.pending_balance = token;
    }

    pub(crate) fn take_route_cache(&mut self) -> RouteCache {
        std::mem::take(&mut self.route_cache)
    }

    pub(crate) fn put_route_cache(&mut self, cache: RouteCache) {
        self.route_cache = cache;
    }

    // -------------------------------------------------------------------
    // Merge and split
    // -------------------------------------------------------------------

    /// Fold `other` into this economy. Flags, requests, supplies,
    /// warehouses, and stock are moved over; for every ware the more
    /// recently modified target quantity wins, ties keeping ours.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ArithmeticOverflow`] if stock counters
    /// overflow.
    pub(crate) fn absorb(&mut self, other: Self) -> Result<(), TransportError> {
        // Both sums are checked before anything moves.
        let wares = self.wares.union(&other.wares)?;
        let workers = self.workers.union(&other.workers)?;
        self.wares = wares;
        self.workers = workers;
        self.flags.extend(other.flags);
        self.warehouses.extend(other.warehouses);
        self.requests.extend(other.requests);
        self.supplies.extend(other.supplies);
        self.targets.merge_newer(&other.targets);
        self.bump_rebuild_cycle();
        Ok(())
    }

    /// Move the flags in `moved` and everything rooted at them into a new
    /// economy. `root_of_building` resolves the flag a building stands on;
    /// `root_of_supply` the flag a supply sits at. Target quantities are
    /// copied. Stock is left for the caller to recompute on both halves.
    pub(crate) fn split_off(
        &mut self,
        id: EconomyId,
        moved: &BTreeSet<FlagId>,
        root_of_building: impl Fn(BuildingId) -> Option<FlagId>,
        root_of_supply: impl Fn(&SupplyHandle) -> Option<FlagId>,
    ) -> Self {
        let mut other = Self::new(id, self.owner, self.targets.clone());
        let in_moved = |flag: Option<FlagId>| flag.is_some_and(|f| moved.contains(&f));

        self.flags.retain(|f| !moved.contains(f));
        other.flags.extend(moved.iter().copied());

        let (go, stay): (BTreeSet<_>, BTreeSet<_>) = std::mem::take(&mut self.warehouses)
            .into_iter()
            .partition(|b| in_moved(root_of_building(*b)));
        self.warehouses = stay;
        other.warehouses = go;

        let (go, stay): (BTreeMap<_, _>, BTreeMap<_, _>) = std::mem::take(&mut self.requests)
            .into_iter()
            .partition(|(_, b)| in_moved(root_of_building(*b)));
        self.requests = stay;
        other.requests = go;

        let (go, stay): (BTreeMap<_, _>, BTreeMap<_, _>) = std::mem::take(&mut self.supplies)
            .into_iter()
            .partition(|(_, h)| in_moved(root_of_supply(h)));
        self.supplies = stay;
        other.supplies = go;

        self.bump_rebuild_cycle();
        other.bump_rebuild_cycle();
        other
    }
}
