//! The matching pass: pairing open requests with available supplies.
//!
//! A pass runs for one economy at a time. [`plan_balance`] is the pure
//! core: given snapshots of the open requests and the available supplies
//! it asks a [`RouteFinder`] for every same-type pair, ranks the feasible
//! candidates by cost, and allocates units greedily, highest priority
//! first. [`Transport::balance_economy`] gathers the snapshots, plans, and
//! commits the plan as [`Transfer`]s.
//!
//! Stock can change between the snapshot and the commit (nothing does in
//! this single-threaded model, but supplies are never trusted), so every
//! planned unit is re-validated before it is committed.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use tracing::{debug, info};
use waymark_types::{
    BuildingId, EconomyId, FlagId, RequestId, RequestPriority, SupplyId, TransferId, WareIndex,
    WareKind,
};

use crate::error::TransportError;
use crate::route::{Route, RouteFinder, within_cutoff};
use crate::route_cache::CachedRouteFinder;
use crate::supply::{Supply, SupplyHandle};
use crate::transfer::{Destination, Transfer};
use crate::transport::Transport;

/// An open request as seen by a matching pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestCandidate {
    /// The request.
    pub request: RequestId,
    /// The building owning it.
    pub building: BuildingId,
    /// Ware or worker.
    pub kind: WareKind,
    /// Requested type.
    pub ware: WareIndex,
    /// Where units must be brought.
    pub flag: FlagId,
    /// Priority class.
    pub priority: RequestPriority,
    /// Units still wanted.
    pub open: u32,
}

/// One type of unit a supply can hand out, as seen by a matching pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplyCandidate {
    /// The supply.
    pub supply: SupplyId,
    /// Where the supply lives.
    pub source: SupplyHandle,
    /// Ware or worker.
    pub kind: WareKind,
    /// Offered type.
    pub ware: WareIndex,
    /// Where units leave from.
    pub flag: FlagId,
    /// Active supplies must move now and only use walkable routes.
    pub active: bool,
    /// Units available at snapshot time.
    pub available: u32,
}

/// One unit the pass decided to move.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedTransfer {
    /// Where the unit goes.
    pub destination: Destination,
    /// The supply giving the unit.
    pub supply: SupplyId,
    /// Where that supply lives.
    pub source: SupplyHandle,
    /// Ware or worker.
    pub kind: WareKind,
    /// Type of the unit.
    pub ware: WareIndex,
    /// Route from the supply's flag to the destination's flag.
    pub route: Route,
}

/// Result of planning one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalancePlan {
    /// Units to move, in allocation order.
    pub transfers: Vec<PlannedTransfer>,
    /// Requests that received nothing this pass.
    pub unmatched: Vec<RequestId>,
}

/// A feasible (request, supply) pair.
struct Candidate {
    cost: u32,
    active: bool,
    supply: SupplyId,
    index: usize,
    route: Route,
}

/// Plan a matching pass.
///
/// Requests are served in priority order (high first); within a class the
/// request with the fewest candidates that still have stock goes first,
/// then the smaller request id. Each request takes units from its
/// cheapest candidates. Ties in cost prefer active supplies, then the
/// smaller supply id. Candidates farther than `cost_cutoff` are ignored.
pub fn plan_balance(
    requests: &[RequestCandidate],
    supplies: &[SupplyCandidate],
    finder: &dyn RouteFinder,
    cost_cutoff: Option<u32>,
) -> BalancePlan {
    let mut candidates: Vec<Vec<Candidate>> = requests
        .iter()
        .map(|request| {
            let mut list: Vec<Candidate> = supplies
                .iter()
                .enumerate()
                .filter(|(_, s)| s.kind == request.kind && s.ware == request.ware && s.available > 0)
                .filter_map(|(index, s)| {
                    let route = finder.find_route(s.flag, request.flag, !s.active, cost_cutoff)?;
                    within_cutoff(route.cost, cost_cutoff).then_some(Candidate {
                        cost: route.cost,
                        active: s.active,
                        supply: s.supply,
                        index,
                        route,
                    })
                })
                .collect();
            list.sort_by_key(|c| (c.cost, !c.active, c.supply));
            list
        })
        .collect();

    let mut remaining: Vec<u32> = supplies.iter().map(|s| s.available).collect();
    let mut pending: Vec<usize> = (0..requests.len()).collect();
    let mut plan = BalancePlan::default();

    while !pending.is_empty() {
        let live = |i: usize| {
            candidates.get(i).map_or(0, |list| {
                list.iter()
                    .filter(|c| remaining.get(c.index).is_some_and(|&n| n > 0))
                    .count()
            })
        };
        let Some((slot, next)) = pending
            .iter()
            .copied()
            .enumerate()
            .filter_map(|(slot, i)| requests.get(i).map(|r| (slot, i, r)))
            .min_by_key(|(_, i, r)| (Reverse(r.priority), live(*i), r.request))
            .map(|(slot, i, _)| (slot, i))
        else {
            break;
        };
        pending.swap_remove(slot);

        let (Some(request), Some(list)) = (requests.get(next), candidates.get_mut(next)) else {
            continue;
        };
        let mut open = request.open;
        for candidate in list.drain(..) {
            if open == 0 {
                break;
            }
            let (Some(left), Some(supply)) = (
                remaining.get_mut(candidate.index),
                supplies.get(candidate.index),
            ) else {
                continue;
            };
            let take = open.min(*left);
            for _ in 0..take {
                plan.transfers.push(PlannedTransfer {
                    destination: Destination::Request {
                        request: request.request,
                        building: request.building,
                    },
                    supply: supply.supply,
                    source: supply.source,
                    kind: supply.kind,
                    ware: supply.ware,
                    route: candidate.route.clone(),
                });
            }
            *left = left.saturating_sub(take);
            open = open.saturating_sub(take);
        }
        if open == request.open {
            plan.unmatched.push(request.request);
        }
    }

    plan
}

/// Send every flag ware nobody claimed to the cheapest reachable warehouse.
///
/// Flag wares block their flag's buffer, so they never stay put just
/// because no building wants them.
fn plan_idle_wares(
    supplies: &[SupplyCandidate],
    plan: &BalancePlan,
    warehouses: &[(BuildingId, FlagId)],
    finder: &dyn RouteFinder,
    cost_cutoff: Option<u32>,
) -> Vec<PlannedTransfer> {
    supplies
        .iter()
        .filter(|s| s.active && !plan.transfers.iter().any(|t| t.supply == s.supply))
        .filter_map(|s| {
            let (building, route) = warehouses
                .iter()
                .filter_map(|&(building, flag)| {
                    finder
                        .find_route(s.flag, flag, false, cost_cutoff)
                        .map(|route| (building, route))
                })
                .min_by_key(|(building, route)| (route.cost, *building))?;
            Some(PlannedTransfer {
                destination: Destination::Warehouse(building),
                supply: s.supply,
                source: s.source,
                kind: s.kind,
                ware: s.ware,
                route,
            })
        })
        .collect()
}

impl Transport {
    /// Snapshot the open requests and available supplies of an economy.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::EconomyNotFound`] for unknown economies.
    pub fn gather_candidates(
        &self,
        economy: EconomyId,
    ) -> Result<(Vec<RequestCandidate>, Vec<SupplyCandidate>), TransportError> {
        let economy = self.require_economy(economy)?;

        let requests = economy
            .requests()
            .iter()
            .filter_map(|(&id, building)| self.buildings.get(building)?.request(id))
            .filter(|r| r.is_open())
            .map(|r| RequestCandidate {
                request: r.id(),
                building: r.target_building(),
                kind: r.kind(),
                ware: r.ware(),
                flag: r.target_flag(),
                priority: r.priority(),
                open: r.open_count(),
            })
            .collect();

        let mut supplies = Vec::new();
        for (&id, &handle) in economy.supplies() {
            let Some(supply) = Supply::resolve(id, handle, &self.network, &self.buildings) else {
                continue;
            };
            let candidate = |kind, ware, available| SupplyCandidate {
                supply: id,
                source: handle,
                kind,
                ware,
                flag: supply.position(),
                active: supply.is_active(),
                available,
            };
            match supply {
                Supply::Warehouse { warehouse, .. } => {
                    for (ware, count) in warehouse.wares().iter() {
                        supplies.push(candidate(WareKind::Ware, ware, count));
                    }
                    for (worker, count) in warehouse.workers().iter() {
                        supplies.push(candidate(WareKind::Worker, worker, count));
                    }
                }
                Supply::Flag { ware, .. } => {
                    if ware.reserved_by.is_none() {
                        supplies.push(candidate(WareKind::Ware, ware.ware, 1));
                    }
                }
            }
        }
        Ok((requests, supplies))
    }

    /// Run a matching pass over an economy using the road network and the
    /// economy's route cache. Returns the transfers created.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::EconomyNotFound`] for unknown economies.
    pub fn balance_economy(
        &mut self,
        economy: EconomyId,
        now: u64,
    ) -> Result<Vec<Transfer>, TransportError> {
        self.create_requested_workers(economy)?;
        let e = self.require_economy_mut(economy)?;
        let cycle = e.rebuild_cycle();
        let mut cache = e.take_route_cache();
        let plan = {
            let finder = CachedRouteFinder::new(&self.network, &mut cache, cycle);
            self.plan_economy(economy, &finder)
        };
        self.require_economy_mut(economy)?.put_route_cache(cache);
        self.commit_plan(economy, plan?, now)
    }

    /// Run a matching pass with a caller-provided pathfinder.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::EconomyNotFound`] for unknown economies.
    pub fn balance_economy_with(
        &mut self,
        economy: EconomyId,
        finder: &dyn RouteFinder,
        now: u64,
    ) -> Result<Vec<Transfer>, TransportError> {
        self.create_requested_workers(economy)?;
        let plan = self.plan_economy(economy, finder)?;
        self.commit_plan(economy, plan, now)
    }

    /// Turn warehouse stock into workers that open requests ask for but
    /// no warehouse holds. Returns the number of workers created.
    ///
    /// Each worker consumes its tribe build cost from a single warehouse;
    /// warehouses are tried in ID order. Workers without a build cost are
    /// never created.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::EconomyNotFound`] for unknown economies.
    pub fn create_requested_workers(&mut self, economy: EconomyId) -> Result<u32, TransportError> {
        let e = self.require_economy(economy)?;
        let mut demand: BTreeMap<WareIndex, u32> = BTreeMap::new();
        for r in e
            .requests()
            .iter()
            .filter_map(|(&id, building)| self.buildings.get(building)?.request(id))
            .filter(|r| r.is_open() && r.kind() == WareKind::Worker)
        {
            let open = demand.entry(r.ware()).or_insert(0);
            *open = open.saturating_add(r.open_count());
        }
        let shortfalls: Vec<(WareIndex, u32, Vec<(WareIndex, u32)>)> = demand
            .into_iter()
            .filter_map(|(worker, open)| {
                let missing = open.saturating_sub(e.stock_worker(worker));
                let cost = self.tribe.buildcost(worker)?;
                (missing > 0).then_some((worker, missing, cost))
            })
            .collect();
        if shortfalls.is_empty() {
            return Ok(0);
        }
        let warehouses: Vec<BuildingId> = e.warehouses().iter().copied().collect();

        let mut created = 0_u32;
        for (worker, missing, cost) in shortfalls {
            let mut made = 0_u32;
            for &warehouse in &warehouses {
                let (w, e) = self.warehouse_and_economy(warehouse)?;
                while made < missing
                    && cost
                        .iter()
                        .all(|&(ware, amount)| w.stock(WareKind::Ware).stock(ware) >= amount)
                {
                    for &(ware, amount) in &cost {
                        w.stock_mut(WareKind::Ware).remove(ware, amount)?;
                        e.remove_wares(ware, amount)?;
                    }
                    w.stock_mut(WareKind::Worker).add(worker, 1)?;
                    e.add_workers(worker, 1)?;
                    made = made.saturating_add(1);
                }
                if made == missing {
                    break;
                }
            }
            if made > 0 {
                info!(
                    economy = %economy,
                    worker = %worker,
                    created = made,
                    still_missing = missing.saturating_sub(made),
                    "workers created from warehouse stock"
                );
            }
            created = created.saturating_add(made);
        }
        Ok(created)
    }

    fn plan_economy(
        &self,
        economy: EconomyId,
        finder: &dyn RouteFinder,
    ) -> Result<BalancePlan, TransportError> {
        let (requests, supplies) = self.gather_candidates(economy)?;
        let cutoff = self.config.cost_cutoff;
        let mut plan = plan_balance(&requests, &supplies, finder, cutoff);

        let warehouses: Vec<(BuildingId, FlagId)> = self
            .require_economy(economy)?
            .warehouses()
            .iter()
            .filter_map(|&id| Some((id, self.buildings.get(&id)?.flag())))
            .collect();
        let idle = plan_idle_wares(&supplies, &plan, &warehouses, finder, cutoff);
        plan.transfers.extend(idle);
        Ok(plan)
    }

    /// Turn a plan into transfers, re-validating every unit.
    fn commit_plan(
        &mut self,
        economy: EconomyId,
        plan: BalancePlan,
        now: u64,
    ) -> Result<Vec<Transfer>, TransportError> {
        let mut created = Vec::new();
        for planned in plan.transfers {
            if !self.still_valid(&planned) {
                debug!(supply = %planned.supply, ware = %planned.ware, "planned unit no longer available");
                continue;
            }
            let id = TransferId::new();

            match planned.source {
                SupplyHandle::Warehouse(warehouse) => {
                    let (w, e) = self.warehouse_and_economy(warehouse)?;
                    w.stock_mut(planned.kind).remove(planned.ware, 1)?;
                    match planned.kind {
                        WareKind::Ware => e.remove_wares(planned.ware, 1)?,
                        WareKind::Worker => e.remove_workers(planned.ware, 1)?,
                    }
                }
                SupplyHandle::Flag(flag) => {
                    let ware = self
                        .network
                        .require_flag_mut(flag)?
                        .ware_by_supply_mut(planned.supply)
                        .ok_or(TransportError::SupplyNotFound(planned.supply))?;
                    ware.reserved_by = Some(id);
                }
            }

            if let Destination::Request { request, building } = planned.destination {
                self.buildings
                    .get_mut(&building)
                    .and_then(|b| b.request_mut(request))
                    .ok_or(TransportError::RequestNotFound(request))?
                    .add_transfer(id);
            }

            let transfer = Transfer {
                id,
                destination: planned.destination,
                supply: planned.supply,
                source: planned.source,
                kind: planned.kind,
                ware: planned.ware,
                route: planned.route,
                created_at: now,
            };
            debug!(
                transfer = %id,
                ware = %transfer.ware,
                kind = %transfer.kind,
                cost = transfer.route.cost,
                "transfer committed"
            );
            self.transfers.insert(id, transfer.clone());
            created.push(transfer);
        }

        info!(
            economy = %economy,
            transfers = created.len(),
            unmatched = plan.unmatched.len(),
            "balance pass complete"
        );
        Ok(created)
    }

    fn still_valid(&self, planned: &PlannedTransfer) -> bool {
        let destination_ok = match planned.destination {
            Destination::Request { request, building } => self
                .buildings
                .get(&building)
                .and_then(|b| b.request(request))
                .is_some_and(crate::request::Request::is_open),
            Destination::Warehouse(building) => self
                .buildings
                .get(&building)
                .is_some_and(|b| b.warehouse().is_some()),
        };
        let source_ok = match planned.source {
            SupplyHandle::Warehouse(building) => self
                .buildings
                .get(&building)
                .and_then(|b| b.warehouse())
                .is_some_and(|w| w.stock(planned.kind).stock(planned.ware) > 0),
            SupplyHandle::Flag(flag) => self
                .network
                .flag(flag)
                .and_then(|f| f.ware_by_supply(planned.supply))
                .is_some_and(|w| w.reserved_by.is_none()),
        };
        destination_ok && source_ok
    }
}
