//! End-to-end scenarios for economies: merge and split, target quantities,
//! wares queues, matching, and balance scheduling.
//!
//! Every test drives a [`Transport`] through its public API only.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::too_many_lines,
    clippy::arithmetic_side_effects
)]

use std::collections::{BTreeMap, BTreeSet};

use waymark_transport::{
    BuildingSpec, ConservationResult, Destination, ProductionProgram, QueueSpec, Route,
    RouteFinder, StockTotals, SupplyHandle, Transport, TransportConfig, Tribe, WareDescription,
    verify_conservation, verify_partition, within_cutoff,
};
use waymark_types::{
    BuildingId, Coords, EconomyId, FlagId, PlayerId, RequestId, RequestPriority, SupplyId,
    WareIndex,
};

const LOG: WareIndex = WareIndex(0);
const LUMBERJACK: WareIndex = WareIndex(2);
const BUILDER: WareIndex = WareIndex(1);
const FELLING_AX: WareIndex = WareIndex(10);

fn transport() -> Transport {
    Transport::new(PlayerId::new(), Tribe::default(), TransportConfig::default())
}

/// A site with one log queue of `size` whose worker is irrelevant here.
fn log_consumer(size: u32) -> BuildingSpec {
    BuildingSpec::ProductionSite {
        worker: LUMBERJACK,
        inputs: vec![QueueSpec {
            ware: LOG,
            size,
            priority: RequestPriority::Normal,
            consume_interval_ms: 0,
        }],
        program: ProductionProgram {
            inputs: Vec::new(),
            output: None,
            duration_ms: 1000,
        },
    }
}

/// A site with no inputs that only waits for its `worker`.
fn staffed_site(worker: WareIndex) -> BuildingSpec {
    BuildingSpec::ProductionSite {
        worker,
        inputs: Vec::new(),
        program: ProductionProgram {
            inputs: Vec::new(),
            output: None,
            duration_ms: 1000,
        },
    }
}

/// Flags in a row at `y`, joined by roads of cost 2.
fn row(t: &mut Transport, y: i32, n: i32) -> Vec<FlagId> {
    let flags: Vec<FlagId> = (0..n).map(|x| t.add_flag(Coords::new(x, y)).unwrap()).collect();
    for pair in flags.windows(2) {
        t.build_road(pair[0], pair[1], 2, 0).unwrap();
    }
    flags
}

/// Registered requests, supplies, and warehouses of an economy.
fn contents(
    t: &Transport,
    economy: EconomyId,
) -> (BTreeSet<RequestId>, BTreeSet<SupplyId>, BTreeSet<BuildingId>) {
    let e = t.economy(economy).unwrap();
    (
        e.requests().keys().copied().collect(),
        e.supplies().keys().copied().collect(),
        e.warehouses().clone(),
    )
}

#[test]
fn merge_then_split_restores_both_economies() {
    let mut t = transport();
    let a = row(&mut t, 0, 3);
    let b = row(&mut t, 5, 2);
    t.build_building(a[0], &BuildingSpec::warehouse_with(&[(LOG, 4)], &[]), 0)
        .unwrap();
    t.build_building(a[2], &log_consumer(3), 0).unwrap();
    t.build_building(b[1], &BuildingSpec::warehouse_with(&[(LOG, 9)], &[]), 0)
        .unwrap();
    t.drop_ware_at_flag(b[0], LOG, 0).unwrap();

    let ea = t.flag_economy(a[0]).unwrap();
    let eb = t.flag_economy(b[0]).unwrap();
    let before_a = contents(&t, ea);
    let before_b = contents(&t, eb);
    let totals = StockTotals::capture(&t);

    let bridge = t.build_road(a[2], b[0], 5, 10).unwrap();
    assert_eq!(t.economy_count(), 1);
    let merged = t.flag_economy(a[0]).unwrap();
    let (requests, supplies, warehouses) = contents(&t, merged);
    assert_eq!(t.economy(merged).unwrap().flag_count(), 5);
    assert_eq!(requests, &before_a.0 | &before_b.0);
    assert_eq!(supplies, &before_a.1 | &before_b.1);
    assert_eq!(warehouses, &before_a.2 | &before_b.2);
    assert_eq!(t.stock_ware(merged, LOG).unwrap(), 13);

    t.remove_road(bridge, 20).unwrap().unwrap();
    assert_eq!(t.economy_count(), 2);
    let ea = t.flag_economy(a[0]).unwrap();
    let eb = t.flag_economy(b[0]).unwrap();
    assert_ne!(ea, eb);
    assert_eq!(t.economy(ea).unwrap().flag_count(), 3);
    assert_eq!(t.economy(eb).unwrap().flag_count(), 2);
    assert_eq!(contents(&t, ea), before_a);
    assert_eq!(contents(&t, eb), before_b);
    assert_eq!(t.stock_ware(ea, LOG).unwrap(), 4);
    assert_eq!(t.stock_ware(eb, LOG).unwrap(), 9);

    assert!(verify_partition(&t).is_empty());
    assert_eq!(
        verify_conservation(&totals, &StockTotals::capture(&t)),
        ConservationResult::Balanced
    );
}

#[test]
fn split_copies_target_quantities() {
    let mut t = transport();
    let flags = row(&mut t, 0, 2);
    let economy = t.flag_economy(flags[0]).unwrap();
    t.set_target_quantity(economy, LOG, 3, 7, 50).unwrap();

    let road = t.network().roads().next().unwrap().id();
    let other = t.remove_road(road, 60).unwrap().unwrap();
    for id in [economy, other] {
        let target = t.target_quantity(id, LOG).unwrap();
        assert_eq!((target.permanent, target.temporary, target.last_modified), (3, 7, 50));
    }
}

#[test]
fn temporary_target_decays_by_consumed_units_down_to_permanent() {
    let mut t = transport();
    let flag = t.add_flag(Coords::new(0, 0)).unwrap();
    let warehouse = t
        .build_building(flag, &BuildingSpec::warehouse_with(&[(LOG, 20)], &[]), 0)
        .unwrap();
    let economy = t.flag_economy(flag).unwrap();
    t.set_target_quantity(economy, LOG, 4, 9, 1).unwrap();

    for k in [2_u32, 1, 5] {
        let before = t.target_quantity(economy, LOG).unwrap().temporary;
        t.remove_wares(warehouse, LOG, k).unwrap();
        let after = t.target_quantity(economy, LOG).unwrap();
        assert_eq!(before - after.temporary, k.min(before - after.permanent));
        assert!(after.temporary >= after.permanent);
    }
    assert_eq!(t.target_quantity(economy, LOG).unwrap().temporary, 4);
}

#[test]
fn needs_ware_after_construction_follows_initial_target() {
    let mut tribe = Tribe::default();
    tribe.wares.push(WareDescription {
        name: String::from("marble"),
        default_target_quantity: 0,
        preciousness: 1,
    });
    let marble = tribe.ware_index("marble").unwrap();
    let mut t = Transport::new(PlayerId::new(), tribe, TransportConfig::default());
    let flag = t.add_flag(Coords::new(0, 0)).unwrap();
    let economy = t.flag_economy(flag).unwrap();

    assert!(t.needs_ware(economy, LOG).unwrap());
    assert!(!t.needs_ware(economy, marble).unwrap());
}

#[test]
fn merged_target_is_the_more_recent_setting() {
    let mut t = transport();
    let a = t.add_flag(Coords::new(0, 0)).unwrap();
    let b = t.add_flag(Coords::new(4, 0)).unwrap();
    t.build_building(a, &BuildingSpec::warehouse_with(&[], &[]), 0)
        .unwrap();
    t.build_building(b, &BuildingSpec::warehouse_with(&[], &[]), 0)
        .unwrap();
    let ea = t.flag_economy(a).unwrap();
    let eb = t.flag_economy(b).unwrap();
    t.set_target_quantity(ea, LOG, 1, 30, 10).unwrap();
    t.set_target_quantity(eb, LOG, 1, 5, 20).unwrap();

    t.build_road(a, b, 4, 30).unwrap();
    let merged = t.flag_economy(a).unwrap();
    let target = t.target_quantity(merged, LOG).unwrap();
    assert_eq!((target.permanent, target.temporary, target.last_modified), (1, 5, 20));
}

#[test]
fn full_queue_holds_no_request_until_a_unit_is_used() {
    let mut t = transport();
    let flags = row(&mut t, 0, 2);
    t.build_building(flags[0], &BuildingSpec::warehouse_with(&[(LOG, 10)], &[]), 0)
        .unwrap();
    let site = t.build_building(flags[1], &log_consumer(5), 0).unwrap();
    let economy = t.flag_economy(flags[0]).unwrap();

    let transfers = t.balance_economy(economy, 0).unwrap();
    assert_eq!(transfers.len(), 5);
    for transfer in &transfers {
        assert!(t.finish_transfer(transfer.id, 100).unwrap().is_empty());
    }
    let queue = t.building(site).unwrap().queue(LOG).unwrap();
    assert_eq!((queue.size(), queue.filled()), (5, 5));
    assert!(queue.request().is_none());

    t.consume_from_queue(site, LOG, 1, 200).unwrap();
    let queue = t.building(site).unwrap().queue(LOG).unwrap();
    let request = queue.request().unwrap();
    assert_eq!(request.count(), 1);
    assert_eq!(t.economy(economy).unwrap().requests().len(), 2);
}

#[test]
fn missing_worker_is_made_from_warehouse_tools() {
    let mut t = transport();
    let flags = row(&mut t, 0, 3);
    let warehouse = t
        .build_building(
            flags[0],
            &BuildingSpec::warehouse_with(&[(FELLING_AX, 2)], &[]),
            0,
        )
        .unwrap();
    let site = t.build_building(flags[1], &staffed_site(LUMBERJACK), 0).unwrap();
    let idle = t.build_building(flags[2], &staffed_site(BUILDER), 0).unwrap();
    let economy = t.flag_economy(flags[0]).unwrap();
    t.set_target_quantity(economy, FELLING_AX, 1, 3, 5).unwrap();

    let transfers = t.balance_economy(economy, 10).unwrap();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].destination.building(), site);

    let stock = t.building(warehouse).unwrap().warehouse().unwrap();
    assert_eq!(stock.wares().stock(FELLING_AX), 1);
    assert_eq!(stock.workers().stock(LUMBERJACK), 0);
    assert_eq!(t.stock_ware(economy, FELLING_AX).unwrap(), 1);
    assert_eq!(t.stock_worker(economy, LUMBERJACK).unwrap(), 0);
    assert_eq!(t.target_quantity(economy, FELLING_AX).unwrap().temporary, 2);
    assert_eq!(t.stock_worker(economy, BUILDER).unwrap(), 0);

    t.finish_transfer(transfers[0].id, 100).unwrap();
    let building = t.building(site).unwrap();
    assert!(building.production_site().unwrap().worker().is_present());
    let waiting = t.building(idle).unwrap();
    assert!(!waiting.production_site().unwrap().worker().is_present());

    // The second tool stays put: nobody else asks for a lumberjack.
    assert!(t.balance_economy(economy, 200).unwrap().is_empty());
    assert_eq!(t.stock_ware(economy, FELLING_AX).unwrap(), 1);
}

#[test]
fn worker_without_tools_is_not_created() {
    let mut t = transport();
    let flags = row(&mut t, 0, 2);
    t.build_building(flags[0], &BuildingSpec::warehouse_with(&[(LOG, 5)], &[]), 0)
        .unwrap();
    t.build_building(flags[1], &staffed_site(LUMBERJACK), 0)
        .unwrap();
    let economy = t.flag_economy(flags[0]).unwrap();

    assert_eq!(t.create_requested_workers(economy).unwrap(), 0);
    assert!(t.balance_economy(economy, 0).unwrap().is_empty());
    assert_eq!(t.stock_ware(economy, LOG).unwrap(), 5);
    assert_eq!(t.stock_worker(economy, LUMBERJACK).unwrap(), 0);
}

/// Route finder answering from a fixed cost table.
struct StubFinder {
    costs: BTreeMap<(FlagId, FlagId), u32>,
}

impl RouteFinder for StubFinder {
    fn find_route(
        &self,
        start: FlagId,
        end: FlagId,
        _wait: bool,
        cost_cutoff: Option<u32>,
    ) -> Option<Route> {
        let cost = *self.costs.get(&(start, end))?;
        within_cutoff(cost, cost_cutoff).then(|| Route {
            flags: vec![start, end],
            roads: Vec::new(),
            cost,
        })
    }
}

#[test]
fn request_takes_cheaper_supply_and_leaves_the_other() {
    let config = TransportConfig {
        cost_cutoff: Some(10),
        ..TransportConfig::default()
    };
    let mut t = Transport::new(PlayerId::new(), Tribe::default(), config);
    let flags = row(&mut t, 0, 4);
    let (target, near, far, second) = (flags[0], flags[1], flags[2], flags[3]);
    let near_supply = t.drop_ware_at_flag(near, LOG, 0).unwrap();
    let far_supply = t.drop_ware_at_flag(far, LOG, 0).unwrap();
    let first_site = t.build_building(target, &log_consumer(1), 0).unwrap();
    let economy = t.flag_economy(target).unwrap();

    let finder = StubFinder {
        costs: BTreeMap::from([
            ((near, target), 3),
            ((far, target), 7),
            ((near, second), 3),
            ((far, second), 7),
        ]),
    };

    let transfers = t.balance_economy_with(economy, &finder, 0).unwrap();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].supply, near_supply);
    assert_eq!(transfers[0].route.cost, 3);
    assert!(matches!(
        transfers[0].destination,
        Destination::Request { building, .. } if building == first_site
    ));
    let waiting = t.network().flag(far).unwrap().ware_by_supply(far_supply).unwrap();
    assert!(waiting.reserved_by.is_none());

    let second_site = t.build_building(second, &log_consumer(1), 0).unwrap();
    let transfers = t.balance_economy_with(economy, &finder, 0).unwrap();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].supply, far_supply);
    assert_eq!(transfers[0].source, SupplyHandle::Flag(far));
    assert_eq!(transfers[0].destination.building(), second_site);
}

#[test]
fn stale_balance_command_is_dropped_after_merge() {
    let mut t = transport();
    let a = t.add_flag(Coords::new(0, 0)).unwrap();
    let b = t.add_flag(Coords::new(3, 0)).unwrap();
    let ea = t.flag_economy(a).unwrap();
    t.request_balance(ea, 0).unwrap();
    assert_eq!(t.scheduler().next_due(), Some(200));

    t.build_road(a, b, 3, 100).unwrap();
    let merged = t.flag_economy(a).unwrap();
    let token = t.economy(merged).unwrap().pending_balance();
    assert!(token.is_some());

    // The command issued before the merge is due first and must not run.
    t.run_due_balances(250).unwrap();
    assert_eq!(t.economy(merged).unwrap().pending_balance(), token);
    assert_eq!(t.scheduler().len(), 1);

    t.run_due_balances(300).unwrap();
    assert_eq!(t.economy(merged).unwrap().pending_balance(), None);
    assert!(t.scheduler().is_empty());
}

#[test]
fn failed_transfer_returns_unit_without_touching_targets() {
    let mut t = transport();
    let flags = row(&mut t, 0, 2);
    let warehouse = t
        .build_building(flags[0], &BuildingSpec::warehouse_with(&[(LOG, 3)], &[]), 0)
        .unwrap();
    t.build_building(flags[1], &log_consumer(1), 0).unwrap();
    let economy = t.flag_economy(flags[0]).unwrap();
    t.set_target_quantity(economy, LOG, 0, 6, 1).unwrap();
    let totals = StockTotals::capture(&t);

    let transfers = t.balance_economy(economy, 0).unwrap();
    assert_eq!(transfers.len(), 1);
    assert_eq!(t.stock_ware(economy, LOG).unwrap(), 2);
    assert_eq!(t.target_quantity(economy, LOG).unwrap().temporary, 5);
    assert_eq!(
        verify_conservation(&totals, &StockTotals::capture(&t)),
        ConservationResult::Balanced
    );

    t.fail_transfer(transfers[0].id, 50).unwrap();
    assert_eq!(t.stock_ware(economy, LOG).unwrap(), 3);
    let stored = t.building(warehouse).unwrap().warehouse().unwrap().wares().stock(LOG);
    assert_eq!(stored, 3);
    assert_eq!(t.target_quantity(economy, LOG).unwrap().temporary, 5);
    assert!(t.transfers().next().is_none());
}

#[test]
fn destroying_a_target_orphans_its_transfers() {
    let mut t = transport();
    let flags = row(&mut t, 0, 2);
    t.build_building(flags[0], &BuildingSpec::warehouse_with(&[(LOG, 3)], &[]), 0)
        .unwrap();
    let site = t.build_building(flags[1], &log_consumer(2), 0).unwrap();
    let economy = t.flag_economy(flags[0]).unwrap();
    let transfers = t.balance_economy(economy, 0).unwrap();
    assert_eq!(transfers.len(), 2);

    let orphaned = t.destroy_building(site, 10).unwrap();
    let expected: BTreeSet<_> = transfers.iter().map(|tr| tr.id).collect();
    assert_eq!(orphaned.into_iter().collect::<BTreeSet<_>>(), expected);
    for id in expected {
        t.fail_transfer(id, 20).unwrap();
    }
    assert_eq!(t.stock_ware(economy, LOG).unwrap(), 3);
    assert!(t.economy(economy).unwrap().requests().is_empty());
}

#[test]
fn idle_flag_ware_is_carried_to_a_warehouse() {
    let mut t = transport();
    let flags = row(&mut t, 0, 3);
    let warehouse = t
        .build_building(flags[2], &BuildingSpec::warehouse_with(&[], &[]), 0)
        .unwrap();
    t.drop_ware_at_flag(flags[0], LOG, 0).unwrap();
    let economy = t.flag_economy(flags[0]).unwrap();

    let transfers = t.balance_economy(economy, 0).unwrap();
    assert_eq!(transfers.len(), 1);
    assert_eq!(transfers[0].destination, Destination::Warehouse(warehouse));
    assert_eq!(transfers[0].route.cost, 4);

    t.finish_transfer(transfers[0].id, 100).unwrap();
    assert!(t.network().flag(flags[0]).unwrap().wares().is_empty());
    assert_eq!(t.stock_ware(economy, LOG).unwrap(), 1);
    assert_eq!(t.economy(economy).unwrap().supplies().len(), 1);
}

#[test]
fn completed_construction_site_becomes_its_target() {
    let mut t = transport();
    let flags = row(&mut t, 0, 2);
    t.build_building(
        flags[0],
        &BuildingSpec::warehouse_with(&[(LOG, 2)], &[(WareIndex(1), 1)]),
        0,
    )
    .unwrap();
    let site_spec = BuildingSpec::ConstructionSite {
        builder: WareIndex(1),
        inputs: vec![QueueSpec {
            ware: LOG,
            size: 2,
            priority: RequestPriority::Normal,
            consume_interval_ms: 0,
        }],
        target: Box::new(log_consumer(4)),
    };
    let site = t.build_building(flags[1], &site_spec, 0).unwrap();
    let economy = t.flag_economy(flags[0]).unwrap();

    let transfers = t.balance_economy(economy, 0).unwrap();
    assert_eq!(transfers.len(), 3);
    for transfer in &transfers {
        t.finish_transfer(transfer.id, 50).unwrap();
    }
    assert!(t.building(site).unwrap().construction_site().unwrap().is_complete());

    let (built, orphaned) = t.complete_construction(site, 60).unwrap();
    assert!(orphaned.is_empty());
    assert!(t.building(site).is_none());
    let building = t.building(built).unwrap();
    assert_eq!(building.flag(), flags[1]);
    assert_eq!(building.queue(LOG).unwrap().size(), 4);
}
