//! Integration tests for the Waymark tick loop.
//!
//! These run generated and hand-written scenarios for many ticks with the
//! timed carriers and check the transport layer stays consistent.

#![allow(
    clippy::expect_used,
    clippy::unwrap_used,
    clippy::items_after_statements,
    clippy::missing_panics_doc,
    clippy::too_many_lines,
    clippy::indexing_slicing
)]

use std::path::Path;

use waymark_core::carrier::TimedCarriers;
use waymark_core::clock::GameClock;
use waymark_core::config::SimulationConfig;
use waymark_core::scenario::{Scenario, generate_grid_scenario};
use waymark_core::tick::{SimulationState, run_tick};
use waymark_transport::{Transport, TransportConfig, TransportSnapshot, Tribe, verify_partition};
use waymark_types::PlayerId;

fn grid_state(rows: u32, cols: u32, seed: u64) -> SimulationState {
    let tribe = Tribe::default();
    let mut transport = Transport::new(PlayerId::new(), tribe.clone(), TransportConfig::default());
    let scenario = generate_grid_scenario(rows, cols, seed, &tribe)
        .apply(&mut transport, 0)
        .expect("generated scenario applies");
    SimulationState::new(GameClock::from_parts(0, 250).unwrap(), transport, scenario)
}

#[test]
fn grid_runs_through_split_and_merge() {
    let mut state = grid_state(4, 4, 42);
    let mut carriers = TimedCarriers::new(200);

    let mut delivered = 0_u32;
    let mut dispatched = 0_u32;
    let mut events = 0_u32;
    for _ in 0..160 {
        let summary = run_tick(&mut state, &mut carriers).expect("tick succeeds");
        delivered = delivered.saturating_add(summary.delivered);
        dispatched = dispatched.saturating_add(summary.dispatched);
        events = events.saturating_add(summary.events);
    }

    assert_eq!(events, 2);
    assert!(dispatched > 0);
    assert!(delivered > 0);
    assert!(delivered <= dispatched);
    // The cut road was rebuilt at tick 120.
    assert_eq!(state.transport.economy_count(), 1);
    assert!(verify_partition(&state.transport).is_empty());
}

#[test]
fn same_seed_same_run() {
    let run = |seed| {
        let mut state = grid_state(3, 3, seed);
        let mut carriers = TimedCarriers::new(150);
        (0..80)
            .map(|_| {
                let s = run_tick(&mut state, &mut carriers).unwrap();
                (s.delivered, s.dispatched, s.produced, s.economies)
            })
            .collect::<Vec<_>>()
    };
    assert_eq!(run(5), run(5));
}

#[test]
fn snapshot_mid_run_restores_consistent_network() {
    let mut state = grid_state(3, 4, 9);
    let mut carriers = TimedCarriers::new(200);
    for _ in 0..30 {
        run_tick(&mut state, &mut carriers).unwrap();
    }

    let now = state.clock.now_ms();
    let snapshot = state.transport.snapshot(now);
    let json = snapshot.to_json().unwrap();
    let restored = Transport::restore(
        TransportSnapshot::from_json(&json).unwrap(),
        state.transport.tribe().clone(),
    )
    .unwrap();

    assert_eq!(restored.economy_count(), state.transport.economy_count());
    assert_eq!(restored.network().flag_count(), state.transport.network().flag_count());
    assert_eq!(restored.network().road_count(), state.transport.network().road_count());
    assert_eq!(restored.buildings().count(), state.transport.buildings().count());
    assert!(restored.transfers().next().is_none());
    assert!(verify_partition(&restored).is_empty());

    // The restored network keeps running with fresh carriers.
    let mut resumed = SimulationState::new(
        GameClock::from_parts(state.clock.tick(), 250).unwrap(),
        restored,
        Default::default(),
    );
    let mut fresh = TimedCarriers::new(200);
    for _ in 0..20 {
        run_tick(&mut resumed, &mut fresh).unwrap();
    }
}

#[test]
fn project_scenarios_load_and_run() {
    let root = Path::new(env!("CARGO_MANIFEST_DIR")).join("..").join("..");
    let config_path = root.join("waymark-config.yaml");
    let config = if config_path.exists() {
        SimulationConfig::from_file(&config_path).unwrap()
    } else {
        SimulationConfig::default()
    };

    let Ok(entries) = std::fs::read_dir(root.join("scenarios")) else {
        return;
    };
    for entry in entries {
        let path = entry.unwrap().path();
        if path.extension().is_none_or(|ext| ext != "yaml") {
            continue;
        }
        let scenario = Scenario::from_file(&path)
            .unwrap_or_else(|e| panic!("{} does not parse: {e}", path.display()));
        let mut transport = Transport::new(
            PlayerId::new(),
            config.tribe.clone(),
            config.transport.network.clone(),
        );
        let loaded = scenario
            .apply(&mut transport, 0)
            .unwrap_or_else(|e| panic!("{} does not apply: {e}", path.display()));
        let mut state = SimulationState::new(GameClock::new(&config.world).unwrap(), transport, loaded);
        let mut carriers = TimedCarriers::new(config.transport.carrier_ms_per_step);
        for _ in 0..200 {
            run_tick(&mut state, &mut carriers)
                .unwrap_or_else(|e| panic!("{} failed: {e}", path.display()));
        }
    }
}
