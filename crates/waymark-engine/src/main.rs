//! Engine binary for the Waymark transport simulation.
//!
//! Wires configuration, the starting network, the timed carriers, and the
//! tick loop together, then runs until the tick limit or Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `waymark-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Create the game clock
//! 4. Build the transport network from a scenario file or a generated grid
//! 5. Create the carriers and the run control
//! 6. Run the simulation loop
//! 7. Log the result and write the final snapshot

mod error;
mod stats_callback;

use std::path::Path;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use waymark_core::carrier::TimedCarriers;
use waymark_core::clock::GameClock;
use waymark_core::config::SimulationConfig;
use waymark_core::runner::{self, RunControl};
use waymark_core::scenario::{self, LoadedScenario, Scenario};
use waymark_core::tick::{self, SimulationState};
use waymark_transport::Transport;
use waymark_types::PlayerId;

use crate::error::EngineError;
use crate::stats_callback::StatsCallback;

const CONFIG_FILE: &str = "waymark-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any initialization step or the simulation itself fails.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(
        world_name = config.world.name,
        seed = config.world.seed,
        tick_interval_ms = config.world.tick_interval_ms,
        game_ms_per_tick = config.world.game_ms_per_tick,
        "waymark-engine starting"
    );

    let clock = GameClock::new(&config.world)?;

    let mut transport = Transport::new(
        PlayerId::new(),
        config.tribe.clone(),
        config.transport.network.clone(),
    );
    let loaded = load_scenario(&config, &mut transport, clock.now_ms())?;
    info!(
        flags = transport.network().flag_count(),
        roads = transport.network().road_count(),
        buildings = transport.buildings().count(),
        economies = transport.economy_count(),
        events = loaded.events.len(),
        "transport network built"
    );

    let mut state = SimulationState::new(clock, transport, loaded);
    state.check_invariants = config.simulation.check_invariants;
    tick::log_stock_summary(&state);

    let mut carriers = TimedCarriers::new(config.transport.carrier_ms_per_step);
    let control = RunControl::new(config.simulation.max_ticks, config.world.tick_interval_ms)
        .with_summary_interval(config.logging.summary_interval_ticks);

    {
        let control = control.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("interrupt received, stopping after the current tick");
                control.request_stop();
            }
        });
    }

    let mut callback = StatsCallback::new();
    let result = runner::run_simulation(&mut state, &mut carriers, &control, &mut callback)
        .await
        .map_err(EngineError::from)?;

    runner::log_simulation_end(&result);
    callback.log_totals();
    tick::log_stock_summary(&state);

    if let Some(path) = &config.simulation.snapshot_path {
        write_snapshot(&state, path)?;
        info!(path = %path.display(), "snapshot written");
    }

    info!(
        end_reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        "waymark-engine shutdown complete"
    );

    Ok(())
}

/// Load the simulation configuration from `waymark-config.yaml`.
///
/// Looks for the file relative to the current working directory and falls
/// back to defaults when it is missing.
fn load_config() -> Result<SimulationConfig, EngineError> {
    let config_path = Path::new(CONFIG_FILE);
    if config_path.exists() {
        Ok(SimulationConfig::from_file(config_path)?)
    } else {
        Ok(SimulationConfig::default())
    }
}

fn load_scenario(
    config: &SimulationConfig,
    transport: &mut Transport,
    now: u64,
) -> Result<LoadedScenario, EngineError> {
    let scenario = if let Some(path) = &config.scenario.path {
        info!(path = %path.display(), "loading scenario");
        Scenario::from_file(path)?
    } else {
        info!(
            rows = config.scenario.grid_rows,
            cols = config.scenario.grid_cols,
            seed = config.world.seed,
            "no scenario file configured, generating grid"
        );
        scenario::generate_grid_scenario(
            config.scenario.grid_rows,
            config.scenario.grid_cols,
            config.world.seed,
            &config.tribe,
        )
    };
    if scenario.events.is_empty() {
        warn!(name = scenario.name, "scenario has no events");
    }
    Ok(scenario.apply(transport, now)?)
}

fn write_snapshot(state: &SimulationState, path: &Path) -> Result<(), EngineError> {
    let json = state.transport.snapshot(state.clock.now_ms()).to_json()?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| EngineError::Snapshot {
            path: path.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, json).map_err(|source| EngineError::Snapshot {
        path: path.to_path_buf(),
        source,
    })
}
