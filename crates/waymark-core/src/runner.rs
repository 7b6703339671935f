//! Simulation loop runner.
//!
//! [`run_simulation`] drives [`run_tick`] until the tick limit is reached
//! or a stop is requested through [`RunControl`], sleeping the configured
//! real-time interval between ticks. All mutation happens synchronously
//! inside a tick; the loop only awaits between ticks.
//!
//! [`run_tick`]: crate::tick::run_tick

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::info;

use crate::carrier::CarrierSystem;
use crate::tick::{self, SimulationState, TickError, TickSummary};

/// Errors that can occur during the simulation run.
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// A tick execution failed.
    #[error("tick error: {source}")]
    Tick {
        /// The underlying tick error.
        #[from]
        source: TickError,
    },
}

/// Why the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationEndReason {
    /// The configured number of ticks ran.
    MaxTicksReached,
    /// [`RunControl::request_stop`] was called.
    Stopped,
}

/// Result of the simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    /// The reason the simulation ended.
    pub end_reason: SimulationEndReason,
    /// The last tick summary, if any tick completed.
    pub final_summary: Option<TickSummary>,
    /// Total number of ticks executed.
    pub total_ticks: u64,
}

/// Run boundaries plus a stop switch shared with other tasks.
#[derive(Debug, Clone)]
pub struct RunControl {
    max_ticks: u64,
    tick_interval_ms: u64,
    summary_interval_ticks: u64,
    stop: Arc<AtomicBool>,
}

impl RunControl {
    /// Stop after `max_ticks` ticks (0 for no limit), sleeping
    /// `tick_interval_ms` of real time between ticks.
    pub fn new(max_ticks: u64, tick_interval_ms: u64) -> Self {
        Self {
            max_ticks,
            tick_interval_ms,
            summary_interval_ticks: 0,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Log a stock summary every `ticks` ticks (0 disables it).
    #[must_use]
    pub const fn with_summary_interval(mut self, ticks: u64) -> Self {
        self.summary_interval_ticks = ticks;
        self
    }

    /// Ask the loop to stop before its next tick.
    pub fn request_stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested.
    pub fn is_stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// The tick limit (0 for none).
    pub const fn max_ticks(&self) -> u64 {
        self.max_ticks
    }

    fn tick_limit_reached(&self, tick: u64) -> bool {
        self.max_ticks > 0 && tick >= self.max_ticks
    }

    fn summary_due(&self, tick: u64) -> bool {
        self.summary_interval_ticks > 0 && tick.checked_rem(self.summary_interval_ticks) == Some(0)
    }
}

/// Callback invoked after each tick completes.
pub trait TickCallback: Send {
    /// Called after a tick completes successfully.
    fn on_tick(&mut self, summary: &TickSummary, state: &SimulationState);
}

/// A no-op tick callback.
pub struct NoOpCallback;

impl TickCallback for NoOpCallback {
    fn on_tick(&mut self, _summary: &TickSummary, _state: &SimulationState) {}
}

/// Run the simulation loop until a termination condition is met.
///
/// # Errors
///
/// Returns [`RunnerError`] if a tick fails.
pub async fn run_simulation(
    state: &mut SimulationState,
    carriers: &mut dyn CarrierSystem,
    control: &RunControl,
    callback: &mut dyn TickCallback,
) -> Result<SimulationResult, RunnerError> {
    let mut last_summary: Option<TickSummary> = None;
    let mut total_ticks: u64 = 0;

    info!(
        max_ticks = control.max_ticks,
        tick_interval_ms = control.tick_interval_ms,
        start_tick = state.clock.tick(),
        "simulation starting"
    );

    loop {
        if control.is_stop_requested() {
            info!(total_ticks, "stop requested");
            return Ok(SimulationResult {
                end_reason: SimulationEndReason::Stopped,
                final_summary: last_summary,
                total_ticks,
            });
        }

        let summary = tick::run_tick(state, carriers)?;
        total_ticks = total_ticks.saturating_add(1);
        callback.on_tick(&summary, state);

        if control.summary_due(summary.tick) {
            tick::log_stock_summary(state);
        }

        if control.tick_limit_reached(summary.tick) {
            info!(tick = summary.tick, max_ticks = control.max_ticks, "tick limit reached");
            return Ok(SimulationResult {
                end_reason: SimulationEndReason::MaxTicksReached,
                final_summary: Some(summary),
                total_ticks,
            });
        }

        last_summary = Some(summary);

        if control.tick_interval_ms > 0 {
            tokio::time::sleep(tokio::time::Duration::from_millis(control.tick_interval_ms)).await;
        } else {
            tokio::task::yield_now().await;
        }
    }
}

/// Log the end of a run.
pub fn log_simulation_end(result: &SimulationResult) {
    info!(
        reason = ?result.end_reason,
        total_ticks = result.total_ticks,
        final_tick = result.final_summary.as_ref().map(|s| s.tick),
        in_flight = result.final_summary.as_ref().map(|s| s.in_flight),
        economies = result.final_summary.as_ref().map(|s| s.economies),
        "simulation ended"
    );
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use waymark_transport::{Transport, TransportConfig, Tribe};
    use waymark_types::PlayerId;

    use super::*;
    use crate::carrier::TimedCarriers;
    use crate::clock::GameClock;
    use crate::scenario::generate_grid_scenario;

    fn state() -> SimulationState {
        let tribe = Tribe::default();
        let mut transport = Transport::new(PlayerId::new(), tribe.clone(), TransportConfig::default());
        let scenario = generate_grid_scenario(2, 3, 11, &tribe)
            .apply(&mut transport, 0)
            .unwrap();
        SimulationState::new(GameClock::from_parts(0, 250).unwrap(), transport, scenario)
    }

    struct Counting(u64);

    impl TickCallback for Counting {
        fn on_tick(&mut self, _summary: &TickSummary, _state: &SimulationState) {
            self.0 = self.0.saturating_add(1);
        }
    }

    #[tokio::test]
    async fn stops_at_tick_limit() {
        let mut state = state();
        let mut carriers = TimedCarriers::new(100);
        let control = RunControl::new(5, 0).with_summary_interval(2);
        let mut callback = Counting(0);
        let result = run_simulation(&mut state, &mut carriers, &control, &mut callback)
            .await
            .unwrap();
        assert_eq!(result.end_reason, SimulationEndReason::MaxTicksReached);
        assert_eq!(result.total_ticks, 5);
        assert_eq!(callback.0, 5);
        assert_eq!(result.final_summary.unwrap().tick, 5);
    }

    #[tokio::test]
    async fn stop_request_ends_before_next_tick() {
        let mut state = state();
        let mut carriers = TimedCarriers::new(100);
        let control = RunControl::new(0, 0);
        control.request_stop();
        let result = run_simulation(&mut state, &mut carriers, &control, &mut NoOpCallback)
            .await
            .unwrap();
        assert_eq!(result.end_reason, SimulationEndReason::Stopped);
        assert_eq!(result.total_ticks, 0);
    }
}
