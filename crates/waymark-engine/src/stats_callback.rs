//! Tick callback that keeps running totals for the whole run.
//!
//! Per-tick activity is logged at debug level; the totals are logged once
//! the loop ends.

use tracing::{debug, info};
use waymark_core::runner::TickCallback;
use waymark_core::tick::{SimulationState, TickSummary};

/// Totals accumulated over every completed tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunTotals {
    /// Transfers delivered.
    pub delivered: u64,
    /// Transfers failed or aborted.
    pub failed: u64,
    /// Transfers dispatched to carriers.
    pub dispatched: u64,
    /// Wares produced.
    pub produced: u64,
    /// Construction sites completed.
    pub constructed: u64,
    /// Scenario events applied.
    pub events: u64,
    /// Most transfers carried at the end of any tick.
    pub peak_in_flight: usize,
    /// Ticks after which the number of economies differed from the tick before.
    pub economy_changes: u64,
}

/// Callback that folds every [`TickSummary`] into [`RunTotals`].
#[derive(Debug, Default)]
pub struct StatsCallback {
    totals: RunTotals,
    last_economies: Option<usize>,
}

impl StatsCallback {
    /// A callback with empty totals.
    pub fn new() -> Self {
        Self::default()
    }

    /// Totals so far.
    pub const fn totals(&self) -> &RunTotals {
        &self.totals
    }

    /// Log the totals at info level.
    pub fn log_totals(&self) {
        let t = &self.totals;
        info!(
            delivered = t.delivered,
            failed = t.failed,
            dispatched = t.dispatched,
            produced = t.produced,
            constructed = t.constructed,
            events = t.events,
            peak_in_flight = t.peak_in_flight,
            economy_changes = t.economy_changes,
            "run totals"
        );
    }
}

impl TickCallback for StatsCallback {
    fn on_tick(&mut self, summary: &TickSummary, _state: &SimulationState) {
        let t = &mut self.totals;
        t.delivered = t.delivered.saturating_add(u64::from(summary.delivered));
        t.failed = t.failed.saturating_add(u64::from(summary.failed));
        t.dispatched = t.dispatched.saturating_add(u64::from(summary.dispatched));
        t.produced = t.produced.saturating_add(u64::from(summary.produced));
        t.constructed = t.constructed.saturating_add(u64::from(summary.constructed));
        t.events = t.events.saturating_add(u64::from(summary.events));
        t.peak_in_flight = t.peak_in_flight.max(summary.in_flight);

        if self
            .last_economies
            .is_some_and(|before| before != summary.economies)
        {
            t.economy_changes = t.economy_changes.saturating_add(1);
            info!(
                tick = summary.tick,
                economies = summary.economies,
                "economy count changed"
            );
        }
        self.last_economies = Some(summary.economies);

        debug!(
            tick = summary.tick,
            delivered = summary.delivered,
            dispatched = summary.dispatched,
            in_flight = summary.in_flight,
            "tick complete"
        );
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use waymark_core::clock::GameClock;
    use waymark_core::scenario::LoadedScenario;
    use waymark_transport::{Transport, TransportConfig, Tribe};
    use waymark_types::PlayerId;

    use super::*;

    fn summary(tick: u64, delivered: u32, in_flight: usize, economies: usize) -> TickSummary {
        TickSummary {
            tick,
            now_ms: tick.saturating_mul(250),
            events: 0,
            delivered,
            failed: 0,
            dispatched: 1,
            produced: 0,
            constructed: 0,
            in_flight,
            economies,
        }
    }

    #[test]
    fn totals_accumulate_across_ticks() {
        let state = SimulationState::new(
            GameClock::from_parts(0, 250).unwrap(),
            Transport::new(PlayerId::new(), Tribe::default(), TransportConfig::default()),
            LoadedScenario::default(),
        );
        let mut callback = StatsCallback::new();
        callback.on_tick(&summary(1, 0, 3, 1), &state);
        callback.on_tick(&summary(2, 2, 1, 2), &state);
        callback.on_tick(&summary(3, 1, 0, 2), &state);
        callback.on_tick(&summary(4, 0, 0, 1), &state);

        let totals = callback.totals();
        assert_eq!(totals.delivered, 3);
        assert_eq!(totals.dispatched, 4);
        assert_eq!(totals.peak_in_flight, 3);
        assert_eq!(totals.economy_changes, 2);
    }
}
