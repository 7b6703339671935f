//! Tick cycle: one step of the Waymark simulation.
//!
//! Each tick runs these phases in order:
//!
//! 1. **Clock** -- advance the game clock.
//! 2. **Events** -- replay scenario events due at this tick (road changes
//!    trigger economy merges and splits).
//! 3. **Carriers** -- collect carrier outcomes and report deliveries and
//!    failures to the transport layer.
//! 4. **Production** -- finish and start production cycles, complete
//!    construction sites.
//! 5. **Balance** -- run the balance passes that fell due and dispatch the
//!    resulting transfers to the carriers.
//! 6. **Cleanup** -- abort and fail every transfer orphaned during the tick.
//!
//! The tick is deterministic given the same state and carrier behavior.

use tracing::{debug, error, info, warn};
use waymark_transport::{EconomyObserver, Transport, TransportError, verify_partition};
use waymark_types::{TransferId, WareKind};

use crate::carrier::{CarrierOutcome, CarrierSystem};
use crate::clock::GameClock;
use crate::production::ProductionSchedule;
use crate::scenario::{self, LoadedScenario, ScenarioError};

/// Errors that can occur during tick execution.
#[derive(Debug, thiserror::Error)]
pub enum TickError {
    /// A clock operation failed.
    #[error("clock error: {source}")]
    Clock {
        /// The underlying clock error.
        #[from]
        source: crate::clock::ClockError,
    },

    /// The transport layer reported a structural error.
    #[error("transport error: {source}")]
    Transport {
        /// The underlying transport error.
        #[from]
        source: TransportError,
    },

    /// A scenario event could not be applied.
    #[error("scenario event at tick {tick} failed: {source}")]
    Event {
        /// The tick the event was due.
        tick: u64,
        /// The underlying scenario error.
        source: ScenarioError,
    },

    /// The economies no longer partition the flag graph.
    #[error("economy partition broken at tick {tick}: {violations} violation(s)")]
    Partition {
        /// The tick that broke it.
        tick: u64,
        /// Number of violations found.
        violations: usize,
    },
}

/// Summary of a single tick's execution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickSummary {
    /// The tick that was executed.
    pub tick: u64,
    /// Game time at the end of the tick.
    pub now_ms: u64,
    /// Scenario events applied.
    pub events: u32,
    /// Transfers delivered.
    pub delivered: u32,
    /// Transfers failed or aborted.
    pub failed: u32,
    /// Transfers created by balance passes.
    pub dispatched: u32,
    /// Wares produced.
    pub produced: u32,
    /// Construction sites completed.
    pub constructed: u32,
    /// Transfers still carried.
    pub in_flight: usize,
    /// Economies at the end of the tick.
    pub economies: usize,
}

/// The mutable simulation state passed through the tick cycle.
#[derive(Debug)]
pub struct SimulationState {
    /// The game clock.
    pub clock: GameClock,
    /// The player's transport network.
    pub transport: Transport,
    /// Running production cycles.
    pub production: ProductionSchedule,
    /// Named flags and pending scenario events.
    pub scenario: LoadedScenario,
    /// Verify the economy partition after every tick.
    pub check_invariants: bool,
}

impl SimulationState {
    /// Assemble a state at the clock's current time.
    pub const fn new(clock: GameClock, transport: Transport, scenario: LoadedScenario) -> Self {
        Self {
            clock,
            transport,
            production: ProductionSchedule::new(),
            scenario,
            check_invariants: true,
        }
    }
}

/// Execute one tick of the simulation.
///
/// # Errors
///
/// Returns [`TickError`] on clock overflow, structural transport errors,
/// failing scenario events, or (with `check_invariants`) a broken economy
/// partition.
pub fn run_tick(
    state: &mut SimulationState,
    carriers: &mut dyn CarrierSystem,
) -> Result<TickSummary, TickError> {
    // --- Phase 1: Clock ---
    let now = state.clock.advance()?;
    let tick = state.clock.tick();
    debug!(tick, now, "tick started");

    let mut orphaned: Vec<TransferId> = Vec::new();

    // --- Phase 2: Events ---
    let due = state.scenario.take_due(tick);
    let events = u32::try_from(due.len()).unwrap_or(u32::MAX);
    for event in due {
        let lost = scenario::apply_action(
            &mut state.transport,
            &state.scenario.flags,
            &event.action,
            now,
        )
        .map_err(|source| TickError::Event { tick, source })?;
        info!(tick, action = ?event.action, "scenario event applied");
        orphaned.extend(lost);
    }

    // --- Phase 3: Carriers ---
    let mut delivered: u32 = 0;
    let mut failed: u32 = 0;
    for outcome in carriers.poll(now) {
        match outcome {
            CarrierOutcome::Delivered(id) => match state.transport.finish_transfer(id, now) {
                Ok(lost) => {
                    delivered = delivered.saturating_add(1);
                    orphaned.extend(lost);
                }
                Err(TransportError::TransferNotFound(_)) => {
                    warn!(transfer = %id, "delivery for unknown transfer ignored");
                }
                Err(e) => return Err(e.into()),
            },
            CarrierOutcome::Failed(id) => {
                fail(&mut state.transport, id, now)?;
                failed = failed.saturating_add(1);
            }
        }
    }

    // --- Phase 4: Production ---
    let report = state.production.step(&mut state.transport, now)?;
    orphaned.extend(report.orphaned);

    // --- Phase 5: Balance ---
    let transfers = state.transport.run_due_balances(now)?;
    for transfer in &transfers {
        carriers.dispatch(transfer, now);
    }

    // --- Phase 6: Cleanup ---
    orphaned.sort();
    orphaned.dedup();
    for id in orphaned {
        carriers.abort(id);
        fail(&mut state.transport, id, now)?;
        failed = failed.saturating_add(1);
    }

    if state.check_invariants {
        let violations = verify_partition(&state.transport);
        if !violations.is_empty() {
            for violation in &violations {
                error!(tick, %violation, "partition violation");
            }
            return Err(TickError::Partition {
                tick,
                violations: violations.len(),
            });
        }
    }

    Ok(TickSummary {
        tick,
        now_ms: now,
        events,
        delivered,
        failed,
        dispatched: u32::try_from(transfers.len()).unwrap_or(u32::MAX),
        produced: u32::try_from(report.produced.len()).unwrap_or(u32::MAX),
        constructed: u32::try_from(report.completed.len()).unwrap_or(u32::MAX),
        in_flight: carriers.in_flight(),
        economies: state.transport.economy_count(),
    })
}

fn fail(transport: &mut Transport, id: TransferId, now: u64) -> Result<(), TickError> {
    match transport.fail_transfer(id, now) {
        Ok(()) => Ok(()),
        Err(TransportError::TransferNotFound(_)) => {
            debug!(transfer = %id, "transfer already settled");
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

/// Log one line per economy with its size and stock of every ware type.
pub fn log_stock_summary(state: &SimulationState) {
    let observer = EconomyObserver::new(&state.transport);
    let tribe = state.transport.tribe();
    for summary in observer.economies() {
        let Some(economy) = state.transport.economy(summary.economy) else {
            continue;
        };
        let stock: Vec<String> = economy
            .wares()
            .iter()
            .filter(|&(_, count)| count > 0)
            .map(|(ware, count)| format!("{}={count}", tribe.name_of(WareKind::Ware, ware)))
            .collect();
        info!(
            tick = state.clock.tick(),
            economy = %summary.economy,
            flags = summary.flags.len(),
            warehouse = summary.has_warehouse,
            requests = economy.requests().len(),
            supplies = economy.supplies().len(),
            stock = %stock.join(" "),
            "economy summary"
        );
    }
}
