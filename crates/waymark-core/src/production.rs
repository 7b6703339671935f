//! Production cycles and construction completion.
//!
//! A production site whose worker is present and whose input queues hold
//! enough units starts a cycle, unless its economy already stocks as much
//! of the output as the target quantity asks for. The inputs are used up
//! at once and the output ware appears at the site's flag after the
//! program's duration.
//! Using up inputs re-arms the queues' requests, which keeps wares flowing
//! through the network. A construction site that has all its materials and
//! its builder turns into its target building.

use std::collections::BTreeMap;

use tracing::debug;
use waymark_transport::{ProgramInput, Transport, TransportError};
use waymark_types::{BuildingId, TransferId, WareIndex};

/// What one production step did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductionReport {
    /// Cycles started this step.
    pub started: u32,
    /// Ready sites that stayed idle because the economy has enough of
    /// their output.
    pub skipped: u32,
    /// Outputs placed at flags, by producing building.
    pub produced: Vec<(BuildingId, WareIndex)>,
    /// Finished construction sites and the buildings that replaced them.
    pub completed: Vec<(BuildingId, BuildingId)>,
    /// Transfers that lost their destination along the way.
    pub orphaned: Vec<TransferId>,
}

/// Running production cycles, keyed by building.
#[derive(Debug, Clone, Default)]
pub struct ProductionSchedule {
    running: BTreeMap<BuildingId, u64>,
}

impl ProductionSchedule {
    /// An empty schedule.
    pub const fn new() -> Self {
        Self {
            running: BTreeMap::new(),
        }
    }

    /// Game time at which a building's current cycle ends.
    pub fn finishes_at(&self, building: BuildingId) -> Option<u64> {
        self.running.get(&building).copied()
    }

    /// Number of running cycles.
    pub fn running(&self) -> usize {
        self.running.len()
    }

    /// Finish due cycles, start new ones, and complete construction sites.
    ///
    /// # Errors
    ///
    /// Propagates structural errors from the transport layer.
    pub fn step(
        &mut self,
        transport: &mut Transport,
        now: u64,
    ) -> Result<ProductionReport, TransportError> {
        let mut report = ProductionReport::default();
        self.finish_cycles(transport, now, &mut report)?;
        self.start_cycles(transport, now, &mut report)?;
        complete_sites(transport, now, &mut report)?;
        Ok(report)
    }

    fn finish_cycles(
        &mut self,
        transport: &mut Transport,
        now: u64,
        report: &mut ProductionReport,
    ) -> Result<(), TransportError> {
        let due: Vec<BuildingId> = self
            .running
            .iter()
            .filter(|&(_, &at)| at <= now)
            .map(|(&id, _)| id)
            .collect();

        for id in due {
            let Some(building) = transport.building(id) else {
                self.running.remove(&id);
                continue;
            };
            let flag = building.flag();
            let output = building
                .production_site()
                .and_then(|site| site.program().output);
            if let Some(ware) = output {
                match transport.drop_ware_at_flag(flag, ware, now) {
                    Ok(_) => report.produced.push((id, ware)),
                    Err(TransportError::FlagBufferFull(_)) => {
                        // The output waits inside the building until the flag drains.
                        debug!(building = %id, flag = %flag, "flag full, output held back");
                        continue;
                    }
                    Err(e) => return Err(e),
                }
            }
            self.running.remove(&id);
        }
        Ok(())
    }

    fn start_cycles(
        &mut self,
        transport: &mut Transport,
        now: u64,
        report: &mut ProductionReport,
    ) -> Result<(), TransportError> {
        let ready: Vec<(BuildingId, Option<WareIndex>, Vec<ProgramInput>, u64)> = transport
            .buildings()
            .filter(|b| !self.running.contains_key(&b.id()))
            .filter_map(|b| {
                let site = b.production_site()?;
                let program = site.program();
                site.can_produce().then(|| {
                    (
                        b.id(),
                        program.output,
                        program.inputs.clone(),
                        program.duration_ms,
                    )
                })
            })
            .collect();

        for (id, output, inputs, duration_ms) in ready {
            if let Some(ware) = output {
                let economy = transport.building_economy(id)?;
                if !transport.needs_ware(economy, ware)? {
                    debug!(building = %id, ware = %ware, "output not needed, cycle skipped");
                    report.skipped = report.skipped.saturating_add(1);
                    continue;
                }
            }
            for input in &inputs {
                transport.consume_from_queue(id, input.ware, input.amount, now)?;
            }
            self.running.insert(id, now.saturating_add(duration_ms));
            report.started = report.started.saturating_add(1);
            debug!(building = %id, inputs = inputs.len(), "production cycle started");
        }
        Ok(())
    }
}

fn complete_sites(
    transport: &mut Transport,
    now: u64,
    report: &mut ProductionReport,
) -> Result<(), TransportError> {
    let complete: Vec<BuildingId> = transport
        .buildings()
        .filter(|b| b.construction_site().is_some_and(|s| s.is_complete()))
        .map(|b| b.id())
        .collect();

    for site in complete {
        let (building, orphaned) = transport.complete_construction(site, now)?;
        report.completed.push((site, building));
        report.orphaned.extend(orphaned);
    }
    Ok(())
}
