//! Carrier system: who physically moves a committed transfer.
//!
//! The transport layer decides *which* supply serves *which* request; the
//! [`CarrierSystem`] trait abstracts how the unit gets there. The engine
//! dispatches every new transfer and polls the carriers once per tick for
//! outcomes, which it reports back to the transport layer.
//!
//! [`TimedCarriers`] completes each transfer after a delay proportional to
//! its route cost. It does not model walking, congestion, or carrier
//! shortages.

use std::collections::{BTreeMap, BTreeSet};

use waymark_transport::Transfer;
use waymark_types::TransferId;

/// What became of a dispatched transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CarrierOutcome {
    /// The unit reached its destination.
    Delivered(TransferId),
    /// The carrier gave up; the unit returns to its origin.
    Failed(TransferId),
}

/// A source of transfer outcomes.
pub trait CarrierSystem {
    /// Take over a freshly committed transfer at game time `now`.
    fn dispatch(&mut self, transfer: &Transfer, now: u64);

    /// Outcomes that happened up to game time `now`, each reported once.
    fn poll(&mut self, now: u64) -> Vec<CarrierOutcome>;

    /// Stop carrying a transfer. Returns `false` if it was unknown.
    fn abort(&mut self, transfer: TransferId) -> bool;

    /// Number of transfers currently carried.
    fn in_flight(&self) -> usize;
}

/// Carriers that deliver after `route cost * ms_per_step` game milliseconds.
#[derive(Debug, Clone, Default)]
pub struct TimedCarriers {
    ms_per_step: u64,
    arrivals: BTreeSet<(u64, TransferId)>,
    due: BTreeMap<TransferId, u64>,
}

impl TimedCarriers {
    /// Carriers walking one route step in `ms_per_step` game milliseconds.
    pub const fn new(ms_per_step: u64) -> Self {
        Self {
            ms_per_step,
            arrivals: BTreeSet::new(),
            due: BTreeMap::new(),
        }
    }

    /// When a transfer will arrive, if it is carried.
    pub fn arrival(&self, transfer: TransferId) -> Option<u64> {
        self.due.get(&transfer).copied()
    }
}

impl CarrierSystem for TimedCarriers {
    fn dispatch(&mut self, transfer: &Transfer, now: u64) {
        let travel = u64::from(transfer.route.cost).saturating_mul(self.ms_per_step);
        let at = now.saturating_add(travel);
        self.arrivals.insert((at, transfer.id));
        self.due.insert(transfer.id, at);
    }

    fn poll(&mut self, now: u64) -> Vec<CarrierOutcome> {
        let mut outcomes = Vec::new();
        while let Some(&(at, id)) = self.arrivals.first() {
            if at > now {
                break;
            }
            self.arrivals.pop_first();
            self.due.remove(&id);
            outcomes.push(CarrierOutcome::Delivered(id));
        }
        outcomes
    }

    fn abort(&mut self, transfer: TransferId) -> bool {
        match self.due.remove(&transfer) {
            Some(at) => self.arrivals.remove(&(at, transfer)),
            None => false,
        }
    }

    fn in_flight(&self) -> usize {
        self.due.len()
    }
}
