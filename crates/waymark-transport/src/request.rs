//! Requests: outstanding demand for wares or workers.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use waymark_types::{BuildingId, FlagId, RequestId, RequestPriority, TransferId, WareIndex, WareKind};

/// Unmet demand of one building for units of one ware or worker type.
///
/// A request is owned by the wares queue or worker slot that raised it.
/// The economy only keeps its id. `count` is the number of units still
/// wanted including those already on their way; every committed transfer
/// is recorded until it is delivered or fails.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
    id: RequestId,
    kind: WareKind,
    ware: WareIndex,
    target_building: BuildingId,
    target_flag: FlagId,
    priority: RequestPriority,
    count: u32,
    transfers: BTreeSet<TransferId>,
}

impl Request {
    /// Create a request with no transfers in flight.
    pub fn new(
        kind: WareKind,
        ware: WareIndex,
        target_building: BuildingId,
        target_flag: FlagId,
        count: u32,
    ) -> Self {
        Self {
            id: RequestId::new(),
            kind,
            ware,
            target_building,
            target_flag,
            priority: RequestPriority::default(),
            count,
            transfers: BTreeSet::new(),
        }
    }

    /// The request's identifier.
    pub const fn id(&self) -> RequestId {
        self.id
    }

    /// Ware or worker.
    pub const fn kind(&self) -> WareKind {
        self.kind
    }

    /// Requested type.
    pub const fn ware(&self) -> WareIndex {
        self.ware
    }

    /// The building that receives the units.
    pub const fn target_building(&self) -> BuildingId {
        self.target_building
    }

    /// The flag units are routed to.
    pub const fn target_flag(&self) -> FlagId {
        self.target_flag
    }

    /// Matching priority.
    pub const fn priority(&self) -> RequestPriority {
        self.priority
    }

    pub(crate) const fn set_priority(&mut self, priority: RequestPriority) {
        self.priority = priority;
    }

    /// Total units wanted, including in-flight ones.
    pub const fn count(&self) -> u32 {
        self.count
    }

    pub(crate) const fn set_count(&mut self, count: u32) {
        self.count = count;
    }

    /// Transfers committed for this request.
    pub const fn transfers(&self) -> &BTreeSet<TransferId> {
        &self.transfers
    }

    /// Units still waiting for a supply.
    pub fn open_count(&self) -> u32 {
        let in_flight = u32::try_from(self.transfers.len()).unwrap_or(u32::MAX);
        self.count.saturating_sub(in_flight)
    }

    /// Whether a matching pass should look at this request.
    pub fn is_open(&self) -> bool {
        self.open_count() > 0
    }

    pub(crate) fn add_transfer(&mut self, transfer: TransferId) {
        self.transfers.insert(transfer);
    }

    pub(crate) fn remove_transfer(&mut self, transfer: TransferId) -> bool {
        self.transfers.remove(&transfer)
    }

    /// Hand every in-flight transfer back to the caller (request withdrawn).
    pub(crate) fn take_transfers(&mut self) -> Vec<TransferId> {
        std::mem::take(&mut self.transfers).into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(count: u32) -> Request {
        Request::new(
            WareKind::Ware,
            WareIndex(0),
            BuildingId::new(),
            FlagId::new(),
            count,
        )
    }

    #[test]
    fn open_count_excludes_in_flight() {
        let mut r = request(3);
        assert_eq!(r.open_count(), 3);
        r.add_transfer(TransferId::new());
        r.add_transfer(TransferId::new());
        assert_eq!(r.open_count(), 1);
        assert!(r.is_open());
    }

    #[test]
    fn open_count_never_negative() {
        let mut r = request(1);
        r.add_transfer(TransferId::new());
        r.add_transfer(TransferId::new());
        assert_eq!(r.open_count(), 0);
        assert!(!r.is_open());
    }

    #[test]
    fn take_transfers_empties_set() {
        let mut r = request(2);
        let t = TransferId::new();
        r.add_transfer(t);
        assert_eq!(r.take_transfers(), vec![t]);
        assert!(r.transfers().is_empty());
        assert!(!r.remove_transfer(t));
    }

    #[test]
    fn default_priority_is_normal() {
        assert_eq!(request(1).priority(), RequestPriority::Normal);
    }
}
