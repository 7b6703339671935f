//! Wares queues: bounded input buffers of buildings.
//!
//! A queue wants to be full. While `filled < size` it keeps exactly one
//! live [`Request`] for the missing units registered with its economy;
//! once full, the request is withdrawn. Setters only change the numbers;
//! [`WaresQueue::update`] reconciles the request with them.

use serde::{Deserialize, Serialize};
use waymark_types::{BuildingId, FlagId, RequestPriority, TransferId, WareIndex, WareKind};

use crate::economy::Economy;
use crate::error::TransportError;
use crate::request::Request;

/// Take a live request out of its owner and unregister it. Returns the
/// transfers that were on their way for it.
pub(crate) fn withdraw_request(
    slot: &mut Option<Request>,
    economy: Option<&mut Economy>,
) -> Vec<TransferId> {
    let Some(mut request) = slot.take() else {
        return Vec::new();
    };
    if let Some(economy) = economy {
        economy.remove_request(request.id());
    }
    request.take_transfers()
}

/// What [`WaresQueue::cleanup`] released.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueCleanup {
    /// Units that were still stored in the queue.
    pub drained: u32,
    /// Transfers whose request was withdrawn.
    pub orphaned: Vec<TransferId>,
}

/// Input buffer of one ware type for one building.
#[derive(Debug, Clone)]
pub struct WaresQueue {
    building: BuildingId,
    flag: FlagId,
    ware: WareIndex,
    size: u32,
    filled: u32,
    consume_interval_ms: u64,
    priority: RequestPriority,
    request: Option<Request>,
}

impl WaresQueue {
    /// Create an empty queue. No request exists until the first
    /// [`update`](Self::update).
    pub fn new(building: BuildingId, flag: FlagId, ware: WareIndex, size: u32) -> Self {
        Self {
            building,
            flag,
            ware,
            size,
            filled: 0,
            consume_interval_ms: 0,
            priority: RequestPriority::default(),
            request: None,
        }
    }

    /// The owning building.
    pub const fn building(&self) -> BuildingId {
        self.building
    }

    /// The ware type stored.
    pub const fn ware(&self) -> WareIndex {
        self.ware
    }

    /// Capacity.
    pub const fn size(&self) -> u32 {
        self.size
    }

    /// Units currently stored.
    pub const fn filled(&self) -> u32 {
        self.filled
    }

    /// Units missing to be full.
    pub const fn missing(&self) -> u32 {
        self.size.saturating_sub(self.filled)
    }

    /// Expected time between two consumptions, a hint for carriers.
    pub const fn consume_interval_ms(&self) -> u64 {
        self.consume_interval_ms
    }

    /// Priority given to the queue's request.
    pub const fn priority(&self) -> RequestPriority {
        self.priority
    }

    /// The live request, if any.
    pub const fn request(&self) -> Option<&Request> {
        self.request.as_ref()
    }

    pub(crate) const fn request_mut(&mut self) -> Option<&mut Request> {
        self.request.as_mut()
    }

    /// Change the capacity. `filled` is clamped to the new size.
    pub fn set_size(&mut self, size: u32) {
        self.size = size;
        self.filled = self.filled.min(size);
    }

    /// Set the stored amount, clamped to the capacity.
    pub fn set_filled(&mut self, filled: u32) {
        self.filled = filled.min(self.size);
    }

    /// Set the consumption interval hint.
    pub const fn set_consume_interval(&mut self, ms: u64) {
        self.consume_interval_ms = ms;
    }

    /// Set the request priority; takes effect on the next update.
    pub const fn set_priority(&mut self, priority: RequestPriority) {
        self.priority = priority;
    }

    /// Reconcile the live request with `size` and `filled`.
    ///
    /// Creates a request for the missing units, adjusts an existing one, or
    /// withdraws it once the queue is full. Returns transfers whose request
    /// was withdrawn; the caller hands them to the carrier for aborting.
    pub fn update(&mut self, economy: Option<&mut Economy>) -> Vec<TransferId> {
        let missing = self.missing();
        if missing == 0 {
            return withdraw_request(&mut self.request, economy);
        }
        if let Some(request) = self.request.as_mut() {
            request.set_count(missing);
            request.set_priority(self.priority);
        } else {
            let mut request = Request::new(
                WareKind::Ware,
                self.ware,
                self.building,
                self.flag,
                missing,
            );
            request.set_priority(self.priority);
            if let Some(economy) = economy {
                economy.add_request(request.id(), self.building);
            }
            self.request = Some(request);
        }
        Vec::new()
    }

    /// Register the live request with an economy.
    pub fn add_to_economy(&self, economy: &mut Economy) {
        if let Some(request) = &self.request {
            economy.add_request(request.id(), self.building);
        }
    }

    /// Unregister the live request from an economy.
    pub fn remove_from_economy(&self, economy: &mut Economy) {
        if let Some(request) = &self.request {
            economy.remove_request(request.id());
        }
    }

    /// Empty the queue and withdraw its request, e.g. before the building
    /// is torn down. The caller takes over the drained units.
    pub fn cleanup(&mut self, economy: Option<&mut Economy>) -> QueueCleanup {
        let drained = std::mem::take(&mut self.filled);
        self.size = 0;
        QueueCleanup {
            drained,
            orphaned: withdraw_request(&mut self.request, economy),
        }
    }

    /// A unit arrived for `transfer`. Returns `false` if the queue was
    /// already full and the unit was not stored.
    pub(crate) fn deliver(&mut self, transfer: TransferId) -> bool {
        if let Some(request) = self.request.as_mut() {
            request.remove_transfer(transfer);
        }
        if self.filled >= self.size {
            return false;
        }
        self.filled = self.filled.saturating_add(1);
        true
    }

    /// Use up stored units.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InsufficientStock`] if fewer than `count`
    /// units are stored.
    pub(crate) fn consume(&mut self, count: u32) -> Result<(), TransportError> {
        self.filled = self
            .filled
            .checked_sub(count)
            .ok_or(TransportError::InsufficientStock {
                kind: WareKind::Ware,
                ware: self.ware,
                requested: count,
                available: self.filled,
            })?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use waymark_types::{EconomyId, PlayerId};

    use super::*;
    use crate::target_quantity::TargetQuantities;
    use crate::tribe::Tribe;

    fn economy() -> Economy {
        Economy::new(
            EconomyId::new(),
            PlayerId::new(),
            TargetQuantities::from_tribe(&Tribe::default()),
        )
    }

    fn queue(size: u32) -> WaresQueue {
        WaresQueue::new(BuildingId::new(), FlagId::new(), WareIndex(0), size)
    }

    #[test]
    fn full_queue_has_no_request_until_consumed() {
        let mut e = economy();
        let mut q = queue(5);
        q.set_filled(5);
        q.update(Some(&mut e));
        assert!(q.request().is_none());
        assert!(e.requests().is_empty());

        q.set_filled(4);
        q.update(Some(&mut e));
        let request = q.request().unwrap();
        assert_eq!(request.count(), 1);
        assert_eq!(e.requests().len(), 1);
        assert!(e.requests().contains_key(&request.id()));
    }

    #[test]
    fn update_adjusts_existing_request() {
        let mut e = economy();
        let mut q = queue(5);
        q.update(Some(&mut e));
        let id = q.request().unwrap().id();
        q.set_filled(2);
        q.set_priority(RequestPriority::High);
        q.update(Some(&mut e));
        let request = q.request().unwrap();
        assert_eq!(request.id(), id);
        assert_eq!(request.count(), 3);
        assert_eq!(request.priority(), RequestPriority::High);
        assert_eq!(e.requests().len(), 1);
    }

    #[test]
    fn filling_withdraws_request_and_returns_transfers() {
        let mut e = economy();
        let mut q = queue(2);
        q.update(Some(&mut e));
        let transfer = TransferId::new();
        q.request_mut().unwrap().add_transfer(transfer);
        q.set_filled(2);
        let orphaned = q.update(Some(&mut e));
        assert_eq!(orphaned, vec![transfer]);
        assert!(q.request().is_none());
        assert!(e.requests().is_empty());
    }

    #[test]
    fn setters_only_mutate() {
        let mut q = queue(3);
        q.set_size(2);
        q.set_filled(10);
        q.set_consume_interval(500);
        assert_eq!(q.filled(), 2);
        assert_eq!(q.consume_interval_ms(), 500);
        assert!(q.request().is_none());
    }

    #[test]
    fn delivery_fills_and_consume_drains() {
        let mut q = queue(1);
        let t = TransferId::new();
        q.update(None);
        q.request_mut().unwrap().add_transfer(t);
        assert!(q.deliver(t));
        assert!(q.request().unwrap().transfers().is_empty());
        assert!(!q.deliver(TransferId::new()));
        q.consume(1).unwrap();
        assert!(matches!(
            q.consume(1),
            Err(TransportError::InsufficientStock { available: 0, .. })
        ));
    }

    #[test]
    fn cleanup_drains_and_withdraws() {
        let mut e = economy();
        let mut q = queue(4);
        q.set_filled(3);
        q.update(Some(&mut e));
        let result = q.cleanup(Some(&mut e));
        assert_eq!(result.drained, 3);
        assert!(result.orphaned.is_empty());
        assert_eq!(q.filled(), 0);
        assert!(q.request().is_none());
        assert!(e.requests().is_empty());
    }

    #[test]
    fn register_and_unregister_live_request() {
        let mut a = economy();
        let mut b = economy();
        let mut q = queue(2);
        q.update(Some(&mut a));
        q.remove_from_economy(&mut a);
        q.add_to_economy(&mut b);
        assert!(a.requests().is_empty());
        assert_eq!(b.requests().len(), 1);
    }
}
