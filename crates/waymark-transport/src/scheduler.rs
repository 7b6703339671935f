//! Delayed, coalesced balance passes.
//!
//! Changes to an economy (new requests, new stock, a road built) do not
//! run a matching pass immediately. They schedule one a short delay in
//! the future, and every further change inside that window joins the
//! already scheduled pass. Commands carry a token; an economy only runs a
//! command whose token matches its current one, so commands issued before
//! a merge or split are dropped as stale.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};
use waymark_types::FlagId;

/// A balance pass waiting to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledBalance {
    /// Game time the pass becomes due.
    pub due: u64,
    /// Insertion order, breaks ties between equal `due` times.
    pub seq: u64,
    /// A flag of the economy at scheduling time. The economy is looked up
    /// through this flag when the command runs.
    pub flag: FlagId,
    /// Token the economy must still hold for the pass to run.
    pub token: u64,
}

impl Ord for ScheduledBalance {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.due, self.seq).cmp(&(other.due, other.seq))
    }
}

impl PartialOrd for ScheduledBalance {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Min-heap of pending balance commands plus the token counter.
#[derive(Debug, Clone, Default)]
pub struct BalanceScheduler {
    queue: BinaryHeap<Reverse<ScheduledBalance>>,
    next_token: u64,
    next_seq: u64,
}

impl BalanceScheduler {
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a token never handed out before.
    pub fn issue_token(&mut self) -> u64 {
        self.next_token = self.next_token.wrapping_add(1);
        self.next_token
    }

    /// Schedule a pass.
    pub fn schedule(&mut self, due: u64, flag: FlagId, token: u64) {
        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.queue.push(Reverse(ScheduledBalance {
            due,
            seq,
            flag,
            token,
        }));
    }

    /// Pop the earliest command due at or before `now`.
    pub fn pop_due(&mut self, now: u64) -> Option<ScheduledBalance> {
        if self.queue.peek().is_some_and(|Reverse(next)| next.due <= now) {
            self.queue.pop().map(|Reverse(cmd)| cmd)
        } else {
            None
        }
    }

    /// Due time of the earliest command.
    pub fn next_due(&self) -> Option<u64> {
        self.queue.peek().map(|Reverse(cmd)| cmd.due)
    }

    /// Number of commands waiting, stale ones included.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Whether no command is waiting.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_are_unique_and_increasing() {
        let mut s = BalanceScheduler::new();
        let a = s.issue_token();
        let b = s.issue_token();
        assert!(b > a);
    }

    #[test]
    fn pops_in_due_order_then_insertion_order() {
        let mut s = BalanceScheduler::new();
        let flag = FlagId::new();
        s.schedule(300, flag, 1);
        s.schedule(100, flag, 2);
        s.schedule(100, flag, 3);
        assert_eq!(s.next_due(), Some(100));
        assert_eq!(s.pop_due(1000).map(|c| c.token), Some(2));
        assert_eq!(s.pop_due(1000).map(|c| c.token), Some(3));
        assert_eq!(s.pop_due(1000).map(|c| c.token), Some(1));
        assert!(s.is_empty());
    }

    #[test]
    fn nothing_pops_before_due() {
        let mut s = BalanceScheduler::new();
        s.schedule(200, FlagId::new(), 1);
        assert!(s.pop_due(199).is_none());
        assert_eq!(s.len(), 1);
        assert!(s.pop_due(200).is_some());
    }
}
