//! Counted stock of ware or worker types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use waymark_types::{WareIndex, WareKind};

use crate::error::TransportError;

/// Stock counts per ware (or worker) type.
///
/// Zero counts are never stored, so two lists with the same stock compare
/// equal regardless of their history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WareList {
    kind: WareKind,
    counts: BTreeMap<WareIndex, u32>,
}

impl WareList {
    /// Create an empty list for wares or workers.
    pub const fn new(kind: WareKind) -> Self {
        Self {
            kind,
            counts: BTreeMap::new(),
        }
    }

    /// Whether this list counts wares or workers.
    pub const fn kind(&self) -> WareKind {
        self.kind
    }

    /// Units of the given type in stock.
    pub fn stock(&self, ware: WareIndex) -> u32 {
        self.counts.get(&ware).copied().unwrap_or(0)
    }

    /// Add units of a type.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ArithmeticOverflow`] if the count overflows.
    pub fn add(&mut self, ware: WareIndex, count: u32) -> Result<(), TransportError> {
        if count == 0 {
            return Ok(());
        }
        let entry = self.counts.entry(ware).or_insert(0);
        *entry = entry
            .checked_add(count)
            .ok_or(TransportError::ArithmeticOverflow)?;
        Ok(())
    }

    /// Remove units of a type.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::InsufficientStock`] if fewer than `count`
    /// units are stored; the list is left unchanged.
    pub fn remove(&mut self, ware: WareIndex, count: u32) -> Result<(), TransportError> {
        if count == 0 {
            return Ok(());
        }
        let available = self.stock(ware);
        let remaining = available
            .checked_sub(count)
            .ok_or(TransportError::InsufficientStock {
                kind: self.kind,
                ware,
                requested: count,
                available,
            })?;
        if remaining == 0 {
            self.counts.remove(&ware);
        } else {
            self.counts.insert(ware, remaining);
        }
        Ok(())
    }

    /// Add every count of `other` to this list. All or nothing: on
    /// overflow the list is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ArithmeticOverflow`] if any count overflows.
    pub fn add_all(&mut self, other: &Self) -> Result<(), TransportError> {
        *self = self.union(other)?;
        Ok(())
    }

    /// A new list holding the counts of both lists.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::ArithmeticOverflow`] if any count overflows.
    pub fn union(&self, other: &Self) -> Result<Self, TransportError> {
        let mut sum = self.clone();
        for (ware, count) in other.iter() {
            sum.add(ware, count)?;
        }
        Ok(sum)
    }

    /// Iterate over `(type, count)` pairs with non-zero counts.
    pub fn iter(&self) -> impl Iterator<Item = (WareIndex, u32)> + '_ {
        self.counts.iter().map(|(w, c)| (*w, *c))
    }

    /// Total units across all types.
    pub fn total(&self) -> u64 {
        self.counts.values().map(|c| u64::from(*c)).sum()
    }

    /// Whether no units are stored.
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.counts.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const LOG: WareIndex = WareIndex(0);
    const PLANKS: WareIndex = WareIndex(1);

    #[test]
    fn add_and_remove() {
        let mut list = WareList::new(WareKind::Ware);
        list.add(LOG, 5).unwrap();
        list.remove(LOG, 2).unwrap();
        assert_eq!(list.stock(LOG), 3);
        assert_eq!(list.stock(PLANKS), 0);
    }

    #[test]
    fn remove_more_than_stored_fails_unchanged() {
        let mut list = WareList::new(WareKind::Worker);
        list.add(LOG, 1).unwrap();
        let err = list.remove(LOG, 2);
        assert!(matches!(
            err,
            Err(TransportError::InsufficientStock {
                kind: WareKind::Worker,
                requested: 2,
                available: 1,
                ..
            })
        ));
        assert_eq!(list.stock(LOG), 1);
    }

    #[test]
    fn zero_counts_are_dropped() {
        let mut a = WareList::new(WareKind::Ware);
        a.add(LOG, 2).unwrap();
        a.remove(LOG, 2).unwrap();
        assert!(a.is_empty());
        assert_eq!(a, WareList::new(WareKind::Ware));
    }

    #[test]
    fn add_all_sums_lists() {
        let mut a = WareList::new(WareKind::Ware);
        let mut b = WareList::new(WareKind::Ware);
        a.add(LOG, 2).unwrap();
        b.add(LOG, 3).unwrap();
        b.add(PLANKS, 4).unwrap();
        a.add_all(&b).unwrap();
        assert_eq!(a.stock(LOG), 5);
        assert_eq!(a.stock(PLANKS), 4);
        assert_eq!(a.total(), 9);
    }

    #[test]
    fn overflow_is_reported() {
        let mut list = WareList::new(WareKind::Ware);
        list.add(LOG, u32::MAX).unwrap();
        assert!(matches!(
            list.add(LOG, 1),
            Err(TransportError::ArithmeticOverflow)
        ));
    }
}
