//! Per-economy target quantities.
//!
//! Every economy keeps one [`TargetQuantity`] per ware type. The table
//! starts from the tribe defaults, is changed by player settings, decays as
//! wares leave warehouse stock, and is resolved per ware by recency when
//! two economies merge. Workers have no target quantities.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use waymark_types::{TargetQuantity, WareIndex, WareKind};

use crate::error::TransportError;
use crate::tribe::Tribe;

/// The target-quantity table of one economy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetQuantities {
    entries: BTreeMap<WareIndex, TargetQuantity>,
}

impl TargetQuantities {
    /// Seed a table from the tribe's default target quantities.
    pub fn from_tribe(tribe: &Tribe) -> Self {
        let entries = tribe
            .ware_indices()
            .filter_map(|ware| {
                tribe
                    .ware(ware)
                    .map(|d| (ware, TargetQuantity::with_default(d.default_target_quantity)))
            })
            .collect();
        Self { entries }
    }

    /// Target quantity for a ware type.
    pub fn get(&self, ware: WareIndex) -> Option<&TargetQuantity> {
        self.entries.get(&ware)
    }

    /// Iterate over all `(ware, target)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (WareIndex, &TargetQuantity)> + '_ {
        self.entries.iter().map(|(w, tq)| (*w, tq))
    }

    /// Overwrite the entry for a ware (used when restoring snapshots).
    pub(crate) fn insert(&mut self, ware: WareIndex, target: TargetQuantity) {
        let temporary = target.temporary.max(target.permanent);
        self.entries.insert(ware, TargetQuantity { temporary, ..target });
    }

    /// Set both levels of a ware's target. A `temporary` below `permanent`
    /// is raised to `permanent`.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::UnknownWare`] if the table has no entry for
    /// the ware.
    pub fn set(
        &mut self,
        ware: WareIndex,
        permanent: u32,
        temporary: u32,
        now: u64,
    ) -> Result<(), TransportError> {
        let entry = self.entry_mut(ware)?;
        entry.permanent = permanent;
        entry.temporary = temporary.max(permanent);
        entry.last_modified = now;
        Ok(())
    }

    /// Reset a ware's target back to the tribe default.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::UnknownWare`] if the ware is not in the
    /// table or not in the tribe.
    pub fn reset(&mut self, ware: WareIndex, tribe: &Tribe, now: u64) -> Result<(), TransportError> {
        let default = tribe
            .ware(ware)
            .map(|d| d.default_target_quantity)
            .ok_or(TransportError::UnknownWare {
                kind: WareKind::Ware,
                ware,
            })?;
        self.set(ware, default, default, now)
    }

    /// Let `count` consumed units of a ware lower its temporary target,
    /// never below the permanent level. Returns by how much it dropped.
    pub fn consume(&mut self, ware: WareIndex, count: u32) -> u32 {
        let Some(entry) = self.entries.get_mut(&ware) else {
            return 0;
        };
        let slack = entry.temporary.saturating_sub(entry.permanent);
        let drop = slack.min(count);
        entry.temporary = entry.temporary.saturating_sub(drop);
        drop
    }

    /// Resolve a merge: for every ware, keep whichever setting was modified
    /// more recently. Ties keep this table's setting.
    pub fn merge_newer(&mut self, other: &Self) {
        for (ware, theirs) in &other.entries {
            match self.entries.get_mut(ware) {
                Some(ours) if theirs.last_modified > ours.last_modified => *ours = *theirs,
                Some(_) => {}
                None => {
                    self.entries.insert(*ware, *theirs);
                }
            }
        }
    }

    fn entry_mut(&mut self, ware: WareIndex) -> Result<&mut TargetQuantity, TransportError> {
        self.entries.get_mut(&ware).ok_or(TransportError::UnknownWare {
            kind: WareKind::Ware,
            ware,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const LOG: WareIndex = WareIndex(0);

    fn table() -> TargetQuantities {
        TargetQuantities::from_tribe(&Tribe::default())
    }

    #[test]
    fn seeded_from_tribe_defaults() {
        let t = table();
        let log = t.get(LOG).unwrap();
        assert_eq!(log.permanent, 20);
        assert_eq!(log.temporary, 20);
    }

    #[test]
    fn temporary_never_below_permanent_on_set() {
        let mut t = table();
        t.set(LOG, 5, 2, 100).unwrap();
        let log = t.get(LOG).unwrap();
        assert_eq!(log.permanent, 5);
        assert_eq!(log.temporary, 5);
        assert_eq!(log.last_modified, 100);
    }

    #[test]
    fn consume_decays_to_permanent() {
        let mut t = table();
        t.set(LOG, 2, 12, 0).unwrap();
        assert_eq!(t.consume(LOG, 4), 4);
        assert_eq!(t.get(LOG).unwrap().temporary, 8);
        assert_eq!(t.consume(LOG, 100), 6);
        assert_eq!(t.get(LOG).unwrap().temporary, 2);
        assert_eq!(t.consume(LOG, 1), 0);
    }

    #[test]
    fn merge_keeps_newer_setting() {
        let mut a = table();
        let mut b = table();
        a.set(LOG, 1, 7, 10).unwrap();
        b.set(LOG, 1, 30, 20).unwrap();
        a.merge_newer(&b);
        assert_eq!(a.get(LOG).unwrap().temporary, 30);

        let mut c = table();
        c.set(LOG, 1, 3, 5).unwrap();
        a.merge_newer(&c);
        assert_eq!(a.get(LOG).unwrap().temporary, 30);
    }

    #[test]
    fn reset_restores_default() {
        let mut t = table();
        t.set(LOG, 1, 1, 10).unwrap();
        t.reset(LOG, &Tribe::default(), 50).unwrap();
        let log = t.get(LOG).unwrap();
        assert_eq!((log.permanent, log.temporary, log.last_modified), (20, 20, 50));
    }

    #[test]
    fn unknown_ware_is_rejected() {
        let mut t = table();
        assert!(matches!(
            t.set(WareIndex(500), 1, 1, 0),
            Err(TransportError::UnknownWare { .. })
        ));
    }
}
