//! Per-economy memo of route lookups.
//!
//! A matching pass asks for many routes between the same few flags. The
//! cache remembers results for one economy until its `rebuild_cycle`
//! changes, i.e. until a road inside the economy is built or removed.
//! Congestion changes without bumping the cycle, so only `wait == true`
//! lookups (which ignore congestion) are cached.

use std::cell::RefCell;
use std::collections::BTreeMap;

use waymark_types::FlagId;

use crate::route::{Route, RouteFinder, within_cutoff};

/// What a previous search established for a flag pair.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CachedLookup {
    /// The cheapest route.
    Found(Route),
    /// No route exists that costs at most this much (`None`: no route).
    NotWithin(Option<u32>),
}

/// Route results for one economy, valid for one rebuild cycle.
#[derive(Debug, Clone, Default)]
pub struct RouteCache {
    cycle: u64,
    entries: BTreeMap<(FlagId, FlagId), CachedLookup>,
}

impl RouteCache {
    /// Drop every entry if the economy's graph changed since they were
    /// recorded.
    pub fn sync(&mut self, cycle: u64) {
        if self.cycle != cycle {
            self.entries.clear();
            self.cycle = cycle;
        }
    }

    /// Number of cached flag pairs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Answer a lookup from the cache.
    ///
    /// Returns `Some(answer)` when a recorded result decides the query:
    /// a cached route is the cheapest one, so it answers any cutoff; a
    /// cached miss answers every query with an equal or tighter cutoff.
    fn lookup(&self, start: FlagId, end: FlagId, cutoff: Option<u32>) -> Option<Option<Route>> {
        match self.entries.get(&(start, end))? {
            CachedLookup::Found(route) => {
                Some(within_cutoff(route.cost, cutoff).then(|| route.clone()))
            }
            CachedLookup::NotWithin(searched) => {
                let covered = match (searched, cutoff) {
                    (None, _) => true,
                    (Some(_), None) => false,
                    (Some(searched), Some(asked)) => asked <= *searched,
                };
                covered.then_some(None)
            }
        }
    }

    fn store(&mut self, start: FlagId, end: FlagId, cutoff: Option<u32>, result: Option<&Route>) {
        let entry = match result {
            Some(route) => CachedLookup::Found(route.clone()),
            None => CachedLookup::NotWithin(cutoff),
        };
        self.entries.insert((start, end), entry);
    }
}

/// Wraps a [`RouteFinder`] with an economy's [`RouteCache`].
pub struct CachedRouteFinder<'a, F: RouteFinder + ?Sized> {
    inner: &'a F,
    cache: RefCell<&'a mut RouteCache>,
}

impl<'a, F: RouteFinder + ?Sized> CachedRouteFinder<'a, F> {
    /// Wrap `inner`, first invalidating `cache` if `cycle` moved on.
    pub fn new(inner: &'a F, cache: &'a mut RouteCache, cycle: u64) -> Self {
        cache.sync(cycle);
        Self {
            inner,
            cache: RefCell::new(cache),
        }
    }
}

impl<F: RouteFinder + ?Sized> RouteFinder for CachedRouteFinder<'_, F> {
    fn find_route(
        &self,
        start: FlagId,
        end: FlagId,
        wait: bool,
        cost_cutoff: Option<u32>,
    ) -> Option<Route> {
        if !wait {
            return self.inner.find_route(start, end, wait, cost_cutoff);
        }
        if let Some(answer) = self.cache.borrow().lookup(start, end, cost_cutoff) {
            return answer;
        }
        let result = self.inner.find_route(start, end, wait, cost_cutoff);
        self.cache
            .borrow_mut()
            .store(start, end, cost_cutoff, result.as_ref());
        result
    }
}
