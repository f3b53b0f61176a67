// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Shared LRU cache of store pages, keyed by the checkpoint they follow.
//!
//! # Invariants
//! - Only full pages are cached. A short page marks the live tail of the
//!   store and would hide commits appended after it was read.

use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard};
use strata_kernel::types::{Checkpoint, Commit};

pub type Page = Arc<[Commit]>;

pub struct PageCache {
    pages: Mutex<LruCache<Checkpoint, Page>>,
    page_size: usize,
}

impl PageCache {
    pub fn new(capacity: NonZeroUsize, page_size: usize) -> Self {
        Self {
            pages: Mutex::new(LruCache::new(capacity)),
            page_size,
        }
    }

    // The cache holds copies of immutable commits, so a poisoned lock
    // cannot leave it inconsistent.
    fn lock(&self) -> MutexGuard<'_, LruCache<Checkpoint, Page>> {
        self.pages.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, after: Checkpoint) -> Option<Page> {
        self.lock().get(&after).cloned()
    }

    /// Returns whether the page was kept.
    pub fn insert(&self, after: Checkpoint, page: Page) -> bool {
        if page.len() < self.page_size {
            return false;
        }
        self.lock().put(after, page);
        true
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_kernel::fixtures;

    fn page(len: usize) -> Page {
        (0..len)
            .map(|i| Commit::new(fixtures::attempt("s", 1, 1, 1), Checkpoint::from_raw(i as u64 + 1)))
            .collect::<Vec<_>>()
            .into()
    }

    #[test]
    fn test_short_pages_are_not_cached() {
        let cache = PageCache::new(NonZeroUsize::new(4).unwrap(), 3);
        assert!(!cache.insert(Checkpoint::ORIGIN, page(2)));
        assert!(cache.get(Checkpoint::ORIGIN).is_none());
        assert!(cache.insert(Checkpoint::ORIGIN, page(3)));
        assert_eq!(cache.get(Checkpoint::ORIGIN).unwrap().len(), 3);
    }

    #[test]
    fn test_least_recently_used_page_is_evicted() {
        let cache = PageCache::new(NonZeroUsize::new(2).unwrap(), 1);
        cache.insert(Checkpoint::from_raw(0), page(1));
        cache.insert(Checkpoint::from_raw(1), page(1));
        cache.get(Checkpoint::from_raw(0));
        cache.insert(Checkpoint::from_raw(2), page(1));

        assert_eq!(cache.len(), 2);
        assert!(cache.get(Checkpoint::from_raw(1)).is_none());
        assert!(cache.get(Checkpoint::from_raw(0)).is_some());
    }

    #[test]
    fn test_clear_drops_every_page() {
        let cache = PageCache::new(NonZeroUsize::new(4).unwrap(), 2);
        cache.insert(Checkpoint::from_raw(0), page(2));
        cache.insert(Checkpoint::from_raw(2), page(2));
        assert_eq!(cache.len(), 2);

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.get(Checkpoint::from_raw(0)).is_none());
    }
}
