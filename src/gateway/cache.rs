//! Short-lived cache of the last successful list response.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::models::NotificationPayload;

/// The cached list response.
#[derive(Debug, Clone)]
pub(crate) struct CachedList {
    pub items: Vec<NotificationPayload>,
    pub unread_count: Option<usize>,
}

impl CachedList {
    /// Unread count, from the server field when present, otherwise counted
    /// from the items.
    pub fn unread(&self) -> usize {
        self.unread_count
            .unwrap_or_else(|| self.items.iter().filter(|i| !i.read).count())
    }
}

/// TTL cache holding at most one entry: the last successful unfiltered list.
///
/// Shared across every caller of the owning gateway instance; invalidated
/// wholesale by `clear`.
pub(crate) struct ResponseCache {
    ttl: Duration,
    entry: Mutex<Option<(Instant, CachedList)>>,
}

impl ResponseCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entry: Mutex::new(None),
        }
    }

    /// Return the cached list if it is younger than the TTL. A stale entry
    /// is dropped on the way out.
    pub fn get(&self) -> Option<CachedList> {
        let mut entry = self.entry.lock().unwrap();
        match entry.as_ref() {
            Some((stored_at, cached)) if stored_at.elapsed() < self.ttl => Some(cached.clone()),
            Some(_) => {
                entry.take();
                None
            }
            None => None,
        }
    }

    pub fn put(&self, items: Vec<NotificationPayload>, unread_count: Option<usize>) {
        let mut entry = self.entry.lock().unwrap();
        *entry = Some((
            Instant::now(),
            CachedList {
                items,
                unread_count,
            },
        ));
    }

    /// Apply an in-place patch to the cached entry, if one exists.
    ///
    /// Used by mutations (mark read, delete) to keep the cache consistent
    /// without a refetch. Does not touch the entry's age. The server-provided
    /// unread count is dropped so [`CachedList::unread`] recounts the items.
    pub fn patch<R>(&self, f: impl FnOnce(&mut Vec<NotificationPayload>) -> R) -> Option<R> {
        let mut entry = self.entry.lock().unwrap();
        entry.as_mut().map(|(_, cached)| {
            let result = f(&mut cached.items);
            cached.unread_count = None;
            result
        })
    }

    pub fn clear(&self) {
        self.entry.lock().unwrap().take();
    }
}
