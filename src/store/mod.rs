//! Single source of truth for notification view state.
//!
//! The store is written only by the controller; view code reads through the
//! accessors. Every mutation funnels through one internal write helper that
//! recomputes the unread count before releasing the lock, so readers never
//! observe `notifications` and `unread_count` out of sync.

use std::sync::RwLock;

use chrono::{DateTime, Utc};

use crate::error::ErrorInfo;
use crate::models::Notification;

/// Snapshot of the notification view state.
#[derive(Debug, Clone, Default)]
pub struct NotificationState {
    /// Newest-first, capped by the controller at the configured maximum.
    pub notifications: Vec<Notification>,
    pub loading: bool,
    pub error: Option<ErrorInfo>,
    pub last_fetch_at: Option<DateTime<Utc>>,
    /// Always equals the number of unread entries in `notifications`.
    pub unread_count: usize,
}

/// Holds [`NotificationState`] behind a lock with single-writer discipline.
#[derive(Default)]
pub struct NotificationStore {
    state: RwLock<NotificationState>,
}

impl NotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single choke point for mutation: recomputes the unread count after
    /// every write, which is what keeps the invariant unconditional.
    fn write<R>(&self, f: impl FnOnce(&mut NotificationState) -> R) -> R {
        let mut state = self.state.write().unwrap();
        let result = f(&mut state);
        state.unread_count = state.notifications.iter().filter(|n| !n.read).count();
        result
    }

    // Read accessors

    pub fn snapshot(&self) -> NotificationState {
        self.state.read().unwrap().clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.state.read().unwrap().notifications.clone()
    }

    pub fn unread_count(&self) -> usize {
        self.state.read().unwrap().unread_count
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().unwrap().loading
    }

    pub fn error(&self) -> Option<ErrorInfo> {
        self.state.read().unwrap().error.clone()
    }

    pub fn last_fetch_at(&self) -> Option<DateTime<Utc>> {
        self.state.read().unwrap().last_fetch_at
    }

    // Mutations (controller only)

    pub fn set_loading(&self, loading: bool) {
        self.write(|state| state.loading = loading);
    }

    pub fn clear_error(&self) {
        self.write(|state| state.error = None);
    }

    pub fn set_error(&self, error: ErrorInfo) {
        self.write(|state| state.error = Some(error));
    }

    /// Replace the whole notification list atomically. Clears any previous
    /// error and stamps the fetch time.
    pub fn replace(&self, notifications: Vec<Notification>, fetched_at: DateTime<Utc>) {
        self.write(|state| {
            state.notifications = notifications;
            state.last_fetch_at = Some(fetched_at);
            state.error = None;
        });
    }

    /// Mark one notification read. Returns false when the id is unknown or
    /// the notification was already read, so callers can skip the network
    /// call on repeats.
    pub fn mark_read(&self, id: &str) -> bool {
        self.write(|state| {
            match state
                .notifications
                .iter_mut()
                .find(|n| n.id == id && !n.read)
            {
                Some(notification) => {
                    notification.read = true;
                    true
                }
                None => false,
            }
        })
    }

    /// Mark everything read. Returns how many notifications changed.
    pub fn mark_all_read(&self) -> usize {
        self.write(|state| {
            let mut changed = 0;
            for notification in state.notifications.iter_mut().filter(|n| !n.read) {
                notification.read = true;
                changed += 1;
            }
            changed
        })
    }

    /// Remove one notification by id, returning it when present.
    pub fn remove(&self, id: &str) -> Option<Notification> {
        self.write(|state| {
            let idx = state.notifications.iter().position(|n| n.id == id)?;
            Some(state.notifications.remove(idx))
        })
    }
}
