//! Controller binding view intents to gateway calls.
//!
//! Owns the store, the polling loop and the optimistic-update flow. User
//! actions mutate local state first and fall back to a silent resynchronizing
//! refresh when the server disagrees, rather than attempting piecewise
//! rollback.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::NotificationSettings;
use crate::display;
use crate::gateway::NotificationApi;
use crate::models::Notification;
use crate::store::NotificationStore;

/// What the user did with an opened notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogOutcome {
    Accept,
    Dismiss,
}

/// View collaborator that displays a notification's full content.
#[async_trait]
pub trait NotificationDialog: Send + Sync {
    async fn open(&self, notification: &Notification) -> DialogOutcome;
}

/// The authenticated user, as far as ticket allocation is concerned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRef {
    pub id: String,
}

/// Supplies the current authenticated user.
pub trait UserProvider: Send + Sync {
    fn current_user(&self) -> Option<UserRef>;
}

/// Orchestrates polling refresh, user actions and store reconciliation.
///
/// The store is created here and torn down with the controller; nothing else
/// writes to it.
pub struct NotificationController {
    api: Arc<dyn NotificationApi>,
    store: Arc<NotificationStore>,
    dialog: Arc<dyn NotificationDialog>,
    users: Arc<dyn UserProvider>,
    settings: NotificationSettings,
    panel_open: AtomicBool,
    /// Bumped at the start of every refresh; a completion whose generation is
    /// no longer current lost the race and must not overwrite fresher state.
    refresh_generation: AtomicU64,
    shutdown_token: CancellationToken,
    poll_handle: Mutex<Option<JoinHandle<()>>>,
}

impl NotificationController {
    pub fn new(
        api: Arc<dyn NotificationApi>,
        dialog: Arc<dyn NotificationDialog>,
        users: Arc<dyn UserProvider>,
        settings: NotificationSettings,
    ) -> Self {
        Self {
            api,
            store: Arc::new(NotificationStore::new()),
            dialog,
            users,
            settings,
            panel_open: AtomicBool::new(false),
            refresh_generation: AtomicU64::new(0),
            shutdown_token: CancellationToken::new(),
            poll_handle: Mutex::new(None),
        }
    }

    /// The state the view renders from. Read-only for callers.
    pub fn store(&self) -> Arc<NotificationStore> {
        Arc::clone(&self.store)
    }

    /// First fetch plus the periodic refresh task.
    pub async fn initialize(self: &Arc<Self>) {
        self.refresh(false).await;
        self.spawn_poll_loop();
    }

    fn spawn_poll_loop(self: &Arc<Self>) {
        let controller = Arc::clone(self);
        let interval = self.settings.refresh_interval();
        let token = self.shutdown_token.clone();

        let handle = tokio::spawn(async move {
            info!("notification poll loop started ({:?} interval)", interval);
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {
                        // Skip while the panel is open so a background swap
                        // does not disrupt what the user is looking at.
                        if controller.panel_open.load(Ordering::SeqCst) {
                            debug!("panel open, skipping periodic refresh");
                        } else {
                            controller.refresh(true).await;
                        }
                    }
                    _ = token.cancelled() => {
                        debug!("notification poll loop stopped");
                        break;
                    }
                }
            }
        });

        *self.poll_handle.lock().unwrap() = Some(handle);
    }

    /// Fetch the list and replace store state in one write.
    ///
    /// A silent refresh leaves the loading indicator alone; a visible one
    /// raises it and clears any prior error first. Either way the indicator
    /// is lowered on completion, success or not.
    pub async fn refresh(&self, silent: bool) {
        if self.shutdown_token.is_cancelled() {
            return;
        }

        let generation = self.refresh_generation.fetch_add(1, Ordering::SeqCst) + 1;

        if !silent {
            self.store.clear_error();
            self.store.set_loading(true);
        }

        let result = self.api.list_notifications(None).await;

        if self.shutdown_token.is_cancelled() {
            return;
        }

        let current = self.refresh_generation.load(Ordering::SeqCst) == generation;
        match result {
            Ok(response) if current => {
                let mut notifications: Vec<Notification> = response
                    .items
                    .into_iter()
                    .map(|payload| payload.normalize())
                    .collect();
                // Newest first; sort is stable so equal dates keep arrival order
                notifications.sort_by(|a, b| b.date.cmp(&a.date));
                notifications.truncate(self.settings.max_notifications);
                self.store.replace(notifications, Utc::now());
            }
            Ok(_) => {
                debug!("discarding notification refresh that lost the race");
            }
            Err(err) if current => {
                warn!("notification refresh failed: {}", err);
                self.store.set_error(err);
            }
            Err(err) => {
                debug!("stale notification refresh failed: {}", err);
            }
        }

        self.store.set_loading(false);
    }

    /// Tell the controller whether the dropdown panel is visible. Periodic
    /// refresh pauses while it is.
    pub fn set_panel_open(&self, open: bool) {
        self.panel_open.store(open, Ordering::SeqCst);
    }

    /// Optimistically mark one notification read, then confirm with the
    /// server. Repeats on an already-read notification are no-ops.
    pub async fn mark_as_read(&self, notification: &Notification) {
        if !self.store.mark_read(&notification.id) {
            return;
        }
        if let Err(err) = self.api.mark_read(&notification.id).await {
            warn!("mark-read failed for {}: {}", notification.id, err);
            self.resync().await;
        }
    }

    /// Optimistically mark everything read, then confirm with the server.
    pub async fn mark_all_as_read(&self) {
        self.store.mark_all_read();
        if let Err(err) = self.api.mark_all_read().await {
            warn!("mark-all-read failed: {}", err);
            self.resync().await;
        }
    }

    /// Optimistically remove one notification, then confirm with the server.
    pub async fn delete(&self, notification: &Notification) {
        self.store.remove(&notification.id);
        if let Err(err) = self.api.delete(&notification.id).await {
            warn!("delete failed for {}: {}", notification.id, err);
            self.resync().await;
        }
    }

    /// Open a notification: mark it read, hand it to the dialog collaborator,
    /// and on an accepted ticket notification assign the ticket to the
    /// current user. Missing ticket or user ids degrade to a logged no-op.
    pub async fn open_notification(&self, notification: &Notification) {
        self.mark_as_read(notification).await;

        let outcome = self.dialog.open(notification).await;
        if outcome != DialogOutcome::Accept
            || !display::is_ticket_notification(&notification.message)
        {
            return;
        }

        let Some(ticket_id) = ticket_id_of(notification) else {
            warn!(
                "ticket notification {} has no ticket reference, skipping allocation",
                notification.id
            );
            return;
        };
        let Some(user) = self.users.current_user() else {
            warn!("no authenticated user, skipping ticket allocation");
            return;
        };

        match self.api.allocate_ticket(&ticket_id, &user.id).await {
            Ok(()) => info!("ticket {} allocated to {}", ticket_id, user.id),
            Err(err) => {
                warn!("ticket allocation failed for {}: {}", ticket_id, err);
                self.store.set_error(err);
            }
        }
    }

    /// Resynchronize with server truth after a failed optimistic action.
    /// The cache is dropped first so the refresh cannot be served the very
    /// state that just diverged.
    async fn resync(&self) {
        self.api.clear_cache();
        self.refresh(true).await;
    }

    /// Cancel the poll loop and any in-flight refresh writes.
    pub async fn shutdown(&self) {
        self.shutdown_token.cancel();
        let handle = self.poll_handle.lock().unwrap().take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        info!("notification controller shut down");
    }
}

/// Ticket id of a notification: the explicit reference when present,
/// otherwise a `ticketId` entry in the metadata.
fn ticket_id_of(notification: &Notification) -> Option<String> {
    if let Some(ticket) = &notification.ticket_ref {
        return Some(ticket.id.clone());
    }
    notification
        .metadata
        .get("ticketId")
        .and_then(|value| value.as_str())
        .map(|id| id.to_string())
}
