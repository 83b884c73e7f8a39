//! Network gateway for the notification API.
//!
//! [`NotificationApi`] is the seam the controller depends on;
//! [`NotificationGateway`] is the reqwest-backed implementation with TTL
//! caching, retry-with-backoff and typed error classification.

mod cache;
mod client;

pub use client::NotificationGateway;

use async_trait::async_trait;

use crate::error::ErrorInfo;
use crate::models::{
    ListFilter, NotificationPreferences, NotificationResponse, NotificationStats,
    PreferencesUpdate,
};

/// Domain operations against the notification API.
///
/// Every async operation resolves to either a normalized response or a
/// classified [`ErrorInfo`]; implementations never surface transport errors.
#[async_trait]
pub trait NotificationApi: Send + Sync {
    /// Fetch the notification list. Unfiltered calls may be served from the
    /// TTL cache without a network round trip.
    async fn list_notifications(
        &self,
        filter: Option<&ListFilter>,
    ) -> Result<NotificationResponse, ErrorInfo>;

    /// Full-text search; never cached.
    async fn search_notifications(
        &self,
        query: &str,
        filter: Option<&ListFilter>,
    ) -> Result<NotificationResponse, ErrorInfo>;

    async fn mark_read(&self, id: &str) -> Result<(), ErrorInfo>;

    async fn mark_unread(&self, id: &str) -> Result<(), ErrorInfo>;

    async fn mark_all_read(&self) -> Result<(), ErrorInfo>;

    async fn delete(&self, id: &str) -> Result<(), ErrorInfo>;

    async fn delete_many(&self, ids: &[String]) -> Result<(), ErrorInfo>;

    /// Assign a ticket to an agent.
    async fn allocate_ticket(&self, ticket_id: &str, agent_id: &str) -> Result<(), ErrorInfo>;

    async fn get_preferences(&self) -> Result<NotificationPreferences, ErrorInfo>;

    async fn set_preferences(
        &self,
        update: &PreferencesUpdate,
    ) -> Result<NotificationPreferences, ErrorInfo>;

    async fn get_stats(&self) -> Result<NotificationStats, ErrorInfo>;

    /// Last known unread count. Zero-cost synchronous read, no network.
    fn unread_count(&self) -> usize;

    /// Drop the cached list wholesale; the next list call hits the network.
    fn clear_cache(&self);
}
