//! Data models for notifications and the wire protocol.
//!
//! Server payloads arrive as [`NotificationPayload`] (everything optional,
//! camelCase envelope) and are normalized into [`Notification`] with
//! fallback ids and keyword-derived type/priority.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::display;

/// Kind of notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationType {
    Ticket,
    System,
    User,
    Payment,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::Ticket => "ticket",
            NotificationType::System => "system",
            NotificationType::User => "user",
            NotificationType::Payment => "payment",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ticket" => Some(NotificationType::Ticket),
            "system" => Some(NotificationType::System),
            "user" => Some(NotificationType::User),
            "payment" => Some(NotificationType::Payment),
            _ => None,
        }
    }
}

/// Priority of a notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationPriority {
    Low,
    Medium,
    High,
    Urgent,
}

impl NotificationPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationPriority::Low => "low",
            NotificationPriority::Medium => "medium",
            NotificationPriority::High => "high",
            NotificationPriority::Urgent => "urgent",
        }
    }
}

/// Who sent a notification, when the server includes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SenderInfo {
    pub username: String,
    #[serde(default)]
    pub account_type: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Reference to the ticket a notification is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketRef {
    pub id: String,
}

/// A fully normalized notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub message: String,
    pub date: DateTime<Utc>,
    pub read: bool,
    #[serde(rename = "type")]
    pub kind: NotificationType,
    pub priority: NotificationPriority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<SenderInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ticket_ref: Option<TicketRef>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, serde_json::Value>,
}

/// Raw notification as it arrives on the wire.
///
/// Servers are inconsistent about which fields they populate, so everything
/// beyond the message is optional and filled in by [`normalize`](Self::normalize).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub read: bool,
    #[serde(rename = "type", default)]
    pub kind: Option<NotificationType>,
    #[serde(default)]
    pub priority: Option<NotificationPriority>,
    #[serde(default)]
    pub sender: Option<SenderInfo>,
    #[serde(default)]
    pub ticket_ref: Option<TicketRef>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
}

impl NotificationPayload {
    /// Normalize a wire payload into a [`Notification`].
    ///
    /// Missing ids get a client-side fallback id, missing type/priority are
    /// derived from message keywords, and a missing date defaults to now.
    pub fn normalize(self) -> Notification {
        let kind = self
            .kind
            .unwrap_or_else(|| display::derive_kind(&self.message));
        let priority = self
            .priority
            .unwrap_or_else(|| display::derive_priority(&self.message));
        Notification {
            id: self.id.unwrap_or_else(fallback_id),
            date: self.date.unwrap_or_else(Utc::now),
            read: self.read,
            kind,
            priority,
            message: self.message,
            sender: self.sender,
            ticket_ref: self.ticket_ref,
            metadata: self.metadata,
        }
    }
}

/// Generate a client-side fallback id for payloads the server sent without one.
///
/// Non-cryptographic, time plus random suffix. The `local-` prefix keeps these
/// ids disjoint from server-issued ids used in mutation calls.
pub fn fallback_id() -> String {
    format!(
        "local-{}-{:06x}",
        Utc::now().timestamp_millis(),
        rand::random::<u32>() & 0xff_ffff
    )
}

/// Envelope of the list and search endpoints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    #[serde(default)]
    pub response_data: Vec<NotificationPayload>,
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub unread_count: Option<usize>,
}

/// Result of a list or search call, after unwrapping the envelope.
#[derive(Debug, Clone, Default)]
pub struct NotificationResponse {
    pub items: Vec<NotificationPayload>,
    pub unread_count: Option<usize>,
}

/// Body of `POST notification/delete-multiple`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteManyRequest {
    pub notification_ids: Vec<String>,
}

/// Body of `POST tickets/update-agent`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocateTicketRequest {
    pub id: String,
    pub assigned_agent: AgentRef,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRef {
    pub id: String,
}

/// Per-user notification preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    pub enabled: bool,
    pub email: bool,
    pub push: bool,
    #[serde(default)]
    pub muted_types: Vec<NotificationType>,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            enabled: true,
            email: true,
            push: false,
            muted_types: Vec::new(),
        }
    }
}

/// Partial preferences update; only set fields are sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub push: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub muted_types: Option<Vec<NotificationType>>,
}

/// Aggregate counts from `GET notification/stats`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationStats {
    pub total: usize,
    pub unread: usize,
    #[serde(default)]
    pub by_type: HashMap<String, usize>,
}

/// Filter for list and search calls, rendered as query parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ListFilter {
    pub unread_only: bool,
    pub kind: Option<NotificationType>,
    pub limit: Option<usize>,
}

impl ListFilter {
    /// True when the filter selects everything, in which case the list call
    /// is eligible for the TTL cache.
    pub fn is_empty(&self) -> bool {
        !self.unread_only && self.kind.is_none() && self.limit.is_none()
    }

    pub(crate) fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if self.unread_only {
            pairs.push(("unreadOnly", "true".to_string()));
        }
        if let Some(kind) = self.kind {
            pairs.push(("type", kind.as_str().to_string()));
        }
        if let Some(limit) = self.limit {
            pairs.push(("limit", limit.to_string()));
        }
        pairs
    }
}
