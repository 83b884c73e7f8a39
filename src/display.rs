//! Presentation helpers shared by the controller and view glue.
//!
//! Message cleanup, ticket detection, the keyword heuristics used to derive
//! type/priority for payloads that omit them, and relative-time formatting.

use chrono::{DateTime, Utc};

use crate::models::{NotificationPriority, NotificationType};

/// Substrings that mark a message as a ticket notification.
const TICKET_MARKERS: &[&str] = &["ticket", "new ticket", "support request"];

/// Strip the structured payload suffix from a raw message.
///
/// Returns the part before the first `{`, trimmed. Falls back to the raw
/// message when that would be empty.
pub fn clean_message(raw: &str) -> &str {
    let cleaned = match raw.find('{') {
        Some(idx) => raw[..idx].trim(),
        None => raw.trim(),
    };
    if cleaned.is_empty() {
        raw
    } else {
        cleaned
    }
}

/// True if the message text indicates a ticket notification.
pub fn is_ticket_notification(message: &str) -> bool {
    let lower = message.to_lowercase();
    TICKET_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Derive a priority from message keywords when the payload omits one.
pub fn derive_priority(message: &str) -> NotificationPriority {
    let lower = message.to_lowercase();
    if lower.contains("urgent") || lower.contains("critical") {
        NotificationPriority::Urgent
    } else if lower.contains("important") || lower.contains("ticket") {
        NotificationPriority::High
    } else if lower.contains("reminder") {
        NotificationPriority::Medium
    } else {
        NotificationPriority::Low
    }
}

/// Derive a notification type from message keywords when the payload omits one.
pub fn derive_kind(message: &str) -> NotificationType {
    let lower = message.to_lowercase();
    if lower.contains("ticket") {
        NotificationType::Ticket
    } else if lower.contains("payment") {
        NotificationType::Payment
    } else if lower.contains("user") {
        NotificationType::User
    } else {
        NotificationType::System
    }
}

/// Format the age of a notification relative to `now`.
///
/// Under a minute: "Just now"; then minutes, hours and days; a week or older
/// renders as a plain date.
pub fn relative_time(date: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = now.signed_duration_since(date).num_seconds().max(0);
    if secs < 60 {
        "Just now".to_string()
    } else if secs < 3_600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86_400 {
        format!("{}h ago", secs / 3_600)
    } else if secs < 7 * 86_400 {
        format!("{}d ago", secs / 86_400)
    } else {
        date.format("%b %e, %Y").to_string()
    }
}
