//! Notification Center Engine Library
//!
//! Client-side engine for a notification center: a gateway wrapping the
//! server's notification API with caching and retries, a store holding the
//! rendered state, and a controller tying user actions and periodic refresh
//! together.

pub mod auth;
pub mod config;
pub mod controller;
pub mod display;
pub mod error;
pub mod gateway;
pub mod models;
pub mod store;

// Re-export commonly used types for convenience
pub use auth::{MemoryTokenStore, TokenProvider};
pub use config::{FileConfig, NotificationSettings};
pub use controller::{
    DialogOutcome, NotificationController, NotificationDialog, UserProvider, UserRef,
};
pub use error::{ErrorCode, ErrorInfo};
pub use gateway::{NotificationApi, NotificationGateway};
pub use models::{Notification, NotificationPriority, NotificationType};
pub use store::{NotificationState, NotificationStore};
