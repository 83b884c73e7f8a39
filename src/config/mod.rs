mod file_config;

pub use file_config::FileConfig;

use anyhow::{bail, Result};
use std::time::Duration;

/// Resolved notification engine settings.
///
/// Defaults match the deployed widget: 10s request timeout, 3 retries with
/// a 1s linear backoff step, 30s list cache, 30s poll interval, 50 items.
#[derive(Debug, Clone)]
pub struct NotificationSettings {
    /// Server base URL without the `/api/` suffix (e.g. "https://host:8443").
    pub server_url: String,
    pub request_timeout_secs: u64,
    pub max_retries: u32,
    /// Linear backoff step: attempt `n` waits `n * retry_backoff_ms`.
    pub retry_backoff_ms: u64,
    pub cache_ttl_secs: u64,
    pub refresh_interval_secs: u64,
    /// Cap on the notification list held in the store.
    pub max_notifications: usize,
}

impl NotificationSettings {
    /// Settings with defaults for the given server.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: normalize_url(server_url.into()),
            request_timeout_secs: 10,
            max_retries: 3,
            retry_backoff_ms: 1_000,
            cache_ttl_secs: 30,
            refresh_interval_secs: 30,
            max_notifications: 50,
        }
    }

    /// Resolve settings from an explicit server URL and optional TOML file
    /// config. File values override defaults where present.
    pub fn resolve(server_url: Option<String>, file_config: Option<FileConfig>) -> Result<Self> {
        let file = file_config.unwrap_or_default();

        let server_url = file.server_url.or(server_url);
        let Some(server_url) = server_url else {
            bail!("server_url must be specified explicitly or in the config file");
        };
        if server_url.trim().is_empty() {
            bail!("server_url must not be empty");
        }

        let mut settings = Self::new(server_url);
        if let Some(timeout) = file.request_timeout_secs {
            settings.request_timeout_secs = timeout;
        }
        if let Some(retries) = file.max_retries {
            settings.max_retries = retries;
        }
        if let Some(backoff) = file.retry_backoff_ms {
            settings.retry_backoff_ms = backoff;
        }
        if let Some(ttl) = file.cache_ttl_secs {
            settings.cache_ttl_secs = ttl;
        }
        if let Some(interval) = file.refresh_interval_secs {
            settings.refresh_interval_secs = interval;
        }
        if let Some(max) = file.max_notifications {
            if max == 0 {
                bail!("max_notifications must be greater than zero");
            }
            settings.max_notifications = max;
        }

        Ok(settings)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }
}

fn normalize_url(url: String) -> String {
    url.trim_end_matches('/').to_string()
}
