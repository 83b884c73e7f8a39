//! HTTP client for the notification API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use tokio::sync::watch;
use tracing::{debug, warn};

use super::cache::ResponseCache;
use super::NotificationApi;
use crate::auth::TokenProvider;
use crate::config::NotificationSettings;
use crate::error::{ErrorCode, ErrorInfo};
use crate::models::{
    AgentRef, AllocateTicketRequest, DeleteManyRequest, ListFilter, ListResponse,
    NotificationPreferences, NotificationResponse, NotificationStats, PreferencesUpdate,
};

/// Gateway to the notification REST API.
///
/// Owns the HTTP client (shared request timeout), the list TTL cache and the
/// last-known unread count. One instance is meant to be shared by everything
/// that talks to the same server; construct it explicitly and inject it.
pub struct NotificationGateway {
    client: Client,
    base_url: String,
    tokens: Arc<dyn TokenProvider>,
    cache: ResponseCache,
    max_retries: u32,
    retry_backoff_ms: u64,
    unread_tx: watch::Sender<usize>,
    // Held so the sender always has a receiver and reads stay synchronous.
    unread_rx: watch::Receiver<usize>,
}

impl NotificationGateway {
    /// Create a gateway for the server named in `settings`.
    pub fn new(
        settings: &NotificationSettings,
        tokens: Arc<dyn TokenProvider>,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(settings.request_timeout())
            .build()?;

        let (unread_tx, unread_rx) = watch::channel(0);

        Ok(Self {
            client,
            base_url: settings.server_url.trim_end_matches('/').to_string(),
            tokens,
            cache: ResponseCache::new(settings.cache_ttl()),
            max_retries: settings.max_retries,
            retry_backoff_ms: settings.retry_backoff_ms,
            unread_tx,
            unread_rx,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Watch the unread count. Best-effort last-known values; a collaborator
    /// can persist these across sessions if it wants to.
    pub fn subscribe_unread(&self) -> watch::Receiver<usize> {
        self.unread_tx.subscribe()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    /// Fresh request builder with the bearer header attached when a token is
    /// available. Built per attempt so retries re-read the token.
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut builder = self.client.request(method, self.url(path));
        if let Some(token) = self.tokens.token() {
            builder = builder.bearer_auth(token);
        }
        builder
    }

    /// Linear backoff: attempt `n` waits `n * retry_backoff_ms`.
    fn backoff_delay(&self, retry_count: u32) -> Duration {
        Duration::from_millis(self.retry_backoff_ms * u64::from(retry_count))
    }

    /// Send a request and classify any failure.
    ///
    /// A 401 additionally invalidates the stored credential so the next call
    /// re-authenticates.
    async fn execute(&self, builder: RequestBuilder) -> Result<reqwest::Response, ErrorInfo> {
        let response = builder.send().await.map_err(classify_transport)?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status.as_u16() == 401 {
            debug!("got 401, invalidating stored credential");
            self.tokens.invalidate();
        }

        let message = error_message(response).await;
        Err(ErrorInfo::from_status(status.as_u16(), message))
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, ErrorInfo> {
        let response = self.execute(builder).await?;
        response.json::<T>().await.map_err(|err| {
            ErrorInfo::new(
                ErrorCode::ClientError,
                format!("failed to parse response: {}", err),
            )
        })
    }

    /// List with retry: transient failures are retried up to the configured
    /// maximum with linearly increasing delays.
    async fn fetch_list(&self, filter: Option<&ListFilter>) -> Result<ListResponse, ErrorInfo> {
        let mut retry_count: u32 = 0;
        loop {
            let mut builder = self.request(Method::GET, "notification/all");
            if let Some(filter) = filter {
                builder = builder.query(&filter.query_pairs());
            }

            match self.execute_json::<ListResponse>(builder).await {
                Ok(response) => return Ok(response),
                Err(err) if err.is_transient() && retry_count < self.max_retries => {
                    retry_count += 1;
                    let delay = self.backoff_delay(retry_count);
                    warn!(
                        "notification list failed ({}), retry {}/{} in {:?}",
                        err, retry_count, self.max_retries, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn publish_unread(&self, unread: usize) {
        let _ = self.unread_tx.send(unread);
    }

    /// After a mutation patched the cache, republish the recounted unread
    /// value. With no (fresh) cache the counter stays as-is until the next
    /// successful list call.
    fn republish_from_cache(&self) {
        if let Some(cached) = self.cache.get() {
            self.publish_unread(cached.unread());
        }
    }
}

#[async_trait]
impl NotificationApi for NotificationGateway {
    async fn list_notifications(
        &self,
        filter: Option<&ListFilter>,
    ) -> Result<NotificationResponse, ErrorInfo> {
        let cacheable = filter.map_or(true, |f| f.is_empty());
        if cacheable {
            if let Some(cached) = self.cache.get() {
                debug!("serving notification list from cache");
                let unread = cached.unread();
                return Ok(NotificationResponse {
                    items: cached.items,
                    unread_count: Some(unread),
                });
            }
        }

        let response = self.fetch_list(filter).await?;
        let unread = response
            .unread_count
            .unwrap_or_else(|| response.response_data.iter().filter(|i| !i.read).count());

        if cacheable {
            self.cache
                .put(response.response_data.clone(), response.unread_count);
            self.publish_unread(unread);
        }

        Ok(NotificationResponse {
            items: response.response_data,
            unread_count: Some(unread),
        })
    }

    async fn search_notifications(
        &self,
        query: &str,
        filter: Option<&ListFilter>,
    ) -> Result<NotificationResponse, ErrorInfo> {
        let mut pairs = vec![("search", query.to_string())];
        if let Some(filter) = filter {
            pairs.extend(filter.query_pairs());
        }
        let builder = self
            .request(Method::GET, "notification/search")
            .query(&pairs);

        let response = self.execute_json::<ListResponse>(builder).await?;
        Ok(NotificationResponse {
            items: response.response_data,
            unread_count: response.unread_count,
        })
    }

    async fn mark_read(&self, id: &str) -> Result<(), ErrorInfo> {
        let path = format!("notification/{}/read", id);
        self.execute(self.request(Method::PATCH, &path)).await?;

        self.cache.patch(|items| {
            if let Some(item) = items.iter_mut().find(|i| i.id.as_deref() == Some(id)) {
                item.read = true;
            }
        });
        self.republish_from_cache();
        Ok(())
    }

    async fn mark_unread(&self, id: &str) -> Result<(), ErrorInfo> {
        let path = format!("notification/{}/unread", id);
        self.execute(self.request(Method::PATCH, &path)).await?;

        self.cache.patch(|items| {
            if let Some(item) = items.iter_mut().find(|i| i.id.as_deref() == Some(id)) {
                item.read = false;
            }
        });
        self.republish_from_cache();
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<(), ErrorInfo> {
        self.execute(self.request(Method::PATCH, "notification/mark-all-read"))
            .await?;

        self.cache.patch(|items| {
            for item in items.iter_mut() {
                item.read = true;
            }
        });
        self.publish_unread(0);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), ErrorInfo> {
        let path = format!("notification/{}", id);
        self.execute(self.request(Method::DELETE, &path)).await?;

        self.cache
            .patch(|items| items.retain(|i| i.id.as_deref() != Some(id)));
        self.republish_from_cache();
        Ok(())
    }

    async fn delete_many(&self, ids: &[String]) -> Result<(), ErrorInfo> {
        let body = DeleteManyRequest {
            notification_ids: ids.to_vec(),
        };
        self.execute(
            self.request(Method::POST, "notification/delete-multiple")
                .json(&body),
        )
        .await?;

        self.cache.patch(|items| {
            items.retain(|i| {
                i.id.as_deref()
                    .map(|id| !ids.iter().any(|wanted| wanted == id))
                    .unwrap_or(true)
            })
        });
        self.republish_from_cache();
        Ok(())
    }

    async fn allocate_ticket(&self, ticket_id: &str, agent_id: &str) -> Result<(), ErrorInfo> {
        let body = AllocateTicketRequest {
            id: ticket_id.to_string(),
            assigned_agent: AgentRef {
                id: agent_id.to_string(),
            },
        };
        self.execute(self.request(Method::POST, "tickets/update-agent").json(&body))
            .await?;
        Ok(())
    }

    async fn get_preferences(&self) -> Result<NotificationPreferences, ErrorInfo> {
        self.execute_json(self.request(Method::GET, "notification/preferences"))
            .await
    }

    async fn set_preferences(
        &self,
        update: &PreferencesUpdate,
    ) -> Result<NotificationPreferences, ErrorInfo> {
        self.execute_json(
            self.request(Method::PUT, "notification/preferences")
                .json(update),
        )
        .await
    }

    async fn get_stats(&self) -> Result<NotificationStats, ErrorInfo> {
        self.execute_json(self.request(Method::GET, "notification/stats"))
            .await
    }

    fn unread_count(&self) -> usize {
        *self.unread_rx.borrow()
    }

    fn clear_cache(&self) {
        self.cache.clear();
    }
}

/// Classify a failure that happened before a response arrived.
fn classify_transport(err: reqwest::Error) -> ErrorInfo {
    if err.is_timeout() {
        ErrorInfo::timeout(format!("request timed out: {}", err))
    } else {
        ErrorInfo::client(format!("request failed: {}", err))
    }
}

/// Pull a human-readable message out of an error response body.
async fn error_message(response: reqwest::Response) -> String {
    let status = response.status();
    let fallback = format!("request failed with status {}", status);
    let Ok(text) = response.text().await else {
        return fallback;
    };
    if text.is_empty() {
        return fallback;
    }
    // Prefer the server's message field when the body is JSON
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(&text) {
        if let Some(message) = value.get("message").and_then(|m| m.as_str()) {
            return message.to_string();
        }
    }
    text
}
