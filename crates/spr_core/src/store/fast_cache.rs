//! Optional Redis-over-REST fast cache.
//!
//! # Responsibility
//! - Low-latency cross-device copies of session state.
//! - A global switch that turns every operation into a local no-op.
//!
//! # Invariants
//! - When disabled, no backend call is made at all.
//! - No retries: one failed attempt is one miss.
//! - `is_ready` reflects the last completed backend call, never a live check.

use crate::config::FastCacheConfig;
use crate::logging::error_summary;
use crate::model::sync_data::SyncData;
use crate::store::{StateTier, WarmMode};
use async_trait::async_trait;
use log::{debug, warn};
use reqwest::{header, Client, Response};
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug)]
pub enum CacheError {
    Http(reqwest::Error),
    Status { status: u16, body: String },
    Decode(String),
}

impl Display for CacheError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(err) => write!(f, "cache request failed: {err}"),
            Self::Status { status, body } => write!(f, "cache returned status {status}: {body}"),
            Self::Decode(message) => write!(f, "cache response malformed: {message}"),
        }
    }
}

impl Error for CacheError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Http(err) => Some(err),
            Self::Status { .. } | Self::Decode(_) => None,
        }
    }
}

impl From<reqwest::Error> for CacheError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Raw string key/value transport under the fast cache.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn set(&self, key: &str, value: &str) -> CacheResult<()>;
    /// `Ok(None)` when the key does not exist.
    async fn get(&self, key: &str) -> CacheResult<Option<String>>;
    async fn del(&self, key: &str) -> CacheResult<()>;
    async fn ping(&self) -> CacheResult<()>;
}

/// Upstash-style REST endpoint speaking bearer-authenticated HTTP.
pub struct RestCacheBackend {
    base_url: String,
    token: String,
    client: Client,
}

#[derive(Deserialize)]
struct GetResponse {
    result: Option<String>,
}

impl RestCacheBackend {
    pub fn new(base_url: &str, token: &str, timeout: Duration) -> CacheResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            client,
        })
    }

    fn url(&self, command: &str, key: &str) -> String {
        format!("{}/{command}/{}", self.base_url, urlencoding::encode(key))
    }

    async fn check(response: Response) -> CacheResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(CacheError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl CacheBackend for RestCacheBackend {
    async fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        let response = self
            .client
            .post(self.url("set", key))
            .bearer_auth(&self.token)
            .header(header::CONTENT_TYPE, "application/json")
            .body(value.to_string())
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let response = self
            .client
            .get(self.url("get", key))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let body: GetResponse = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|err| CacheError::Decode(err.to_string()))?;
        Ok(body.result.filter(|value| !value.is_empty()))
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        let response = self
            .client
            .delete(self.url("del", key))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn ping(&self) -> CacheResult<()> {
        let response = self
            .client
            .get(format!("{}/ping", self.base_url))
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

/// Fail-safe session-state cache over a [`CacheBackend`].
pub struct FastCache {
    backend: Arc<dyn CacheBackend>,
    enabled: AtomicBool,
    connected: AtomicBool,
}

impl FastCache {
    pub fn new(backend: Arc<dyn CacheBackend>, enabled: bool) -> Self {
        Self {
            backend,
            enabled: AtomicBool::new(enabled),
            connected: AtomicBool::new(false),
        }
    }

    /// REST-backed cache; disabled when no endpoint is configured.
    pub fn from_config(config: &FastCacheConfig, timeout: Duration) -> CacheResult<Self> {
        let backend = RestCacheBackend::new(&config.rest_url, &config.password, timeout)?;
        let enabled = config.enabled && !config.rest_url.is_empty();
        Ok(Self::new(Arc::new(backend), enabled))
    }

    pub fn enable(&self) {
        self.enabled.store(true, Ordering::SeqCst);
    }

    pub fn disable(&self) {
        self.enabled.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    /// Outcome of the most recent backend call.
    pub fn is_ready(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    pub async fn save(&self, key: &str, data: &SyncData) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let payload = match serde_json::to_string(data) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(
                    "event=cache_save module=store status=error key={key} error_code=serialize_failed error={}",
                    error_summary(&err)
                );
                return false;
            }
        };
        let result = self.backend.set(key, &payload).await;
        self.record("cache_save", key, result).is_some()
    }

    pub async fn get(&self, key: &str) -> Option<SyncData> {
        if !self.is_enabled() {
            return None;
        }
        let result = self.backend.get(key).await;
        let payload = self.record("cache_get", key, result)??;
        match serde_json::from_str(&payload) {
            Ok(data) => Some(data),
            Err(err) => {
                warn!(
                    "event=cache_get module=store status=error key={key} error_code=corrupt_payload error={}",
                    error_summary(&err)
                );
                None
            }
        }
    }

    pub async fn delete(&self, key: &str) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let result = self.backend.del(key).await;
        self.record("cache_delete", key, result).is_some()
    }

    /// Pings the endpoint and refreshes readiness.
    pub async fn ping(&self) -> bool {
        if !self.is_enabled() {
            return false;
        }
        let result = self.backend.ping().await;
        self.record("cache_ping", "-", result).is_some()
    }

    fn record<T>(&self, event: &str, key: &str, result: CacheResult<T>) -> Option<T> {
        self.connected.store(result.is_ok(), Ordering::SeqCst);
        match result {
            Ok(value) => {
                debug!("event={event} module=store status=ok key={key}");
                Some(value)
            }
            Err(err) => {
                warn!(
                    "event={event} module=store status=error key={key} error={}",
                    error_summary(&err)
                );
                None
            }
        }
    }
}

#[async_trait]
impl StateTier for FastCache {
    fn tier_name(&self) -> &'static str {
        "fast_cache"
    }

    async fn read(&self, key: &str) -> Option<SyncData> {
        self.get(key).await
    }

    async fn warm(&self, key: &str, data: &SyncData) {
        self.save(key, data).await;
    }

    fn warm_mode(&self) -> WarmMode {
        WarmMode::Background
    }
}
