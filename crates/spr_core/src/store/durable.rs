//! Authoritative durable store over a PostgREST row table.
//!
//! # Responsibility
//! - Fetch the newest saved state for a session key.
//! - Upsert one row per key, last writer wins.
//!
//! # Invariants
//! - One row per key: `{id = key, key, data, updated_at}`.
//! - Reads fail to `None`; writes fail to `SyncOutcome { success: false }`.
//! - No retries here; timing belongs to the coordinator.

use crate::config::DurableStoreConfig;
use crate::logging::error_summary;
use crate::model::sync_data::SyncData;
use crate::store::{StateTier, SyncOutcome};
use async_trait::async_trait;
use log::{debug, info, warn};
use reqwest::{header, Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Outcome message when the request never got a response.
pub const NETWORK_INTERRUPTED: &str = "Network synchronization interrupted.";

#[derive(Debug)]
pub enum DurableError {
    Http(reqwest::Error),
    Status { status: u16, body: String },
    Decode(String),
}

impl Display for DurableError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Http(err) => write!(f, "durable store request failed: {err}"),
            Self::Status { status, body } => {
                write!(f, "durable store returned status {status}: {body}")
            }
            Self::Decode(message) => write!(f, "durable store response malformed: {message}"),
        }
    }
}

impl Error for DurableError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Http(err) => Some(err),
            Self::Status { .. } | Self::Decode(_) => None,
        }
    }
}

impl From<reqwest::Error> for DurableError {
    fn from(value: reqwest::Error) -> Self {
        Self::Http(value)
    }
}

pub type DurableResult<T> = Result<T, DurableError>;

/// One persisted session row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DurableRow {
    pub id: String,
    pub key: String,
    pub data: SyncData,
    /// RFC 3339 timestamp.
    pub updated_at: String,
}

impl DurableRow {
    pub fn new(key: &str, data: SyncData) -> Self {
        Self {
            id: key.to_string(),
            key: key.to_string(),
            data,
            updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[async_trait]
pub trait DurableBackend: Send + Sync {
    /// `data` column of the first row matching `key`.
    async fn fetch_data(&self, key: &str) -> DurableResult<Option<SyncData>>;
    /// Insert or replace the row whose `key` matches.
    async fn upsert_row(&self, row: &DurableRow) -> DurableResult<()>;
}

pub struct PostgrestBackend {
    base_url: String,
    api_key: String,
    table: String,
    client: Client,
}

#[derive(Deserialize)]
struct DataColumn {
    data: Option<SyncData>,
}

impl PostgrestBackend {
    pub fn new(config: &DurableStoreConfig, timeout: Duration) -> DurableResult<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            table: config.table_name.clone(),
            client,
        })
    }

    fn table_url(&self) -> String {
        format!("{}/rest/v1/{}", self.base_url, self.table)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn check(response: Response) -> DurableResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(DurableError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl DurableBackend for PostgrestBackend {
    async fn fetch_data(&self, key: &str) -> DurableResult<Option<SyncData>> {
        let url = format!(
            "{}?key=eq.{}&select=data",
            self.table_url(),
            urlencoding::encode(key)
        );
        let response = self
            .authorized(self.client.get(url))
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;
        let rows: Vec<DataColumn> = Self::check(response)
            .await?
            .json()
            .await
            .map_err(|err| DurableError::Decode(err.to_string()))?;
        Ok(rows.into_iter().next().and_then(|row| row.data))
    }

    async fn upsert_row(&self, row: &DurableRow) -> DurableResult<()> {
        let url = format!("{}?on_conflict=key", self.table_url());
        let response = self
            .authorized(self.client.post(url))
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(row)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}

/// Fail-safe facade over a [`DurableBackend`].
#[derive(Clone)]
pub struct DurableStore {
    backend: Arc<dyn DurableBackend>,
}

impl DurableStore {
    pub fn new(backend: Arc<dyn DurableBackend>) -> Self {
        Self { backend }
    }

    pub fn from_config(config: &DurableStoreConfig, timeout: Duration) -> DurableResult<Self> {
        Ok(Self::new(Arc::new(PostgrestBackend::new(config, timeout)?)))
    }

    pub async fn fetch(&self, key: &str) -> Option<SyncData> {
        match self.backend.fetch_data(key).await {
            Ok(found) => {
                debug!(
                    "event=durable_fetch module=store status={} key={key}",
                    if found.is_some() { "ok" } else { "miss" }
                );
                found
            }
            Err(err) => {
                warn!(
                    "event=durable_fetch module=store status=error key={key} error={}",
                    error_summary(&err)
                );
                None
            }
        }
    }

    pub async fn upsert(&self, key: &str, data: &SyncData) -> SyncOutcome {
        let started_at = Instant::now();
        let row = DurableRow::new(key, data.clone());
        match self.backend.upsert_row(&row).await {
            Ok(()) => {
                info!(
                    "event=durable_upsert module=store status=ok key={key} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                SyncOutcome::ok()
            }
            Err(err) => {
                warn!(
                    "event=durable_upsert module=store status=error key={key} duration_ms={} error={}",
                    started_at.elapsed().as_millis(),
                    error_summary(&err)
                );
                SyncOutcome::failed(match err {
                    DurableError::Http(_) => NETWORK_INTERRUPTED.to_string(),
                    DurableError::Status { body, .. } => body,
                    DurableError::Decode(message) => message,
                })
            }
        }
    }
}

#[async_trait]
impl StateTier for DurableStore {
    fn tier_name(&self) -> &'static str {
        "durable"
    }

    async fn read(&self, key: &str) -> Option<SyncData> {
        self.fetch(key).await
    }

    async fn warm(&self, key: &str, data: &SyncData) {
        self.upsert(key, data).await;
    }
}
