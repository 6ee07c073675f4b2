//! Storage tiers holding copies of session state.
//!
//! # Responsibility
//! - Local durable store: synchronous SQLite, always available.
//! - Fast cache: optional Redis-over-REST, disableable.
//! - Durable store: authoritative row store over PostgREST.
//! - A uniform read/warm capability so the coordinator can walk tiers in order.
//!
//! # Invariants
//! - Local and fast tiers never surface errors to callers.
//! - Durable writes report a `SyncOutcome` instead of an error.

use crate::model::sync_data::SyncData;
use async_trait::async_trait;

pub mod durable;
pub mod fast_cache;
pub mod local;

pub use durable::{DurableBackend, DurableError, DurableRow, DurableStore, PostgrestBackend};
pub use fast_cache::{CacheBackend, CacheError, FastCache, RestCacheBackend};
pub use local::{LocalStore, STATE_KEY_PREFIX};

/// Result of a durable write.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SyncOutcome {
    pub success: bool,
    pub error: Option<String>,
}

impl SyncOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
        }
    }
}

/// How the coordinator writes a hit from a slower tier back into this one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarmMode {
    /// Awaited before the read returns.
    Inline,
    /// Spawned; the read returns without waiting.
    Background,
}

/// One tier in the read fallthrough order.
#[async_trait]
pub trait StateTier: Send + Sync {
    fn tier_name(&self) -> &'static str;

    /// Best-effort read; any failure is a miss.
    async fn read(&self, key: &str) -> Option<SyncData>;

    /// Best-effort write of a value found in a slower tier.
    async fn warm(&self, key: &str, data: &SyncData);

    fn warm_mode(&self) -> WarmMode {
        WarmMode::Inline
    }
}
