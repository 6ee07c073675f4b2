//! Read fallthrough and write fan-out across the storage tiers.
//!
//! # Responsibility
//! - `fetch`: local, then fast cache, then durable store; warm skipped tiers on a hit.
//! - `save_fast`: local synchronously plus a fire-and-forget fast cache write.
//! - `sync_durable`: one upsert per key at a time, extra calls resolve immediately.
//!
//! # Invariants
//! - A local hit returns before any network call is made.
//! - A durable sync for a key never overlaps another one for the same key.
//! - `clear_all` leaves durable rows in place.

use crate::model::sync_data::SyncData;
use crate::store::{DurableStore, FastCache, LocalStore, StateTier, SyncOutcome, WarmMode};
use crate::sync::spawn_background;
use log::{debug, info};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

type InFlightKeys = Arc<Mutex<HashSet<String>>>;

pub struct PersistenceCoordinator {
    local: Arc<LocalStore>,
    fast: Arc<FastCache>,
    durable: Arc<DurableStore>,
    /// Read order, fastest first.
    tiers: Vec<Arc<dyn StateTier>>,
    in_flight: InFlightKeys,
}

impl PersistenceCoordinator {
    pub fn new(local: Arc<LocalStore>, fast: Arc<FastCache>, durable: Arc<DurableStore>) -> Self {
        let tiers = vec![
            local.clone() as Arc<dyn StateTier>,
            fast.clone() as Arc<dyn StateTier>,
            durable.clone() as Arc<dyn StateTier>,
        ];
        Self {
            local,
            fast,
            durable,
            tiers,
            in_flight: Arc::default(),
        }
    }

    pub fn local(&self) -> &Arc<LocalStore> {
        &self.local
    }

    pub fn fast_cache(&self) -> &Arc<FastCache> {
        &self.fast
    }

    /// First hit in tier order, or `None` when no tier holds state for `key`.
    pub async fn fetch(&self, key: &str) -> Option<SyncData> {
        let started_at = Instant::now();
        for (index, tier) in self.tiers.iter().enumerate() {
            let Some(data) = tier.read(key).await else {
                continue;
            };
            info!(
                "event=state_fetch module=sync status=ok key={key} tier={} duration_ms={}",
                tier.tier_name(),
                started_at.elapsed().as_millis()
            );
            for faster in &self.tiers[..index] {
                warm_tier(faster, key, &data).await;
            }
            return Some(data);
        }
        info!(
            "event=state_fetch module=sync status=miss key={key} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        None
    }

    /// Writes the local tier now and the fast cache in the background.
    pub fn save_fast(&self, key: &str, data: &SyncData) {
        self.local.save(key, data);
        if !self.fast.is_enabled() {
            return;
        }
        let fast = self.fast.clone();
        let key = key.to_string();
        let data = data.clone();
        spawn_background("cache_save", async move {
            fast.save(&key, &data).await;
        });
    }

    /// Upserts `data` unless a sync for `key` is already outstanding.
    ///
    /// A skipped call reports success; the newer state lands with the next sync.
    pub async fn sync_durable(&self, key: &str, data: &SyncData) -> SyncOutcome {
        match self.begin_sync(key) {
            Some(sync) => sync.run(data).await,
            None => SyncOutcome::ok(),
        }
    }

    /// Claims the durable slot for `key`; `None` while another sync holds it.
    pub fn begin_sync(&self, key: &str) -> Option<DurableSync> {
        let Some(guard) = InFlightGuard::acquire(&self.in_flight, key) else {
            debug!("event=durable_sync module=sync status=skip key={key} reason=in_flight");
            return None;
        };
        Some(DurableSync {
            durable: self.durable.clone(),
            guard,
        })
    }

    pub fn is_syncing(&self, key: &str) -> bool {
        lock_keys(&self.in_flight).contains(key)
    }

    /// Drops local state and asks the fast cache to forget `key`.
    pub fn clear_all(&self, key: &str) {
        self.local.clear(key);
        info!("event=state_clear module=sync status=ok key={key}");
        if !self.fast.is_enabled() {
            return;
        }
        let fast = self.fast.clone();
        let key = key.to_string();
        spawn_background("cache_delete", async move {
            fast.delete(&key).await;
        });
    }
}

/// Exclusive right to upsert one key; released when the upsert finishes or is dropped.
pub struct DurableSync {
    durable: Arc<DurableStore>,
    guard: InFlightGuard,
}

impl DurableSync {
    pub async fn run(self, data: &SyncData) -> SyncOutcome {
        self.durable.upsert(&self.guard.key, data).await
    }
}

async fn warm_tier(tier: &Arc<dyn StateTier>, key: &str, data: &SyncData) {
    debug!(
        "event=state_warm module=sync status=start key={key} tier={}",
        tier.tier_name()
    );
    match tier.warm_mode() {
        WarmMode::Inline => tier.warm(key, data).await,
        WarmMode::Background => {
            let tier = tier.clone();
            let key = key.to_string();
            let data = data.clone();
            spawn_background("state_warm", async move {
                tier.warm(&key, &data).await;
            });
        }
    }
}

fn lock_keys(keys: &InFlightKeys) -> MutexGuard<'_, HashSet<String>> {
    keys.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Marks a key as syncing until dropped, including when the sync future is cancelled.
struct InFlightGuard {
    keys: InFlightKeys,
    key: String,
}

impl InFlightGuard {
    fn acquire(keys: &InFlightKeys, key: &str) -> Option<Self> {
        if !lock_keys(keys).insert(key.to_string()) {
            return None;
        }
        Some(Self {
            keys: keys.clone(),
            key: key.to_string(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        lock_keys(&self.keys).remove(&self.key);
    }
}
