#![allow(dead_code)]

use async_trait::async_trait;
use spr_core::error::{ServiceError, ServiceResult};
use spr_core::store::durable::DurableResult;
use spr_core::store::fast_cache::CacheResult;
use spr_core::store::{
    CacheBackend, CacheError, DurableBackend, DurableError, DurableRow, DurableStore, FastCache,
    LocalStore,
};
use spr_core::{
    NodeKind, PersistenceCoordinator, RecordAttachmentService, SessionController, SessionDeps,
    SessionSettings, SkeletonGenerator, SkeletonNode, SyncData,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;

pub const SYNC_DEBOUNCE: Duration = Duration::from_millis(1000);
pub const SCROLL_DEBOUNCE: Duration = Duration::from_millis(500);

/// root > chapter > {A, B}, both concept slots.
pub fn sample_skeleton() -> SkeletonNode {
    SkeletonNode::new("root", NodeKind::Root).with_children(vec![SkeletonNode::new(
        "chapter",
        NodeKind::Chapter,
    )
    .with_children(vec![
        SkeletonNode::new("A", NodeKind::ConceptSlot),
        SkeletonNode::new("B", NodeKind::ConceptSlot),
    ])])
}

pub fn sample_state() -> SyncData {
    SyncData::fresh("# root\n\nA and B.", sample_skeleton())
}

/// In-memory cache backend counting every call.
#[derive(Default)]
pub struct CountingCacheBackend {
    values: Mutex<HashMap<String, String>>,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl CountingCacheBackend {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_requests(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn stored(&self, key: &str) -> Option<SyncData> {
        let values = self.values.lock().unwrap();
        values
            .get(key)
            .map(|raw| serde_json::from_str(raw).unwrap())
    }

    pub fn insert(&self, key: &str, data: &SyncData) {
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), serde_json::to_string(data).unwrap());
    }

    fn begin(&self) -> CacheResult<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(CacheError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl CacheBackend for CountingCacheBackend {
    async fn set(&self, key: &str, value: &str) -> CacheResult<()> {
        self.begin()?;
        self.values
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> CacheResult<Option<String>> {
        self.begin()?;
        Ok(self.values.lock().unwrap().get(key).cloned())
    }

    async fn del(&self, key: &str) -> CacheResult<()> {
        self.begin()?;
        self.values.lock().unwrap().remove(key);
        Ok(())
    }

    async fn ping(&self) -> CacheResult<()> {
        self.begin()
    }
}

/// In-memory durable backend; upserts can be held open with a gate.
#[derive(Default)]
pub struct GatedDurableBackend {
    rows: Mutex<HashMap<String, SyncData>>,
    fetches: AtomicUsize,
    upserts: AtomicUsize,
    gate: Mutex<Option<Arc<Notify>>>,
    entered: Notify,
}

impl GatedDurableBackend {
    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.fetches() + self.upserts()
    }

    pub fn row(&self, key: &str) -> Option<SyncData> {
        self.rows.lock().unwrap().get(key).cloned()
    }

    pub fn insert(&self, key: &str, data: SyncData) {
        self.rows.lock().unwrap().insert(key.to_string(), data);
    }

    /// Holds the next upsert until the returned notifier fires.
    pub fn hold_upserts(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Resolves once an upsert has started.
    pub async fn upsert_started(&self) {
        self.entered.notified().await;
    }
}

#[async_trait]
impl DurableBackend for GatedDurableBackend {
    async fn fetch_data(&self, key: &str) -> DurableResult<Option<SyncData>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.row(key))
    }

    async fn upsert_row(&self, row: &DurableRow) -> DurableResult<()> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        if row.key == "reject" {
            return Err(DurableError::Status {
                status: 409,
                body: "conflict".to_string(),
            });
        }
        self.insert(&row.key, row.data.clone());
        Ok(())
    }
}

pub struct FakeRecords {
    session_id: Mutex<ServiceResult<String>>,
    document: Mutex<ServiceResult<Vec<u8>>>,
    document_calls: AtomicUsize,
}

impl FakeRecords {
    pub fn new(session_id: &str, markdown: &str) -> Self {
        Self {
            session_id: Mutex::new(Ok(session_id.to_string())),
            document: Mutex::new(Ok(markdown.as_bytes().to_vec())),
            document_calls: AtomicUsize::new(0),
        }
    }

    pub fn set_session_id(&self, result: ServiceResult<String>) {
        *self.session_id.lock().unwrap() = result;
    }

    pub fn set_document(&self, result: ServiceResult<Vec<u8>>) {
        *self.document.lock().unwrap() = result;
    }

    pub fn document_calls(&self) -> usize {
        self.document_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RecordAttachmentService for FakeRecords {
    async fn current_session_id(&self) -> ServiceResult<String> {
        self.session_id.lock().unwrap().clone()
    }

    async fn document_bytes(&self) -> ServiceResult<Vec<u8>> {
        self.document_calls.fetch_add(1, Ordering::SeqCst);
        self.document.lock().unwrap().clone()
    }
}

pub struct FakeGenerator {
    result: Mutex<ServiceResult<SkeletonNode>>,
    calls: AtomicUsize,
}

impl FakeGenerator {
    pub fn returning(skeleton: SkeletonNode) -> Self {
        Self {
            result: Mutex::new(Ok(skeleton)),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn set_result(&self, result: ServiceResult<SkeletonNode>) {
        *self.result.lock().unwrap() = result;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SkeletonGenerator for FakeGenerator {
    async fn generate(&self, _markdown: &str) -> ServiceResult<SkeletonNode> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.lock().unwrap().clone()
    }
}

/// Coordinator over an in-memory local store and fake remote tiers.
pub struct Tiers {
    pub local: Arc<LocalStore>,
    pub cache_backend: Arc<CountingCacheBackend>,
    pub fast: Arc<FastCache>,
    pub durable_backend: Arc<GatedDurableBackend>,
    pub coordinator: Arc<PersistenceCoordinator>,
}

impl Tiers {
    pub fn new() -> Self {
        let local = Arc::new(LocalStore::in_memory().unwrap());
        let cache_backend = Arc::new(CountingCacheBackend::default());
        let fast = Arc::new(FastCache::new(cache_backend.clone(), true));
        let durable_backend = Arc::new(GatedDurableBackend::default());
        let durable = Arc::new(DurableStore::new(durable_backend.clone()));
        let coordinator = Arc::new(PersistenceCoordinator::new(
            local.clone(),
            fast.clone(),
            durable,
        ));
        Self {
            local,
            cache_backend,
            fast,
            durable_backend,
            coordinator,
        }
    }

    pub fn network_calls(&self) -> usize {
        self.cache_backend.calls() + self.durable_backend.calls()
    }
}

pub struct Harness {
    pub tiers: Tiers,
    pub records: Arc<FakeRecords>,
    pub generator: Arc<FakeGenerator>,
    pub controller: SessionController,
}

impl Harness {
    pub fn new(session_id: &str) -> Self {
        let tiers = Tiers::new();
        let records = Arc::new(FakeRecords::new(session_id, "# root\n\nA and B."));
        let generator = Arc::new(FakeGenerator::returning(sample_skeleton()));
        let controller = SessionController::new(
            SessionDeps {
                coordinator: tiers.coordinator.clone(),
                records: records.clone(),
                generator: generator.clone(),
            },
            SessionSettings {
                sync_debounce: SYNC_DEBOUNCE,
                scroll_debounce: SCROLL_DEBOUNCE,
            },
        );
        Self {
            tiers,
            records,
            generator,
            controller,
        }
    }
}

/// Lets spawned background tasks run to completion.
pub async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

pub fn missing_attachment() -> ServiceError {
    ServiceError::MissingAttachment("Attachment".to_string())
}
