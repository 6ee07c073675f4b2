//! Session state controller.
//!
//! # Responsibility
//! - Own the live `SyncData` and expose typed mutations over it.
//! - Load a session from the storage tiers or generate it from the attachment.
//! - Drive `save_fast` on every tracked change and a debounced durable sync.
//!
//! # Invariants
//! - State is replaced, never mutated in place; snapshots held by pending
//!   syncs stay internally consistent.
//! - Nothing is persisted unless the phase is `Ready` and a session id is known.
//! - Re-arming the debounce never cancels a durable sync already running.
//! - Scroll position only ever reaches the local store.

use crate::config::SprConfig;
use crate::error::{AppError, ServiceError, ServiceResult};
use crate::logging::error_summary;
use crate::model::now_epoch_ms;
use crate::model::retrieval::RetrievalSession;
use crate::model::skeleton::{NodeStats, SkeletonNode};
use crate::model::sync_data::{
    DrawingDocument, MenuConfig, Note, ParagraphSummary, SyncData, Theme,
};
use crate::service::collaborators::{decode_document, RecordAttachmentService, SkeletonGenerator};
use crate::store::{LocalStore, SyncOutcome};
use crate::sync::PersistenceCoordinator;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Local-only key holding the markdown scroll offset.
pub const SCROLL_POSITION_KEY: &str = "spr_scroll_pos";
/// Local-only key holding recently completed node paths.
pub const RECENTLY_COMPLETED_KEY: &str = "spr_recently_completed";
pub const RECENTLY_COMPLETED_LIMIT: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Uninitialized,
    Loading,
    Ready,
    Errored,
}

/// Durable sync indicator for the presentation layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    pub syncing: bool,
    /// `None` until the first durable sync finishes.
    pub last_success: Option<bool>,
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSettings {
    pub sync_debounce: Duration,
    pub scroll_debounce: Duration,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from(&SprConfig::default())
    }
}

impl From<&SprConfig> for SessionSettings {
    fn from(config: &SprConfig) -> Self {
        Self {
            sync_debounce: config.sync_debounce,
            scroll_debounce: config.scroll_debounce,
        }
    }
}

/// Collaborators injected into a controller.
#[derive(Clone)]
pub struct SessionDeps {
    pub coordinator: Arc<PersistenceCoordinator>,
    pub records: Arc<dyn RecordAttachmentService>,
    pub generator: Arc<dyn SkeletonGenerator>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct CompletedEntry {
    path: String,
    timestamp: i64,
}

pub struct SessionController {
    coordinator: Arc<PersistenceCoordinator>,
    records: Arc<dyn RecordAttachmentService>,
    generator: Arc<dyn SkeletonGenerator>,
    settings: SessionSettings,
    phase: SessionPhase,
    state: Arc<SyncData>,
    error: Option<AppError>,
    session_id: Option<String>,
    scroll_position: f64,
    sync_timer: Option<JoinHandle<()>>,
    scroll_timer: Option<JoinHandle<()>>,
    status: Arc<watch::Sender<SyncStatus>>,
}

impl SessionController {
    pub fn new(deps: SessionDeps, settings: SessionSettings) -> Self {
        let (status, _) = watch::channel(SyncStatus::default());
        Self {
            coordinator: deps.coordinator,
            records: deps.records,
            generator: deps.generator,
            settings,
            phase: SessionPhase::Uninitialized,
            state: Arc::new(SyncData::default()),
            error: None,
            session_id: None,
            scroll_position: 0.0,
            sync_timer: None,
            scroll_timer: None,
            status: Arc::new(status),
        }
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn is_loading(&self) -> bool {
        self.phase == SessionPhase::Loading
    }

    /// Current immutable snapshot.
    pub fn state(&self) -> Arc<SyncData> {
        self.state.clone()
    }

    pub fn error(&self) -> Option<&AppError> {
        self.error.as_ref()
    }

    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    pub fn scroll_position(&self) -> f64 {
        self.scroll_position
    }

    pub fn stats(&self) -> NodeStats {
        self.state.stats()
    }

    pub fn sync_status(&self) -> SyncStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    // ---- lifecycle -------------------------------------------------------

    /// Loads the current record's session, generating a skeleton on a miss.
    ///
    /// On failure the error is stored, the phase becomes `Errored`, and any
    /// prior in-memory state is kept. Calling `init` again retries from scratch.
    pub async fn init(&mut self) -> Result<(), AppError> {
        let started_at = Instant::now();
        info!("event=session_init module=service status=start");
        // A pending sync for the previous record still fires with its own key.
        self.sync_timer = None;
        self.phase = SessionPhase::Loading;
        self.error = None;

        let session_id = match self.records.current_session_id().await {
            Ok(id) => id,
            Err(err) => return Err(self.fail("session_init", &err)),
        };
        self.session_id = Some(session_id.clone());

        if let Some(saved) = self.coordinator.fetch(&session_id).await {
            if saved.has_skeleton() {
                self.state = Arc::new(saved);
                self.scroll_position = self.load_scroll_position();
                self.phase = SessionPhase::Ready;
                info!(
                    "event=session_init module=service status=ok source=cache key={session_id} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                return Ok(());
            }
        }

        let (markdown, skeleton) = match self.generate().await {
            Ok(generated) => generated,
            Err(err) => return Err(self.fail("session_init", &err)),
        };
        self.state = Arc::new(SyncData::fresh(markdown, skeleton));
        self.phase = SessionPhase::Ready;
        self.coordinator.save_fast(&session_id, &self.state);
        self.schedule_durable_sync();
        info!(
            "event=session_init module=service status=ok source=generated key={session_id} duration_ms={}",
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    /// Re-initializes after the host selection moved to another record.
    pub async fn on_selection_changed(&mut self) -> Result<(), AppError> {
        self.init().await
    }

    /// Regenerates the skeleton from the attachment, keeping annotations.
    ///
    /// Completion is reset and scroll position returns to the top. On failure
    /// the previous phase and state are kept and the error is returned so the
    /// caller can show it next to its confirmation prompt.
    pub async fn reparse(&mut self) -> Result<(), AppError> {
        let started_at = Instant::now();
        let previous_phase = self.phase;
        self.phase = SessionPhase::Loading;
        self.error = None;

        match self.regenerate().await {
            Ok(()) => {
                self.phase = SessionPhase::Ready;
                self.set_scroll_now(0.0);
                if let Some(key) = self.session_id.clone() {
                    self.coordinator.save_fast(&key, &self.state);
                }
                self.schedule_durable_sync();
                info!(
                    "event=session_reparse module=service status=ok duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                let app_error = self.fail("session_reparse", &err);
                self.phase = previous_phase;
                Err(app_error)
            }
        }
    }

    async fn regenerate(&mut self) -> ServiceResult<()> {
        let session_id = self.records.current_session_id().await?;
        self.coordinator.clear_all(&session_id);
        self.session_id = Some(session_id);

        let (markdown, skeleton) = self.generate().await?;
        let mut next = (*self.state).clone();
        next.markdown = markdown;
        next.skeleton = Some(skeleton);
        next.completed_paths.clear();
        self.state = Arc::new(next);
        Ok(())
    }

    async fn generate(&self) -> ServiceResult<(String, SkeletonNode)> {
        let bytes = self.records.document_bytes().await?;
        let markdown = decode_document(&bytes);
        info!(
            "event=skeleton_generate module=service status=start bytes={}",
            markdown.len()
        );
        let skeleton = self.generator.generate(&markdown).await?;
        Ok((markdown, skeleton))
    }

    fn fail(&mut self, event: &str, err: &ServiceError) -> AppError {
        let app_error = AppError::from(err);
        error!(
            "event={event} module=service status=error error_kind={} error={}",
            app_error.kind.as_str(),
            error_summary(err)
        );
        self.phase = SessionPhase::Errored;
        self.error = Some(app_error.clone());
        app_error
    }

    /// Cancels the pending debounce and syncs the latest state now.
    pub async fn flush(&mut self) -> SyncOutcome {
        if let Some(timer) = self.sync_timer.take() {
            timer.abort();
        }
        let Some(key) = self.persistable_key() else {
            return SyncOutcome::failed("session is not ready");
        };
        run_durable_sync(
            self.coordinator.clone(),
            self.status.clone(),
            key,
            self.state.clone(),
        )
        .await
    }

    // ---- mutations -------------------------------------------------------

    /// Applies `mutate` to a copy of the state and installs the copy.
    pub fn update_state<F>(&mut self, mutate: F)
    where
        F: FnOnce(&mut SyncData),
    {
        let mut next = (*self.state).clone();
        mutate(&mut next);
        let tracked = self.state.tracked_fields_differ(&next);
        self.state = Arc::new(next);
        if tracked {
            self.persist_change();
        }
    }

    /// Flips membership of `path` in the completed set. Unknown paths are accepted.
    pub fn toggle_completion(&mut self, path: &str) {
        let completing = !self.state.is_completed(path);
        self.update_state(|state| {
            if completing {
                state.completed_paths.push(path.to_string());
            } else {
                state.completed_paths.retain(|completed| completed != path);
            }
        });
        if completing {
            self.remember_completed(path);
        }
    }

    /// Appends a trimmed category unless blank or already present.
    pub fn add_category(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty() || self.state.note_categories.iter().any(|existing| existing == name) {
            return;
        }
        self.update_state(|state| state.note_categories.push(name.to_string()));
    }

    /// Removes every occurrence of `name`; notes keep their category string.
    pub fn remove_category(&mut self, name: &str) {
        self.update_state(|state| state.note_categories.retain(|existing| existing != name));
    }

    /// Adds a note at the front of the node's list and returns its id.
    pub fn add_note(&mut self, path: &str, content: &str, category: &str) -> String {
        let note = Note {
            id: Uuid::new_v4().to_string(),
            content: content.to_string(),
            original_content: content.to_string(),
            timestamp: now_epoch_ms(),
            category: category.to_string(),
            corrections: None,
        };
        let id = note.id.clone();
        self.update_state(|state| {
            state
                .notes_by_path
                .entry(path.to_string())
                .or_default()
                .insert(0, note);
        });
        id
    }

    /// Replaces a note's content; `false` when the note does not exist.
    pub fn update_note(&mut self, path: &str, note_id: &str, content: &str) -> bool {
        if !self.state.notes_for(path).iter().any(|note| note.id == note_id) {
            return false;
        }
        self.update_state(|state| {
            if let Some(note) = state
                .notes_by_path
                .get_mut(path)
                .and_then(|notes| notes.iter_mut().find(|note| note.id == note_id))
            {
                note.content = content.to_string();
            }
        });
        true
    }

    /// Removes a note; an emptied node drops its entry.
    pub fn remove_note(&mut self, path: &str, note_id: &str) -> bool {
        if !self.state.notes_for(path).iter().any(|note| note.id == note_id) {
            return false;
        }
        self.update_state(|state| {
            if let Some(notes) = state.notes_by_path.get_mut(path) {
                notes.retain(|note| note.id != note_id);
                if notes.is_empty() {
                    state.notes_by_path.remove(path);
                }
            }
        });
        true
    }

    pub fn set_theme(&mut self, theme: Theme) {
        self.update_state(|state| state.theme = theme);
    }

    pub fn toggle_theme(&mut self) -> Theme {
        let next = self.state.theme.toggled();
        self.set_theme(next);
        next
    }

    pub fn set_menu_config(&mut self, menu_config: MenuConfig) {
        self.update_state(|state| state.menu_config = menu_config);
    }

    pub fn set_node_drawing(&mut self, path: &str, drawing: DrawingDocument) {
        self.update_state(|state| {
            state.node_drawings.insert(path.to_string(), drawing);
        });
    }

    pub fn remove_node_drawing(&mut self, path: &str) {
        self.update_state(|state| {
            state.node_drawings.remove(path);
        });
    }

    /// Links or unlinks a paragraph; the last unlink removes the node entry.
    pub fn toggle_paragraph_link(&mut self, path: &str, paragraph_index: usize) {
        self.update_state(|state| {
            let links = state
                .node_paragraph_links
                .entry(path.to_string())
                .or_default();
            if let Some(position) = links.iter().position(|index| *index == paragraph_index) {
                links.remove(position);
                if links.is_empty() {
                    state.node_paragraph_links.remove(path);
                }
            } else {
                links.push(paragraph_index);
            }
        });
    }

    pub fn linked_paragraphs(&self, path: &str) -> Vec<usize> {
        self.state.linked_paragraphs(path).to_vec()
    }

    pub fn paragraph_owners(&self) -> BTreeMap<usize, String> {
        self.state.paragraph_owners()
    }

    /// Stored with the next tracked change; does not schedule persistence itself.
    pub fn add_paragraph_summary(&mut self, summary: ParagraphSummary) {
        self.update_state(|state| state.paragraph_summaries.push(summary));
    }

    /// Appends a finished practice attempt and folds it into the node's stats.
    pub fn record_retrieval_session(&mut self, path: &str, session: RetrievalSession) {
        let now = now_epoch_ms();
        self.update_state(|state| {
            state
                .retrieval_stats_by_path
                .entry(path.to_string())
                .or_default()
                .record(&session, now);
            state.retrieval_sessions.push(session);
            state.last_study_time = Some(now);
        });
    }

    /// Updates the scroll offset; written to the local store after a quiet period.
    pub fn update_scroll_position(&mut self, position: f64) {
        self.scroll_position = position;
        if let Some(timer) = self.scroll_timer.take() {
            timer.abort();
        }
        let local = self.coordinator.local().clone();
        let delay = self.settings.scroll_debounce;
        self.scroll_timer = spawn_timer("scroll_save", async move {
            tokio::time::sleep(delay).await;
            local.save_raw(SCROLL_POSITION_KEY, &position.to_string());
        });
    }

    /// Most recently completed paths, newest first.
    pub fn latest_completed(&self, count: usize) -> Vec<String> {
        let mut entries = load_completed(self.coordinator.local());
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        entries
            .into_iter()
            .take(count)
            .map(|entry| entry.path)
            .collect()
    }

    pub fn clear_recently_completed(&self) {
        self.coordinator.local().remove_raw(RECENTLY_COMPLETED_KEY);
    }

    // ---- persistence -----------------------------------------------------

    fn persistable_key(&self) -> Option<String> {
        if self.phase != SessionPhase::Ready {
            return None;
        }
        self.session_id.clone()
    }

    fn persist_change(&mut self) {
        let Some(key) = self.persistable_key() else {
            return;
        };
        self.coordinator.save_fast(&key, &self.state);
        self.schedule_durable_sync();
    }

    fn schedule_durable_sync(&mut self) {
        let Some(key) = self.persistable_key() else {
            return;
        };
        if let Some(timer) = self.sync_timer.take() {
            timer.abort();
        }
        let coordinator = self.coordinator.clone();
        let status = self.status.clone();
        let snapshot = self.state.clone();
        let delay = self.settings.sync_debounce;
        self.sync_timer = spawn_timer("durable_sync", async move {
            tokio::time::sleep(delay).await;
            // Detached: aborting the timer from here on must not cancel the sync.
            tokio::spawn(async move {
                run_durable_sync(coordinator, status, key, snapshot).await;
            });
        });
    }

    fn set_scroll_now(&mut self, position: f64) {
        if let Some(timer) = self.scroll_timer.take() {
            timer.abort();
        }
        self.scroll_position = position;
        self.coordinator
            .local()
            .save_raw(SCROLL_POSITION_KEY, &position.to_string());
    }

    fn load_scroll_position(&self) -> f64 {
        self.coordinator
            .local()
            .load_raw(SCROLL_POSITION_KEY)
            .and_then(|raw| raw.parse::<f64>().ok())
            .unwrap_or(0.0)
    }

    fn remember_completed(&self, path: &str) {
        let local = self.coordinator.local();
        let mut entries = load_completed(local);
        entries.retain(|entry| entry.path != path);
        entries.insert(
            0,
            CompletedEntry {
                path: path.to_string(),
                timestamp: now_epoch_ms(),
            },
        );
        entries.truncate(RECENTLY_COMPLETED_LIMIT);
        match serde_json::to_string(&entries) {
            Ok(raw) => local.save_raw(RECENTLY_COMPLETED_KEY, &raw),
            Err(err) => warn!(
                "event=recent_completed module=service status=error error={}",
                error_summary(&err)
            ),
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        for timer in [self.sync_timer.take(), self.scroll_timer.take()]
            .into_iter()
            .flatten()
        {
            timer.abort();
        }
    }
}

async fn run_durable_sync(
    coordinator: Arc<PersistenceCoordinator>,
    status: Arc<watch::Sender<SyncStatus>>,
    key: String,
    snapshot: Arc<SyncData>,
) -> SyncOutcome {
    // The running sync owns the indicator; a skipped one leaves it alone.
    let Some(sync) = coordinator.begin_sync(&key) else {
        return SyncOutcome::ok();
    };
    status.send_modify(|current| current.syncing = true);
    let outcome = sync.run(&snapshot).await;
    status.send_modify(|current| {
        current.syncing = false;
        current.last_success = Some(outcome.success);
        current.last_error = outcome.error.clone();
    });
    outcome
}

fn spawn_timer<F>(label: &'static str, task: F) -> Option<JoinHandle<()>>
where
    F: Future<Output = ()> + Send + 'static,
{
    match Handle::try_current() {
        Ok(handle) => Some(handle.spawn(task)),
        Err(_) => {
            warn!("event=timer_spawn module=service status=skip task={label} reason=no_runtime");
            None
        }
    }
}

fn load_completed(local: &LocalStore) -> Vec<CompletedEntry> {
    local
        .load_raw(RECENTLY_COMPLETED_KEY)
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default()
}
