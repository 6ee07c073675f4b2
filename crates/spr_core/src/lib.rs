//! Core of the recall-skeleton study plugin.
//! Owns session state, its tiered persistence, and the skeleton statistics.

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;
pub mod sync;

pub use config::{AiProvider, AiProviderConfig, ConfigError, SprConfig};
pub use error::{classify_error, AppError, ErrorKind, ServiceError, ServiceResult};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::retrieval::{
    compare_reconstruction, quiz_session, reconstruction_session, CalibrationPrediction,
    NodeRetrievalStats, QuizQuestion, ReconstructedNode, RetrievalSession, UserAnswer,
};
pub use model::skeleton::{
    compute_stats, find_node_by_path, is_leaf, parent_paths, NodeKind, NodeStats, SkeletonNode,
    PATH_SEPARATOR,
};
pub use model::sync_data::{Note, SyncData, Theme};
pub use service::collaborators::{
    AssessmentService, RecordAttachmentService, SkeletonGenerator,
};
pub use service::practice::PracticeService;
pub use service::session::{
    SessionController, SessionDeps, SessionPhase, SessionSettings, SyncStatus,
};
pub use store::{DurableStore, FastCache, LocalStore, SyncOutcome};
pub use sync::PersistenceCoordinator;

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
