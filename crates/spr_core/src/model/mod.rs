//! Session-state domain model.
//!
//! # Responsibility
//! - Define the skeleton tree, retrieval records and the persisted `SyncData`.
//! - Keep every type serializable to the persisted JSON shape.
//!
//! # Invariants
//! - Node paths are the only identity of skeleton nodes.
//! - Model code performs no I/O.

pub mod retrieval;
pub mod skeleton;
pub mod sync_data;

/// Current wall-clock time in epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
