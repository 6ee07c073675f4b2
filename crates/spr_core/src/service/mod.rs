//! Session use-case services.
//!
//! # Responsibility
//! - Orchestrate collaborators and storage tiers into session-level operations.
//! - Keep the presentation layer decoupled from storage and transport details.

pub mod collaborators;
pub mod practice;
pub mod session;
