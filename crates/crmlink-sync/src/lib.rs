//! CRMLink Sync - orchestration layer
//!
//! Composes the mapping, filter, fetch and batch-write stages into the
//! per-entity sync flows:
//!
//! - [`engine`] - [`engine::SyncEngine`] driving inbound fetch-and-save and
//!   outbound message batches
//! - [`context`] - [`context::RunContext`], the per-run snapshot of both
//!   schemas, segments and the built mapping tables

pub mod context;
pub mod engine;
