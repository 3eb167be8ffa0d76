//! CRMLink Core - Domain logic and business rules
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain entities** - `PropertyMapping`, `RecordEnvelope`, `TokenState`,
//!   `SegmentSet`, `FetchWindow`, `ConnectorSettings`
//! - **Error taxonomy** - `SyncError` and the non-fatal `MappingWarning`
//! - **Port definitions** - Traits for adapters: `IHubPlatform`, `ISettingsStore`
//!
//! # Architecture
//!
//! This crate follows the hexagonal (ports & adapters) architecture pattern.
//! The domain module contains pure business logic with no HTTP or storage
//! dependencies. Ports define trait interfaces that adapter crates implement.
//! The sync engine in `crmlink-sync` orchestrates domain entities through
//! port interfaces and the concrete CRM adapter in `crmlink-remote`.

pub mod config;
pub mod domain;
pub mod ports;
