//! Port definitions (trait interfaces for adapters)
//!
//! The core consumes the hub platform and the settings store as abstract
//! capabilities; HTTP routing, job queues and cache providers stay outside.

pub mod hub_platform;
pub mod settings_store;
