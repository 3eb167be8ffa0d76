//! Settings store port (driven/secondary port)
//!
//! Persistence for [`ConnectorSettings`]. Updates are expressed as merge
//! patches; implementations must never replace the whole document, because
//! concurrent sync runs patch disjoint keys (token bookkeeping vs fetch
//! watermarks).

use crate::domain::settings::{ConnectorSettings, SettingsPatch};

/// Port trait for connector settings persistence
#[async_trait::async_trait]
pub trait ISettingsStore: Send + Sync {
    /// Loads the current settings document
    async fn load(&self) -> anyhow::Result<ConnectorSettings>;

    /// Merges `patch` into the stored document and returns the result
    async fn update(&self, patch: SettingsPatch) -> anyhow::Result<ConnectorSettings>;
}
