//! Configuration module for CRMLink.
//!
//! Provides typed configuration structs that map to the YAML configuration
//! file, with loading, validation and defaults. Connector *state* (tokens,
//! watermarks, field mappings) lives in [`crate::domain::settings`]; this is
//! deploy-time configuration only.

use std::path::Path;

use serde::{Deserialize, Serialize};

/// Top-level configuration for CRMLink.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api: ApiConfig,
    pub sync: SyncConfig,
}

/// CRM API settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the CRM REST API.
    pub base_url: String,
    /// OAuth client id used for token refresh.
    pub client_id: String,
    /// OAuth client secret used for token refresh.
    pub client_secret: String,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Refresh the access token when it expires within this many seconds.
    pub token_refresh_advance_secs: i64,
}

/// Synchronization settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Records fetched per listing page.
    pub page_size: u32,
    /// Maximum records per batch upsert chunk.
    pub batch_size: usize,
    /// Trailing buffer past the fetch cutoff, tolerating coarse CRM
    /// modification timestamps.
    pub fetch_overlap_secs: i64,
    /// Window size for the very first incremental fetch, when no watermark
    /// has been persisted yet.
    pub initial_fetch_lookback_secs: i64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.crm.example.com".to_string(),
            client_id: String::new(),
            client_secret: String::new(),
            request_timeout_secs: 5,
            token_refresh_advance_secs: 600,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: 100,
            batch_size: 100,
            fetch_overlap_secs: 10,
            initial_fetch_lookback_secs: 3600,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file at `path`.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Try to load from `path`; fall back to [`Config::default`] on any error.
    pub fn load_or_default(path: &Path) -> Self {
        Self::load(path).unwrap_or_default()
    }
}
