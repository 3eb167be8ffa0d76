//! Access-token lifecycle
//!
//! The [`TokenManager`] is the only writer of the token fields in connector
//! settings. Two operations:
//!
//! - [`TokenManager::ensure_valid`] refreshes the token ahead of expiry
//!   (configurable advance, default 10 minutes) and persists the result
//! - [`TokenManager::with_auth_retry`] wraps one CRM call: on an
//!   unauthorized response it forces a refresh and retries exactly once; a
//!   second unauthorized surfaces [`SyncError::AuthExpired`] with the CRM
//!   body
//!
//! The single-retry bound keeps outbound latency predictable and cannot loop
//! when the refresh token itself is dead. Concurrent callers refreshing at
//! the same moment are serialized on a lock; the second caller re-reads the
//! settings and skips the redundant refresh.

use std::future::Future;
use std::sync::Arc;

use reqwest::{Response, StatusCode};
use tracing::{debug, info, warn};

use crmlink_core::config::ApiConfig;
use crmlink_core::domain::errors::SyncError;
use crmlink_core::domain::settings::SettingsPatch;
use crmlink_core::domain::token::TokenState;
use crmlink_core::ports::settings_store::ISettingsStore;

use crate::client::RemoteClient;

/// Manages the CRM access token for one connector instance
pub struct TokenManager {
    client: Arc<RemoteClient>,
    settings: Arc<dyn ISettingsStore>,
    client_id: String,
    client_secret: String,
    refresh_advance_secs: i64,
    refresh_lock: tokio::sync::Mutex<()>,
}

impl TokenManager {
    pub fn new(
        client: Arc<RemoteClient>,
        settings: Arc<dyn ISettingsStore>,
        config: &ApiConfig,
    ) -> Self {
        Self {
            client,
            settings,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            refresh_advance_secs: config.token_refresh_advance_secs,
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Returns a token state valid for at least the refresh advance
    ///
    /// Refreshes and persists when the stored token expires within the
    /// advance, or when `force` is set.
    pub async fn ensure_valid(&self, force: bool) -> Result<TokenState, SyncError> {
        let state = self.current_state().await?;
        if !force && !state.needs_refresh(self.refresh_advance_secs) {
            return Ok(state);
        }

        let _guard = self.refresh_lock.lock().await;
        // Another task may have refreshed while this one waited; re-read so
        // the refresh also uses the latest rotated refresh token
        let state = self.current_state().await?;
        if !force && !state.needs_refresh(self.refresh_advance_secs) {
            return Ok(state);
        }
        self.refresh(state).await
    }

    /// Runs `call` with a valid access token, refreshing and retrying once
    /// on an unauthorized response
    pub async fn with_auth_retry<F, Fut>(&self, call: F) -> Result<Response, SyncError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<Response, reqwest::Error>>,
    {
        let state = self.ensure_valid(false).await?;
        let response = call(state.access_token)
            .await
            .map_err(|e| SyncError::TransientNetwork(e.to_string()))?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!("CRM returned unauthorized, refreshing token and retrying once");
        let state = self.ensure_valid(true).await?;
        let response = call(state.access_token)
            .await
            .map_err(|e| SyncError::TransientNetwork(e.to_string()))?;
        if response.status() == StatusCode::UNAUTHORIZED {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::AuthExpired { body });
        }
        Ok(response)
    }

    async fn current_state(&self) -> Result<TokenState, SyncError> {
        let settings = self
            .settings
            .load()
            .await
            .map_err(|e| SyncError::Settings(e.to_string()))?;
        settings
            .token_state()
            .ok_or_else(|| SyncError::Configuration("access token is not set".to_string()))
    }

    /// Exchanges the refresh token and persists the new state
    async fn refresh(&self, state: TokenState) -> Result<TokenState, SyncError> {
        let refresh_token = state
            .refresh_token
            .ok_or_else(|| SyncError::Configuration("refresh token is not set".to_string()))?;

        debug!("access token near expiry, refreshing");
        let refreshed = self
            .client
            .refresh_access_token(&self.client_id, &self.client_secret, &refresh_token)
            .await?;

        let mut patch =
            SettingsPatch::refreshed_token(refreshed.access_token.clone(), refreshed.expires_in);
        patch.refresh_token = refreshed.refresh_token.clone();

        let settings = self
            .settings
            .update(patch)
            .await
            .map_err(|e| SyncError::Settings(e.to_string()))?;

        info!(
            expires_in = refreshed.expires_in,
            "access token refreshed and persisted"
        );
        settings
            .token_state()
            .ok_or_else(|| SyncError::Configuration("access token is not set".to_string()))
    }
}
