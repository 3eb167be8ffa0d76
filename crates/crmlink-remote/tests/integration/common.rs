//! Shared test helpers for CRM adapter integration tests
//!
//! Provides an in-memory settings store and a wiremock-backed client/token
//! manager pair pointing at the mock server.

use std::sync::Arc;

use chrono::{Duration, Utc};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crmlink_core::config::ApiConfig;
use crmlink_core::domain::settings::{ConnectorSettings, SettingsPatch};
use crmlink_core::ports::settings_store::ISettingsStore;
use crmlink_remote::client::RemoteClient;
use crmlink_remote::token::TokenManager;

/// In-memory settings store with merge-patch semantics
pub struct MemorySettingsStore {
    inner: tokio::sync::Mutex<ConnectorSettings>,
}

impl MemorySettingsStore {
    pub fn new(settings: ConnectorSettings) -> Self {
        Self {
            inner: tokio::sync::Mutex::new(settings),
        }
    }

    pub async fn snapshot(&self) -> ConnectorSettings {
        self.inner.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl ISettingsStore for MemorySettingsStore {
    async fn load(&self) -> anyhow::Result<ConnectorSettings> {
        Ok(self.inner.lock().await.clone())
    }

    async fn update(&self, patch: SettingsPatch) -> anyhow::Result<ConnectorSettings> {
        let mut settings = self.inner.lock().await;
        settings.apply(patch);
        Ok(settings.clone())
    }
}

/// Settings holding a token that expires `remaining_secs` from now
pub fn settings_with_token(remaining_secs: i64) -> ConnectorSettings {
    ConnectorSettings {
        token: Some("stored-access".to_string()),
        refresh_token: Some("stored-refresh".to_string()),
        token_fetched_at: Some(Utc::now() - Duration::seconds(21600 - remaining_secs)),
        expires_in: Some(21600),
        ..Default::default()
    }
}

/// Starts a mock server and wires a client + token manager against it
pub async fn setup(
    settings: ConnectorSettings,
) -> (
    MockServer,
    Arc<RemoteClient>,
    Arc<TokenManager>,
    Arc<MemorySettingsStore>,
) {
    let server = MockServer::start().await;
    let client = Arc::new(RemoteClient::with_base_url(server.uri()));
    let store = Arc::new(MemorySettingsStore::new(settings));
    let config = ApiConfig {
        base_url: server.uri(),
        client_id: "test-client-id".to_string(),
        client_secret: "test-client-secret".to_string(),
        ..Default::default()
    };
    let tokens = Arc::new(TokenManager::new(
        client.clone(),
        store.clone() as Arc<dyn ISettingsStore>,
        &config,
    ));
    (server, client, tokens, store)
}

/// Mounts the OAuth refresh endpoint returning a fixed new token
pub async fn mount_token_refresh(server: &MockServer, new_access: &str) {
    Mock::given(method("POST"))
        .and(path("/oauth/v1/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": new_access,
            "refresh_token": "rotated-refresh",
            "expires_in": 21600
        })))
        .mount(server)
        .await;
}

/// One contact record body with the given vid and modification time (millis)
pub fn contact(vid: u64, modified_millis: i64) -> serde_json::Value {
    serde_json::json!({
        "vid": vid,
        "canonical-vid": vid,
        "properties": {
            "email": { "value": format!("user{vid}@example.com") },
            "lastmodifieddate": { "value": modified_millis.to_string() }
        }
    })
}
