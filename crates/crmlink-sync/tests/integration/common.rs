//! Shared doubles for engine integration tests

use std::sync::Arc;

use chrono::Utc;
use wiremock::MockServer;

use crmlink_core::config::{ApiConfig, Config};
use crmlink_core::domain::entity::EntityKind;
use crmlink_core::domain::segments::Segment;
use crmlink_core::domain::settings::{ConnectorSettings, SettingsPatch};
use crmlink_core::ports::hub_platform::{AttributeWrite, HubAttribute, HubIdent, IHubPlatform};
use crmlink_core::ports::settings_store::ISettingsStore;
use crmlink_remote::client::RemoteClient;
use crmlink_remote::token::TokenManager;
use crmlink_sync::engine::SyncEngine;

// ============================================================================
// Settings store double
// ============================================================================

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

// ============================================================================
// Hub platform double
// ============================================================================

/// One write the engine sent toward the hub
#[derive(Debug, Clone)]
pub struct RecordedWrite {
    pub kind: EntityKind,
    pub ident: HubIdent,
    pub writes: Vec<AttributeWrite>,
}

pub struct MemoryHub {
    schema: Vec<HubAttribute>,
    segments: Vec<Segment>,
    fail_writes: bool,
    writes: tokio::sync::Mutex<Vec<RecordedWrite>>,
}

impl MemoryHub {
    pub fn new(schema: Vec<HubAttribute>, segments: Vec<Segment>) -> Self {
        Self {
            schema,
            segments,
            fail_writes: false,
            writes: tokio::sync::Mutex::new(Vec::new()),
        }
    }

    /// A hub whose attribute writes always fail
    pub fn failing() -> Self {
        Self {
            fail_writes: true,
            ..Self::new(Vec::new(), Vec::new())
        }
    }

    pub async fn writes(&self) -> Vec<RecordedWrite> {
        self.writes.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl IHubPlatform for MemoryHub {
    async fn attribute_schema(&self) -> anyhow::Result<Vec<HubAttribute>> {
        Ok(self.schema.clone())
    }

    async fn segments(&self, _kind: EntityKind) -> anyhow::Result<Vec<Segment>> {
        Ok(self.segments.clone())
    }

    async fn write_attributes(
        &self,
        kind: EntityKind,
        ident: &HubIdent,
        writes: Vec<AttributeWrite>,
    ) -> anyhow::Result<()> {
        if self.fail_writes {
            anyhow::bail!("hub unavailable");
        }
        self.writes.lock().await.push(RecordedWrite {
            kind,
            ident: ident.clone(),
            writes,
        });
        Ok(())
    }
}

// ============================================================================
// Wiring
// ============================================================================

/// Settings holding a token that stays valid for the whole test
pub fn configured_settings() -> ConnectorSettings {
    ConnectorSettings {
        token: Some("stored-access".to_string()),
        refresh_token: Some("stored-refresh".to_string()),
        token_fetched_at: Some(Utc::now()),
        expires_in: Some(21600),
        ..Default::default()
    }
}

/// Starts a mock CRM and wires an engine against it and the given doubles
pub async fn setup(
    settings: ConnectorSettings,
    hub: MemoryHub,
) -> (
    MockServer,
    SyncEngine,
    Arc<MemoryHub>,
    Arc<MemorySettingsStore>,
) {
    let server = MockServer::start().await;
    let client = Arc::new(RemoteClient::with_base_url(server.uri()));
    let store = Arc::new(MemorySettingsStore::new(settings));
    let hub = Arc::new(hub);
    let api = ApiConfig {
        base_url: server.uri(),
        client_id: "test-client-id".to_string(),
        client_secret: "test-client-secret".to_string(),
        ..Default::default()
    };
    let tokens = Arc::new(TokenManager::new(
        client.clone(),
        store.clone() as Arc<dyn ISettingsStore>,
        &api,
    ));
    let engine = SyncEngine::new(
        hub.clone() as Arc<dyn IHubPlatform>,
        store.clone() as Arc<dyn ISettingsStore>,
        client,
        tokens,
        &Config::default(),
    );
    (server, engine, hub, store)
}

/// A catalog group listing covering the standard contact fields tests need
pub fn contact_groups() -> serde_json::Value {
    serde_json::json!([{
        "name": "contactinformation",
        "displayName": "Contact Information",
        "properties": [
            { "name": "email", "label": "Email", "type": "string", "fieldType": "text" },
            { "name": "firstname", "label": "First Name", "type": "string", "fieldType": "text" },
            { "name": "lastmodifieddate", "label": "Last Modified", "type": "datetime", "fieldType": "text", "readOnlyValue": true }
        ]
    }])
}

/// One contact record body with the given vid and modification time (millis)
pub fn contact(vid: u64, email: &str, modified_millis: i64) -> serde_json::Value {
    serde_json::json!({
        "vid": vid,
        "canonical-vid": vid,
        "properties": {
            "email": { "value": email },
            "firstname": { "value": "Ada" },
            "lastmodifieddate": { "value": modified_millis.to_string() }
        }
    })
}

pub fn segment(id: &str, name: &str) -> Segment {
    Segment {
        id: id.to_string(),
        name: name.to_string(),
    }
}
