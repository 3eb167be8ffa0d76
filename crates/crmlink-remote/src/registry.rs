//! Remote schema reconciliation
//!
//! Best-effort pass that makes sure the CRM side can receive what the
//! outbound mapping will send: a dedicated property group, one custom
//! property per user-configured outbound field, and the derived
//! segment-membership enumeration. Runs before outbound mapping tables are
//! built so freshly created properties resolve.
//!
//! Created properties are never mutated afterwards; first write wins for
//! schema shape. The one exception is the segment property, whose option
//! list tracks the live segment names - stale options would break filtering
//! on the CRM side. Every failure in here is logged and swallowed; schema
//! drift must not abort a sync run.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, error, info};

use crmlink_core::domain::entity::EntityKind;
use crmlink_core::domain::errors::SyncError;
use crmlink_core::domain::remote::{RemoteCatalog, RemotePropertyGroup};
use crmlink_core::domain::segments::SegmentSet;
use crmlink_core::domain::settings::ConnectorSettings;
use crmlink_core::ports::hub_platform::HubAttribute;
use crmlink_mapping::builder::{prefixed_property_name, slugify};
use crmlink_mapping::outbound::SEGMENTS_PROPERTY;

use crate::client::RemoteClient;
use crate::token::TokenManager;

/// Name of the connector-owned property group
pub const PROPERTY_GROUP: &str = "hub";

/// Display name of the connector-owned property group
const PROPERTY_GROUP_LABEL: &str = "Hub Properties";

// ============================================================================
// PropertyRegistry
// ============================================================================

/// Reconciles the CRM property schema for one entity kind
pub struct PropertyRegistry {
    client: Arc<RemoteClient>,
    tokens: Arc<TokenManager>,
    kind: EntityKind,
}

impl PropertyRegistry {
    pub fn new(client: Arc<RemoteClient>, tokens: Arc<TokenManager>, kind: EntityKind) -> Self {
        Self {
            client,
            tokens,
            kind,
        }
    }

    /// Reads the live property catalog
    ///
    /// Called after the reconciliation pass so freshly created properties
    /// resolve in the mapping tables.
    pub async fn catalog(&self) -> Result<RemoteCatalog, SyncError> {
        let groups = self.fetch_groups().await?;
        Ok(RemoteCatalog::from_groups(&groups))
    }

    /// Runs the reconciliation pass; failures are logged, never surfaced
    pub async fn sync(
        &self,
        settings: &ConnectorSettings,
        hub_schema: &[HubAttribute],
        segments: &SegmentSet,
    ) {
        if let Err(e) = self.sync_inner(settings, hub_schema, segments).await {
            error!(kind = %self.kind, error = %e, "connector.sync.error: schema sync failed");
        }
    }

    async fn sync_inner(
        &self,
        settings: &ConnectorSettings,
        hub_schema: &[HubAttribute],
        segments: &SegmentSet,
    ) -> Result<(), SyncError> {
        let groups = self.fetch_groups().await?;
        let catalog = RemoteCatalog::from_groups(&groups);

        if !groups.iter().any(|g| g.name == PROPERTY_GROUP) {
            self.create_group().await?;
        }

        for (position, row) in settings.outgoing_attributes(self.kind).iter().enumerate() {
            if row.label.is_empty() || row.hub.is_empty() {
                continue;
            }
            // Standard CRM fields the user named directly, and properties
            // created on an earlier pass, already resolve
            let slug = slugify(&row.label);
            let prefixed = prefixed_property_name(&row.label);
            if catalog.get(&slug).is_some() || catalog.get(&prefixed).is_some() {
                continue;
            }

            let hub_type = hub_schema
                .iter()
                .find(|a| a.id == row.hub)
                .map(|a| a.kind.as_str())
                .unwrap_or("string");
            let (remote_type, field_kind) = remote_typing(hub_type);

            let mut body = json!({
                "name": prefixed,
                "label": row.label,
                "groupName": PROPERTY_GROUP,
                "type": remote_type,
                "fieldType": field_kind,
                "displayOrder": position,
            });
            if remote_type == "bool" {
                body["options"] = json!([
                    { "label": "Yes", "value": true, "displayOrder": 0 },
                    { "label": "No", "value": false, "displayOrder": 1 },
                ]);
            }
            self.create_property(&body).await?;
            info!(kind = %self.kind, property = %prefixed, "created CRM property");
        }

        self.sync_segment_property(&catalog, segments).await
    }

    /// Creates or patches the segment-membership enumeration
    ///
    /// Patched only when the option label set differs from the live segment
    /// names; everything else about an existing property is left alone.
    async fn sync_segment_property(
        &self,
        catalog: &RemoteCatalog,
        segments: &SegmentSet,
    ) -> Result<(), SyncError> {
        let names = segments.names();
        let body = json!({
            "name": SEGMENTS_PROPERTY,
            "label": "Hub Segments",
            "groupName": PROPERTY_GROUP,
            "type": "enumeration",
            "fieldType": "checkbox",
            "options": names
                .iter()
                .enumerate()
                .map(|(position, name)| json!({
                    "label": name,
                    "value": name,
                    "displayOrder": position,
                }))
                .collect::<Vec<_>>(),
        });

        match catalog.get(SEGMENTS_PROPERTY) {
            None => {
                self.create_property(&body).await?;
                info!(kind = %self.kind, options = names.len(), "created segment property");
            }
            Some(existing) => {
                let mut current: Vec<&str> =
                    existing.options.iter().map(|o| o.label.as_str()).collect();
                let mut expected: Vec<&str> = names.iter().map(String::as_str).collect();
                current.sort_unstable();
                expected.sort_unstable();
                if current == expected {
                    debug!(kind = %self.kind, "segment property options already current");
                    return Ok(());
                }
                self.update_property(SEGMENTS_PROPERTY, &body).await?;
                info!(kind = %self.kind, options = names.len(), "updated segment property options");
            }
        }
        Ok(())
    }

    // ========================================================================
    // HTTP plumbing
    // ========================================================================

    async fn fetch_groups(&self) -> Result<Vec<RemotePropertyGroup>, SyncError> {
        let response = self
            .tokens
            .with_auth_retry(|token| {
                let client = self.client.clone();
                let kind = self.kind;
                async move { client.property_groups(&token, kind).await }
            })
            .await?;
        if !response.status().is_success() {
            return Err(unexpected(response).await);
        }
        response
            .json::<Vec<RemotePropertyGroup>>()
            .await
            .map_err(|e| SyncError::UnexpectedResponse(e.to_string()))
    }

    async fn create_group(&self) -> Result<(), SyncError> {
        let body = json!({ "name": PROPERTY_GROUP, "displayName": PROPERTY_GROUP_LABEL });
        let response = self
            .tokens
            .with_auth_retry(|token| {
                let client = self.client.clone();
                let kind = self.kind;
                let body = body.clone();
                async move { client.create_property_group(&token, kind, &body).await }
            })
            .await?;
        if !response.status().is_success() {
            return Err(unexpected(response).await);
        }
        info!(kind = %self.kind, group = PROPERTY_GROUP, "created property group");
        Ok(())
    }

    async fn create_property(&self, body: &serde_json::Value) -> Result<(), SyncError> {
        let response = self
            .tokens
            .with_auth_retry(|token| {
                let client = self.client.clone();
                let kind = self.kind;
                let body = body.clone();
                async move { client.create_property(&token, kind, &body).await }
            })
            .await?;
        if !response.status().is_success() {
            return Err(unexpected(response).await);
        }
        Ok(())
    }

    async fn update_property(&self, name: &str, body: &serde_json::Value) -> Result<(), SyncError> {
        let response = self
            .tokens
            .with_auth_retry(|token| {
                let client = self.client.clone();
                let kind = self.kind;
                let body = body.clone();
                async move { client.update_property(&token, kind, name, &body).await }
            })
            .await?;
        if !response.status().is_success() {
            return Err(unexpected(response).await);
        }
        Ok(())
    }
}

/// Maps a hub attribute type to the CRM property type and field kind
fn remote_typing(hub_type: &str) -> (&'static str, &'static str) {
    match hub_type {
        "number" => ("number", "text"),
        "date" => ("datetime", "text"),
        "boolean" => ("bool", "booleancheckbox"),
        _ => ("string", "text"),
    }
}

async fn unexpected(response: reqwest::Response) -> SyncError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    SyncError::UnexpectedResponse(format!("schema request failed with {status}: {body}"))
}
