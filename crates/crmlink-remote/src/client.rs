//! CRM REST client
//!
//! Typed endpoint plumbing over `reqwest`. Methods that run inside the token
//! manager's retry wrapper return raw `reqwest` results so the wrapper can
//! inspect the status; only the token-refresh call, which has no bearer token
//! of its own, parses its response here.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::Deserialize;
use tracing::debug;

use crmlink_core::config::ApiConfig;
use crmlink_core::domain::entity::EntityKind;
use crmlink_core::domain::errors::SyncError;
use crmlink_core::domain::record::RemoteWriteRecord;

/// Audit tag sent with batch writes so CRM-side history names the connector
const AUDIT_ID: &str = "CrmLink";

// ============================================================================
// Wire types
// ============================================================================

/// Response of the OAuth refresh endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    /// New bearer token
    pub access_token: String,
    /// Rotated refresh token, when the CRM issues one
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of the new token in seconds
    pub expires_in: i64,
}

// ============================================================================
// RemoteClient
// ============================================================================

/// HTTP client for the CRM REST API
///
/// Holds no token state; every authenticated method takes the access token
/// as an argument so the token manager stays the single owner of the
/// credential.
pub struct RemoteClient {
    client: Client,
    base_url: String,
}

impl RemoteClient {
    /// Creates a client from deploy-time configuration
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Creates a client against a custom base URL (useful for testing)
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Base URL requests are built against
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Authenticated request builder for `method` and `path`
    fn request(&self, method: Method, path: &str, access_token: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        self.client.request(method, &url).bearer_auth(access_token)
    }

    // ========================================================================
    // OAuth
    // ========================================================================

    /// Exchanges the refresh token for a new access token
    ///
    /// A failed refresh is terminal for the run: the CRM error body is
    /// carried so the operator can tell a revoked grant from a bad secret.
    pub async fn refresh_access_token(
        &self,
        client_id: &str,
        client_secret: &str,
        refresh_token: &str,
    ) -> Result<TokenRefreshResponse, SyncError> {
        debug!("refreshing access token");
        let url = format!("{}/oauth/v1/token", self.base_url);
        let response = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token),
                ("client_id", client_id),
                ("client_secret", client_secret),
            ])
            .send()
            .await
            .map_err(|e| SyncError::TransientNetwork(e.to_string()))?;

        if !response.status().is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::AuthExpired { body });
        }

        response
            .json::<TokenRefreshResponse>()
            .await
            .map_err(|e| SyncError::UnexpectedResponse(e.to_string()))
    }

    // ========================================================================
    // Record listings
    // ========================================================================

    /// Requests one page of the recently-modified listing
    pub async fn recent_page(
        &self,
        access_token: &str,
        kind: EntityKind,
        count: u32,
        offset: Option<&str>,
        properties: &[String],
    ) -> Result<Response, reqwest::Error> {
        let path = match kind {
            EntityKind::Contact => "/contacts/v1/lists/recently_updated/contacts/recent",
            EntityKind::Company => "/companies/v2/companies/recent/modified",
        };
        self.list_request(access_token, kind, path, count, offset, properties)
            .send()
            .await
    }

    /// Requests one page of the full listing
    pub async fn all_page(
        &self,
        access_token: &str,
        kind: EntityKind,
        count: u32,
        offset: Option<&str>,
        properties: &[String],
    ) -> Result<Response, reqwest::Error> {
        let path = match kind {
            EntityKind::Contact => "/contacts/v1/lists/all/contacts/all",
            EntityKind::Company => "/companies/v2/companies/paged",
        };
        self.list_request(access_token, kind, path, count, offset, properties)
            .send()
            .await
    }

    fn list_request(
        &self,
        access_token: &str,
        kind: EntityKind,
        path: &str,
        count: u32,
        offset: Option<&str>,
        properties: &[String],
    ) -> RequestBuilder {
        let (offset_param, property_param) = match kind {
            EntityKind::Contact => ("vidOffset", "property"),
            EntityKind::Company => ("offset", "properties"),
        };
        let mut builder = self
            .request(Method::GET, path, access_token)
            .query(&[("count", count.to_string())]);
        if let Some(offset) = offset {
            builder = builder.query(&[(offset_param, offset)]);
        }
        for property in properties {
            builder = builder.query(&[(property_param, property.as_str())]);
        }
        builder
    }

    // ========================================================================
    // Batch writes
    // ========================================================================

    /// Submits one batch upsert chunk
    pub async fn batch_upsert(
        &self,
        access_token: &str,
        kind: EntityKind,
        records: &[RemoteWriteRecord],
    ) -> Result<Response, reqwest::Error> {
        let path = match kind {
            EntityKind::Contact => "/contacts/v1/contact/batch/",
            EntityKind::Company => "/companies/v1/batch-async/update",
        };
        self.request(Method::POST, path, access_token)
            .query(&[("auditId", AUDIT_ID)])
            .json(records)
            .send()
            .await
    }

    // ========================================================================
    // Property schema
    // ========================================================================

    /// Reads all property groups with their properties
    pub async fn property_groups(
        &self,
        access_token: &str,
        kind: EntityKind,
    ) -> Result<Response, reqwest::Error> {
        let path = format!("/properties/v1/{}/groups", kind_segment(kind));
        self.request(Method::GET, &path, access_token)
            .query(&[("includeProperties", "true")])
            .send()
            .await
    }

    /// Creates a property group
    pub async fn create_property_group(
        &self,
        access_token: &str,
        kind: EntityKind,
        body: &serde_json::Value,
    ) -> Result<Response, reqwest::Error> {
        let path = format!("/properties/v1/{}/groups", kind_segment(kind));
        self.request(Method::POST, &path, access_token)
            .json(body)
            .send()
            .await
    }

    /// Creates a property
    pub async fn create_property(
        &self,
        access_token: &str,
        kind: EntityKind,
        body: &serde_json::Value,
    ) -> Result<Response, reqwest::Error> {
        let path = format!("/properties/v1/{}/properties", kind_segment(kind));
        self.request(Method::POST, &path, access_token)
            .json(body)
            .send()
            .await
    }

    /// Updates an existing property by name
    pub async fn update_property(
        &self,
        access_token: &str,
        kind: EntityKind,
        name: &str,
        body: &serde_json::Value,
    ) -> Result<Response, reqwest::Error> {
        let path = format!(
            "/properties/v1/{}/properties/named/{name}",
            kind_segment(kind)
        );
        self.request(Method::PUT, &path, access_token)
            .json(body)
            .send()
            .await
    }
}

fn kind_segment(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Contact => "contacts",
        EntityKind::Company => "companies",
    }
}
