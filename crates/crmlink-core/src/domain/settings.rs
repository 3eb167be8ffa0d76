//! Persisted connector settings
//!
//! A flat key-value document owned by the hub platform. Every write goes
//! through a [`SettingsPatch`] that merges into the stored document rather
//! than replacing it; concurrent sync runs only ever touch their own keys.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::entity::EntityKind;
use super::token::TokenState;

// ============================================================================
// User-configured field mappings
// ============================================================================

/// One user-configured field mapping row
///
/// `label` is the CRM-side field label the user typed; `hub` is the hub
/// attribute it maps to. Rows missing either side are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeMappingSetting {
    /// CRM field label (outbound rows) or CRM property name (inbound rows)
    #[serde(rename = "name")]
    pub label: String,
    /// Hub attribute name
    pub hub: String,
    /// Whether the mapped value may overwrite the connector-managed default
    #[serde(default)]
    pub overwrite: bool,
}

// ============================================================================
// ConnectorSettings
// ============================================================================

/// The connector's persisted state
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectorSettings {
    /// CRM access token
    pub token: Option<String>,
    /// CRM refresh token
    pub refresh_token: Option<String>,
    /// When the access token was obtained
    pub token_fetched_at: Option<DateTime<Utc>>,
    /// Access token lifetime in seconds
    pub expires_in: Option<i64>,

    /// Contact fetch watermark
    pub last_fetch_at: Option<DateTime<Utc>>,
    /// Company fetch watermark
    pub companies_last_fetch_at: Option<DateTime<Utc>>,

    /// User-configured outbound contact field mappings
    #[serde(default)]
    pub outgoing_contact_attributes: Vec<AttributeMappingSetting>,
    /// User-configured inbound contact field mappings
    #[serde(default)]
    pub incoming_contact_attributes: Vec<AttributeMappingSetting>,
    /// User-configured outbound company field mappings
    #[serde(default)]
    pub outgoing_company_attributes: Vec<AttributeMappingSetting>,
    /// User-configured inbound company field mappings
    #[serde(default)]
    pub incoming_company_attributes: Vec<AttributeMappingSetting>,

    /// Segment ids whitelisted for outbound contact sync
    #[serde(default)]
    pub synchronized_segments: Vec<String>,
    /// Segment ids whitelisted for outbound company sync
    #[serde(default)]
    pub synchronized_account_segments: Vec<String>,
}

impl ConnectorSettings {
    /// Whether the connector holds a CRM credential at all
    pub fn is_configured(&self) -> bool {
        self.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    /// The token state, when a token is present
    ///
    /// Missing bookkeeping fields degrade to a zero-lifetime token, which
    /// the token manager treats as already expired.
    pub fn token_state(&self) -> Option<TokenState> {
        let access_token = self.token.clone().filter(|t| !t.is_empty())?;
        Some(TokenState {
            access_token,
            refresh_token: self.refresh_token.clone(),
            fetched_at: self.token_fetched_at.unwrap_or_else(Utc::now),
            expires_in_secs: self.expires_in.unwrap_or(0),
        })
    }

    /// The fetch watermark for one entity kind
    pub fn last_fetch_at(&self, kind: EntityKind) -> Option<DateTime<Utc>> {
        match kind {
            EntityKind::Contact => self.last_fetch_at,
            EntityKind::Company => self.companies_last_fetch_at,
        }
    }

    /// User-configured outbound mapping rows for one entity kind
    pub fn outgoing_attributes(&self, kind: EntityKind) -> &[AttributeMappingSetting] {
        match kind {
            EntityKind::Contact => &self.outgoing_contact_attributes,
            EntityKind::Company => &self.outgoing_company_attributes,
        }
    }

    /// User-configured inbound mapping rows for one entity kind
    pub fn incoming_attributes(&self, kind: EntityKind) -> &[AttributeMappingSetting] {
        match kind {
            EntityKind::Contact => &self.incoming_contact_attributes,
            EntityKind::Company => &self.incoming_company_attributes,
        }
    }

    /// The segment whitelist for one entity kind
    pub fn synchronized_segments(&self, kind: EntityKind) -> &[String] {
        match kind {
            EntityKind::Contact => &self.synchronized_segments,
            EntityKind::Company => &self.synchronized_account_segments,
        }
    }

    /// Applies a patch in place, key by key
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(token) = patch.token {
            self.token = Some(token);
        }
        if let Some(refresh_token) = patch.refresh_token {
            self.refresh_token = Some(refresh_token);
        }
        if let Some(fetched_at) = patch.token_fetched_at {
            self.token_fetched_at = Some(fetched_at);
        }
        if let Some(expires_in) = patch.expires_in {
            self.expires_in = Some(expires_in);
        }
        if let Some(at) = patch.last_fetch_at {
            self.last_fetch_at = Some(at);
        }
        if let Some(at) = patch.companies_last_fetch_at {
            self.companies_last_fetch_at = Some(at);
        }
    }
}

// ============================================================================
// SettingsPatch
// ============================================================================

/// A partial settings update; unset keys are left untouched on merge
///
/// Callers merge rather than replace so that concurrent runs (contacts vs
/// companies, inbound vs outbound) cannot clobber each other's keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsPatch {
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    pub token_fetched_at: Option<DateTime<Utc>>,
    pub expires_in: Option<i64>,
    pub last_fetch_at: Option<DateTime<Utc>>,
    pub companies_last_fetch_at: Option<DateTime<Utc>>,
}

impl SettingsPatch {
    /// Patch recording a refreshed access token
    pub fn refreshed_token(access_token: String, expires_in: i64) -> Self {
        Self {
            token: Some(access_token),
            expires_in: Some(expires_in),
            token_fetched_at: Some(Utc::now()),
            ..Self::default()
        }
    }

    /// Patch advancing the fetch watermark for one entity kind
    pub fn watermark(kind: EntityKind, at: DateTime<Utc>) -> Self {
        match kind {
            EntityKind::Contact => Self {
                last_fetch_at: Some(at),
                ..Self::default()
            },
            EntityKind::Company => Self {
                companies_last_fetch_at: Some(at),
                ..Self::default()
            },
        }
    }
}
