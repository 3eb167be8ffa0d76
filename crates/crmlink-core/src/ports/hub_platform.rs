//! Hub platform port (driven/secondary port)
//!
//! Interface to the customer-data platform holding the source-of-truth
//! user/account records. The adapter behind it owns transport, auth and
//! batching toward the hub; the core only needs schema reads, segment reads
//! and identity-scoped attribute writes.
//!
//! ## Design Notes
//!
//! - Uses `anyhow::Result` because errors at port boundaries are
//!   adapter-specific and don't need domain-level classification.
//! - Uses `#[async_trait]` for async trait methods.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::entity::EntityKind;
use crate::domain::segments::Segment;

// ============================================================================
// HubIdent
// ============================================================================

/// Identity claims resolving a write to one hub record
///
/// At least one claim must be present. Records sourced purely from the CRM
/// carry an anonymous id of the form `crm:<id>` until the hub merges them
/// with a known identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubIdent {
    /// Email claim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// External id claim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
    /// Anonymous id claim (`crm:<id>`)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anonymous_id: Option<String>,
}

impl HubIdent {
    /// Whether any identity claim is present
    pub fn is_resolvable(&self) -> bool {
        self.email.is_some() || self.external_id.is_some() || self.anonymous_id.is_some()
    }
}

// ============================================================================
// AttributeWrite
// ============================================================================

/// One attribute write toward the hub
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeWrite {
    /// Hub attribute name
    pub name: String,
    /// Value to write
    pub value: Value,
    /// When true the hub only sets the value if the attribute is currently
    /// null; used for name fields so CRM data never overwrites hub names
    #[serde(default)]
    pub set_if_null: bool,
}

impl AttributeWrite {
    /// Unconditional write
    pub fn set(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            set_if_null: false,
        }
    }

    /// Write only when the hub-side attribute is null
    pub fn set_if_null(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
            set_if_null: true,
        }
    }
}

// ============================================================================
// Hub schema snapshot
// ============================================================================

/// One attribute in the hub's schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HubAttribute {
    /// Attribute name (the schema's identifier)
    pub id: String,
    /// Attribute type (`string`, `number`, `boolean`, `date`, ...)
    #[serde(rename = "type")]
    pub kind: String,
}

// ============================================================================
// IHubPlatform trait
// ============================================================================

/// Port trait for hub platform operations
#[async_trait::async_trait]
pub trait IHubPlatform: Send + Sync {
    /// Reads the hub's attribute schema
    async fn attribute_schema(&self) -> anyhow::Result<Vec<HubAttribute>>;

    /// Reads the hub's segment listing for one entity kind
    async fn segments(&self, kind: EntityKind) -> anyhow::Result<Vec<Segment>>;

    /// Writes attributes to the record identified by `ident`
    async fn write_attributes(
        &self,
        kind: EntityKind,
        ident: &HubIdent,
        writes: Vec<AttributeWrite>,
    ) -> anyhow::Result<()>;
}
