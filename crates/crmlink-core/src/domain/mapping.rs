//! Property mapping entries
//!
//! A [`PropertyMapping`] links one hub attribute to one CRM property in a
//! single direction. The mapping tables are built fresh on every sync pass
//! from three static sources: the built-in default table, the user-configured
//! per-field settings, and live snapshots of both schemas. Entries whose
//! remote property or hub attribute cannot be resolved are dropped with a
//! warning at build time; nothing is resolved lazily per field access.

use serde::{Deserialize, Serialize};

// ============================================================================
// Remote property typing
// ============================================================================

/// The CRM-side data type of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemotePropertyType {
    /// Free-form text
    String,
    /// Numeric value
    Number,
    /// Boolean flag
    Bool,
    /// Day-granularity date; the CRM rejects non-midnight timestamps
    Date,
    /// Millisecond-precision timestamp
    Datetime,
    /// One-of/many-of a fixed option list
    Enumeration,
}

/// The CRM-side form-field kind of a property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteFieldKind {
    /// Single-line text input
    Text,
    /// Multi-line text input
    Textarea,
    /// Multi-select checkbox list; values are `;`-joined on the wire
    Checkbox,
    /// Yes/No checkbox
    Booleancheckbox,
    /// Single-select dropdown
    Select,
    /// Read-only computed field
    Calculated,
}

// ============================================================================
// Mapping direction and entry
// ============================================================================

/// Which way a mapping entry translates
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MappingDirection {
    /// CRM record -> hub attributes
    Inbound,
    /// Hub record -> CRM properties
    Outbound,
}

/// One synchronized field, resolved against both live schemas
///
/// Invariant: `remote_property` is unique within a mapping direction; when a
/// user-configured entry and a default entry resolve to the same remote
/// property, the user entry wins.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyMapping {
    /// Translation direction this entry belongs to
    pub direction: MappingDirection,
    /// Hub attribute name (e.g. `crm/first_name`)
    pub hub_attribute: String,
    /// Hub attribute type, from the hub schema snapshot
    pub hub_attribute_type: String,
    /// When the user mapping is not allowed to overwrite, the value of this
    /// connector-managed default attribute is preferred over the mapped one
    pub default_hub_attribute: Option<String>,
    /// CRM property name (e.g. `firstname` or `hub_lead_score`)
    pub remote_property: String,
    /// User-facing label of the CRM property
    pub remote_label: Option<String>,
    /// CRM property type, from the live property catalog
    pub remote_type: RemotePropertyType,
    /// CRM form-field kind, from the live property catalog
    pub remote_field_kind: RemoteFieldKind,
    /// Whether the CRM refuses writes to this property
    pub read_only: bool,
    /// Whether a user-mapped value may replace the connector-managed default
    pub overwrite_allowed: bool,
    /// Display order carried over when (re)creating the property remotely
    pub display_order: Option<i32>,
}

impl PropertyMapping {
    /// Whether the outbound writer may send a value for this entry
    ///
    /// Only properties the catalog marks writable are ever sent.
    pub fn writable(&self) -> bool {
        !self.read_only
    }
}
