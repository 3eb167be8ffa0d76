//! CRM-side schema and record snapshots
//!
//! Read-model types for data coming *from* the CRM: the property catalog
//! (flattened from the group listing) and individual records from the list
//! endpoints. Field names follow the CRM wire format via serde renames; the
//! rest of the core only sees the accessor methods.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entity::EntityKind;
use super::mapping::{RemoteFieldKind, RemotePropertyType};

// ============================================================================
// Property catalog
// ============================================================================

/// One option of an enumeration property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyOption {
    /// Display label
    pub label: String,
    /// Stored value
    pub value: Value,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default, rename = "displayOrder")]
    pub display_order: i32,
}

/// One property definition from the CRM catalog
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteProperty {
    /// Property name (wire identifier)
    pub name: String,
    /// User-facing label
    #[serde(default)]
    pub label: String,
    /// Data type
    #[serde(rename = "type")]
    pub kind: RemotePropertyType,
    /// Form-field kind
    #[serde(rename = "fieldType")]
    pub field_kind: RemoteFieldKind,
    /// Whether the CRM refuses writes to this property's value
    #[serde(default, rename = "readOnlyValue")]
    pub read_only: bool,
    #[serde(default, rename = "displayOrder")]
    pub display_order: Option<i32>,
    /// Options, for enumeration properties
    #[serde(default)]
    pub options: Vec<PropertyOption>,
}

/// One property group from the CRM catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemotePropertyGroup {
    /// Group name (wire identifier)
    pub name: String,
    /// User-facing group label
    #[serde(default, rename = "displayName")]
    pub display_name: String,
    /// Properties in this group
    #[serde(default)]
    pub properties: Vec<RemoteProperty>,
}

/// Flattened property lookup over all groups
///
/// Built once per sync run from the live group listing; never shared across
/// concurrent runs.
#[derive(Debug, Clone, Default)]
pub struct RemoteCatalog {
    by_name: HashMap<String, RemoteProperty>,
}

impl RemoteCatalog {
    /// Flattens a group listing into a name-indexed catalog
    pub fn from_groups(groups: &[RemotePropertyGroup]) -> Self {
        let by_name = groups
            .iter()
            .flat_map(|g| g.properties.iter())
            .map(|p| (p.name.clone(), p.clone()))
            .collect();
        Self { by_name }
    }

    /// Looks up a property by exact name
    pub fn get(&self, name: &str) -> Option<&RemoteProperty> {
        self.by_name.get(name)
    }

    /// Whether `name` exists and is writable
    pub fn is_writable(&self, name: &str) -> bool {
        self.by_name.get(name).is_some_and(|p| !p.read_only)
    }
}

// ============================================================================
// Records
// ============================================================================

/// One property value on a CRM record
///
/// The CRM wraps every value in an object; values arrive as strings even for
/// numeric properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteValue {
    /// Raw value
    pub value: Value,
}

/// One record from a CRM list endpoint (contact or company)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RemoteRecord {
    /// Contact identifier
    #[serde(default, rename = "vid", skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    /// Canonical contact identifier after merges
    #[serde(
        default,
        rename = "canonical-vid",
        skip_serializing_if = "Option::is_none"
    )]
    pub canonical_id: Option<u64>,
    /// Company identifier
    #[serde(default, rename = "companyId", skip_serializing_if = "Option::is_none")]
    pub company_id: Option<u64>,
    /// Property values by name
    #[serde(default)]
    pub properties: HashMap<String, RemoteValue>,
}

impl RemoteRecord {
    /// The record's canonical identifier, preferring the post-merge id
    pub fn record_id(&self) -> Option<u64> {
        self.canonical_id.or(self.id).or(self.company_id)
    }

    /// Reads a property value by name
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.properties.get(name).map(|v| &v.value)
    }

    /// Reads a property value as a string
    pub fn value_str(&self, name: &str) -> Option<&str> {
        self.value(name).and_then(Value::as_str)
    }

    /// The record's last modification time, from the kind-specific
    /// epoch-millisecond property
    pub fn modified_at(&self, kind: EntityKind) -> Option<DateTime<Utc>> {
        let raw = self.value(kind.last_modified_property())?;
        let millis = match raw {
            Value::String(s) => s.parse::<i64>().ok()?,
            Value::Number(n) => n.as_i64()?,
            _ => return None,
        };
        Utc.timestamp_millis_opt(millis).single()
    }
}
