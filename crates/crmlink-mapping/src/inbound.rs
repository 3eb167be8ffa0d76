//! CRM record -> hub attribute writes
//!
//! Applies the inbound mapping table to one fetched CRM record. The CRM
//! delivers every value as a string, so coercion reverses the outbound rules:
//! numbers are parsed, multi-select values are `;`-split into arrays, and
//! boolean checkboxes become real booleans.
//!
//! Every inbound write also stamps the record's CRM identifier and the fetch
//! timestamp; the outbound filter keys its loop prevention off the latter.
//! Person/company name attributes are written set-if-null so CRM data never
//! replaces names the hub already knows.

use chrono::{DateTime, Utc};
use serde_json::Value;

use crmlink_core::domain::entity::EntityKind;
use crmlink_core::domain::mapping::{PropertyMapping, RemoteFieldKind, RemotePropertyType};
use crmlink_core::domain::record::{FETCHED_AT_ATTRIBUTE, REMOTE_ID_ATTRIBUTE};
use crmlink_core::domain::remote::RemoteRecord;
use crmlink_core::ports::hub_platform::{AttributeWrite, HubIdent};

/// One CRM record translated into a hub write
#[derive(Debug)]
pub struct InboundWrite {
    /// Identity claims resolving the target hub record
    pub ident: HubIdent,
    /// Attribute writes, including the identifier and fetch stamps
    pub writes: Vec<AttributeWrite>,
}

/// Applies the inbound mapping table for one entity kind
pub struct InboundMapper<'a> {
    kind: EntityKind,
    entries: &'a [PropertyMapping],
}

impl<'a> InboundMapper<'a> {
    pub fn new(kind: EntityKind, entries: &'a [PropertyMapping]) -> Self {
        Self { kind, entries }
    }

    /// Translates one fetched record, or `None` when it carries no identifier
    pub fn translate(&self, record: &RemoteRecord, fetched_at: DateTime<Utc>) -> Option<InboundWrite> {
        let id = record.record_id()?;

        let mut writes = vec![
            AttributeWrite::set(REMOTE_ID_ATTRIBUTE, Value::from(id)),
            AttributeWrite::set(FETCHED_AT_ATTRIBUTE, Value::String(fetched_at.to_rfc3339())),
        ];

        for entry in self.entries {
            let Some(raw) = record.value(&entry.remote_property) else {
                continue;
            };
            let Some(value) = coerce(entry, raw) else {
                continue;
            };
            if is_name_attribute(self.kind, &entry.hub_attribute) {
                writes.push(AttributeWrite::set_if_null(&entry.hub_attribute, value));
            } else {
                writes.push(AttributeWrite::set(&entry.hub_attribute, value));
            }
        }

        if self.kind == EntityKind::Contact {
            // Top-level person names mirror the namespaced attributes but
            // never overwrite what the hub already holds
            for (property, attribute) in [("firstname", "first_name"), ("lastname", "last_name")] {
                if let Some(name) = record.value_str(property).filter(|s| !s.is_empty()) {
                    writes.push(AttributeWrite::set_if_null(attribute, Value::from(name)));
                }
            }
        }

        Some(InboundWrite {
            ident: self.ident(record, id),
            writes,
        })
    }

    fn ident(&self, record: &RemoteRecord, id: u64) -> HubIdent {
        HubIdent {
            email: match self.kind {
                EntityKind::Contact => record
                    .value_str("email")
                    .filter(|s| !s.is_empty())
                    .map(str::to_string),
                EntityKind::Company => None,
            },
            external_id: None,
            anonymous_id: Some(format!("crm:{id}")),
        }
    }
}

/// Top-level attributes the hub owns; CRM values only fill gaps
fn is_name_attribute(kind: EntityKind, attribute: &str) -> bool {
    match kind {
        EntityKind::Contact => false,
        EntityKind::Company => attribute == "name",
    }
}

// ============================================================================
// Value coercion
// ============================================================================

/// Coerces one CRM string value to the hub-side shape; `None` omits the field
fn coerce(entry: &PropertyMapping, raw: &Value) -> Option<Value> {
    if raw.is_null() {
        return None;
    }
    if let Value::String(s) = raw {
        if s.is_empty() {
            return None;
        }
    }

    if entry.remote_field_kind == RemoteFieldKind::Checkbox
        || entry.remote_type == RemotePropertyType::Enumeration
    {
        if let Value::String(s) = raw {
            let items: Vec<Value> = s
                .split(';')
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(Value::from)
                .collect();
            return Some(Value::Array(items));
        }
    }

    match entry.remote_type {
        RemotePropertyType::Number => Some(parse_number(raw)),
        RemotePropertyType::Bool => Some(parse_bool(raw)),
        _ => Some(raw.clone()),
    }
}

/// Parses a stringly-typed number, keeping the raw value when it won't parse
fn parse_number(raw: &Value) -> Value {
    let Value::String(s) = raw else {
        return raw.clone();
    };
    if let Ok(int) = s.parse::<i64>() {
        return Value::from(int);
    }
    if let Ok(float) = s.parse::<f64>() {
        if let Some(number) = serde_json::Number::from_f64(float) {
            return Value::Number(number);
        }
    }
    raw.clone()
}

fn parse_bool(raw: &Value) -> Value {
    match raw {
        Value::String(s) if s == "true" => Value::Bool(true),
        Value::String(s) if s == "false" => Value::Bool(false),
        other => other.clone(),
    }
}
