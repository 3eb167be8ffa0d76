//! Hub record -> CRM write payload
//!
//! Applies the outbound mapping table to one change notification and produces
//! the [`RemoteWriteRecord`] for the batch writer. Coercion rules, in order:
//!
//! 1. read-only entries are never sent
//! 2. entries without overwrite permission prefer the connector-managed
//!    default attribute's value when it is set
//! 3. null and empty-string values are omitted
//! 4. arrays are joined with `;`
//! 5. date-like values become epoch milliseconds; day-granularity CRM
//!    properties are floored to midnight UTC first
//! 6. everything else passes through as-is
//!
//! The derived segment-membership property is always appended, even when
//! empty, so leaving the last whitelisted segment clears it remotely.

use chrono::{DateTime, NaiveTime, TimeZone, Utc};
use serde_json::Value;

use crmlink_core::domain::entity::EntityKind;
use crmlink_core::domain::errors::MappingWarning;
use crmlink_core::domain::mapping::{PropertyMapping, RemotePropertyType};
use crmlink_core::domain::record::{RemotePropertyValue, RemoteWriteRecord, UpdateMessage};
use crmlink_core::domain::segments::SegmentSet;

/// CRM property carrying the record's hub segment memberships
pub const SEGMENTS_PROPERTY: &str = "hub_segments";

/// A derived write payload plus the non-fatal problems hit deriving it
#[derive(Debug)]
pub struct OutboundPayload {
    pub record: RemoteWriteRecord,
    pub warnings: Vec<MappingWarning>,
}

/// Applies the outbound mapping table for one entity kind
pub struct OutboundMapper<'a> {
    kind: EntityKind,
    entries: &'a [PropertyMapping],
    segments: &'a SegmentSet,
}

impl<'a> OutboundMapper<'a> {
    pub fn new(kind: EntityKind, entries: &'a [PropertyMapping], segments: &'a SegmentSet) -> Self {
        Self {
            kind,
            entries,
            segments,
        }
    }

    /// Derives the CRM write payload for one change notification
    pub fn payload(&self, message: &UpdateMessage) -> OutboundPayload {
        let mut warnings = Vec::new();
        let mut properties = Vec::new();

        for entry in self.entries.iter().filter(|e| e.writable()) {
            let raw = self.source_value(message, entry);
            let Some(raw) = raw else { continue };
            match coerce(entry, raw) {
                Ok(Some(value)) => properties.push(RemotePropertyValue {
                    property: entry.remote_property.clone(),
                    value,
                }),
                Ok(None) => {}
                Err(warning) => warnings.push(warning),
            }
        }

        let membership = self.segments.membership_value(&message.segment_ids());
        properties.push(RemotePropertyValue {
            property: SEGMENTS_PROPERTY.to_string(),
            value: Value::String(membership),
        });

        let record = RemoteWriteRecord {
            id: message.record.remote_id(),
            email: match self.kind {
                EntityKind::Contact => message.record.email().map(str::to_string),
                EntityKind::Company => None,
            },
            properties,
        };

        OutboundPayload { record, warnings }
    }

    /// Picks the hub attribute to read for one entry
    ///
    /// Without overwrite permission the connector-managed attribute's value
    /// wins whenever it is set.
    fn source_value<'m>(
        &self,
        message: &'m UpdateMessage,
        entry: &PropertyMapping,
    ) -> Option<&'m Value> {
        if !entry.overwrite_allowed {
            if let Some(default_attr) = entry.default_hub_attribute.as_deref() {
                if let Some(value) = message.record.value(default_attr) {
                    if !value.is_null() {
                        return Some(value);
                    }
                }
            }
        }
        message.record.value(&entry.hub_attribute)
    }
}

// ============================================================================
// Value coercion
// ============================================================================

/// Whether an entry's value goes over the wire as epoch milliseconds
fn is_date_like(entry: &PropertyMapping) -> bool {
    matches!(
        entry.remote_type,
        RemotePropertyType::Date | RemotePropertyType::Datetime
    ) || entry.hub_attribute_type == "date"
        || entry.hub_attribute.ends_with("_at")
        || entry.hub_attribute.ends_with("date")
}

/// Coerces one hub value for the wire; `Ok(None)` omits the field
fn coerce(entry: &PropertyMapping, raw: &Value) -> Result<Option<Value>, MappingWarning> {
    let joined;
    let raw = match raw {
        Value::Null => return Ok(None),
        Value::String(s) if s.is_empty() => return Ok(None),
        Value::Array(items) => {
            joined = Value::String(join_array(items));
            &joined
        }
        other => other,
    };

    if is_date_like(entry) {
        let Some(parsed) = parse_date(raw) else {
            return Err(MappingWarning::UnparseableDate {
                attribute: entry.hub_attribute.clone(),
                value: raw.to_string(),
            });
        };
        let parsed = match entry.remote_type {
            // Day-granularity properties reject non-midnight timestamps
            RemotePropertyType::Date => floor_to_midnight(parsed),
            _ => parsed,
        };
        return Ok(Some(Value::from(parsed.timestamp_millis())));
    }

    Ok(Some(raw.clone()))
}

fn join_array(items: &[Value]) -> String {
    items
        .iter()
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(";")
}

/// Parses a hub date value: RFC 3339 string, or epoch millis as number or
/// numeric string
fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            if let Ok(parsed) = DateTime::parse_from_rfc3339(s) {
                return Some(parsed.with_timezone(&Utc));
            }
            let millis = s.parse::<i64>().ok()?;
            Utc.timestamp_millis_opt(millis).single()
        }
        Value::Number(n) => Utc.timestamp_millis_opt(n.as_i64()?).single(),
        _ => None,
    }
}

fn floor_to_midnight(at: DateTime<Utc>) -> DateTime<Utc> {
    Utc.from_utc_datetime(&at.date_naive().and_time(NaiveTime::MIN))
}
