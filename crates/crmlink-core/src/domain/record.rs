//! Records, change notifications and write envelopes
//!
//! An outbound sync run receives change notifications from the hub, wraps
//! each one in a [`RecordEnvelope`] with its derived CRM write payload, and
//! hands the envelopes to the filter and batch-write stages. Envelopes are
//! created per record, consumed once by the batch writer, then discarded.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::segments::Segment;

// ============================================================================
// Hub-side record data
// ============================================================================

/// Hub attribute name of the CRM record identifier
pub const REMOTE_ID_ATTRIBUTE: &str = "crm/id";

/// Hub attribute stamped on every inbound write; used for loop prevention
pub const FETCHED_AT_ATTRIBUTE: &str = "crm/fetched_at";

/// A flat snapshot of one hub record's attributes
///
/// Attribute values are untyped JSON; the mapping engine coerces them per
/// entry. Reads fall back to the legacy `traits_`-prefixed key so records
/// extracted through the hub's older export surface still resolve.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HubRecord {
    /// Attribute name -> value
    #[serde(flatten)]
    pub attributes: serde_json::Map<String, Value>,
}

impl HubRecord {
    /// Reads an attribute, falling back to the legacy `traits_` namespace
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.attributes
            .get(name)
            .or_else(|| self.attributes.get(&format!("traits_{name}")))
    }

    /// The record's email attribute, when present and non-empty
    pub fn email(&self) -> Option<&str> {
        self.value("email")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// The record's domain attribute, when present and non-empty
    pub fn domain(&self) -> Option<&str> {
        self.value("domain")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// The known CRM identifier for this record, when already synchronized
    pub fn remote_id(&self) -> Option<String> {
        match self.value(REMOTE_ID_ATTRIBUTE) {
            Some(Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}

// ============================================================================
// Change notifications
// ============================================================================

/// Old and new value of one changed attribute
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeChange {
    /// Value before the change (JSON null when previously unset)
    pub previous: Value,
    /// Value after the change
    pub current: Value,
}

/// The diff carried by a change notification
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChangeSet {
    /// Changed attributes, by name
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeChange>,
    /// Segments the record entered with this change
    #[serde(default)]
    pub segments_entered: Vec<Segment>,
    /// Segments the record left with this change
    #[serde(default)]
    pub segments_left: Vec<Segment>,
}

impl ChangeSet {
    /// Whether the diff includes any segment membership change
    pub fn has_segment_changes(&self) -> bool {
        !self.segments_entered.is_empty() || !self.segments_left.is_empty()
    }
}

/// One hub-originated change notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateMessage {
    /// Snapshot of the record after the change
    pub record: HubRecord,
    /// What changed
    #[serde(default)]
    pub changes: ChangeSet,
    /// Segments the record currently belongs to
    #[serde(default)]
    pub segments: Vec<Segment>,
}

impl UpdateMessage {
    /// Identifiers of the record's current segment memberships
    pub fn segment_ids(&self) -> Vec<&str> {
        self.segments.iter().map(|s| s.id.as_str()).collect()
    }
}

// ============================================================================
// CRM write payload
// ============================================================================

/// One property value in a CRM write payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemotePropertyValue {
    /// CRM property name
    pub property: String,
    /// Coerced value, ready for the wire
    pub value: Value,
}

/// The upsert body for one record, keyed by CRM id or by email
///
/// When the record carries a known CRM identifier the write targets it
/// directly; otherwise the CRM upserts by email (contacts) or the payload is
/// an insert (companies).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteWriteRecord {
    /// CRM record identifier, when already known
    #[serde(rename = "vid", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Upsert key for records without a CRM identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Property values to write
    pub properties: Vec<RemotePropertyValue>,
}

// ============================================================================
// Envelope
// ============================================================================

/// Why an envelope was skipped instead of written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The change was caused by this connector's own inbound write
    SelfTriggered,
    /// The record matches none of the synchronized segments
    NotWhitelisted,
    /// The record lacks the identity field the CRM requires
    MissingIdentity,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            SkipReason::SelfTriggered => "record just touched by connector",
            SkipReason::NotWhitelisted => "record doesn't match outgoing filter",
            SkipReason::MissingIdentity => "record is missing required identity",
        };
        f.write_str(reason)
    }
}

/// Outbound classification of one envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// No CRM identifier known yet; the write creates the record
    ToInsert,
    /// A CRM identifier is known; the write updates the record
    ToUpdate,
    /// The envelope must not be sent
    Skip(SkipReason),
}

/// Result of the batch write for one envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The CRM accepted the chunk containing this record (202); processing
    /// on the CRM side is asynchronous, so this confirms acceptance only
    Accepted,
    /// The CRM rejected this record
    Rejected {
        /// CRM error message, truncated for logging
        message: String,
        /// The property the rejection points at, when known
        property: Option<String>,
    },
}

/// One in-flight outbound record: the notification, its derived write
/// payload, and its classification/outcome as the stages fill them in
#[derive(Debug, Clone)]
pub struct RecordEnvelope {
    /// The originating change notification
    pub message: UpdateMessage,
    /// Derived CRM write payload
    pub payload: RemoteWriteRecord,
    /// Set by the filter stage
    pub disposition: Option<Disposition>,
    /// Set by the batch writer
    pub outcome: Option<WriteOutcome>,
}

impl RecordEnvelope {
    /// Wraps a notification with its derived payload
    pub fn new(message: UpdateMessage, payload: RemoteWriteRecord) -> Self {
        Self {
            message,
            payload,
            disposition: None,
            outcome: None,
        }
    }
}
