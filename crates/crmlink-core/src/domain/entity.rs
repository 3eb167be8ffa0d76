//! Synchronized entity kinds
//!
//! The connector synchronizes two record types between the hub and the CRM:
//! contacts (hub users) and companies (hub accounts). The kind selects the
//! CRM endpoints, the persisted watermark key, the segment whitelist setting
//! and the default mapping table.

use serde::{Deserialize, Serialize};

/// A record type handled by the connector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Hub user <-> CRM contact
    Contact,
    /// Hub account <-> CRM company
    Company,
}

impl EntityKind {
    /// Human-readable name used in log events
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Contact => "contact",
            EntityKind::Company => "company",
        }
    }

    /// The CRM property holding the record's last modification time
    ///
    /// Contacts and companies expose the timestamp under different names.
    pub fn last_modified_property(&self) -> &'static str {
        match self {
            EntityKind::Contact => "lastmodifieddate",
            EntityKind::Company => "hs_lastmodifieddate",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
