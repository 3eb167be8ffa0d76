//! Mapping table construction
//!
//! Builds the per-direction [`PropertyMapping`] lists from three inputs taken
//! at the start of a sync run: the built-in default table, the user-configured
//! rows from connector settings, and live snapshots of both schemas. Entries
//! whose CRM property cannot be resolved against the catalog are dropped with
//! a warning; a stale user row never aborts the run.

use std::collections::HashMap;

use tracing::warn;

use crmlink_core::domain::entity::EntityKind;
use crmlink_core::domain::errors::MappingWarning;
use crmlink_core::domain::mapping::{
    MappingDirection, PropertyMapping, RemoteFieldKind, RemotePropertyType,
};
use crmlink_core::domain::remote::RemoteCatalog;
use crmlink_core::domain::settings::{AttributeMappingSetting, ConnectorSettings};
use crmlink_core::ports::hub_platform::HubAttribute;

use crate::defaults::{defaults_for, find_default};

/// CRM property name prefix for connector-created properties
pub const REMOTE_PROPERTY_PREFIX: &str = "hub_";

// ============================================================================
// Naming
// ============================================================================

/// Lowercases a field label and replaces every non-alphanumeric run character
/// with `_`, producing a CRM-safe property slug
pub fn slugify(label: &str) -> String {
    label
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// The connector-owned CRM property name for a user-entered field label
pub fn prefixed_property_name(label: &str) -> String {
    format!("{REMOTE_PROPERTY_PREFIX}{}", slugify(label))
}

// ============================================================================
// MappingBuilder
// ============================================================================

/// Resolves mapping tables against live schema snapshots
///
/// Built once per sync run; both snapshots are borrowed for the run's
/// duration.
pub struct MappingBuilder<'a> {
    kind: EntityKind,
    catalog: &'a RemoteCatalog,
    hub_types: HashMap<&'a str, &'a str>,
}

impl<'a> MappingBuilder<'a> {
    pub fn new(
        kind: EntityKind,
        catalog: &'a RemoteCatalog,
        hub_schema: &'a [HubAttribute],
    ) -> Self {
        let hub_types = hub_schema
            .iter()
            .map(|a| (a.id.as_str(), a.kind.as_str()))
            .collect();
        Self {
            kind,
            catalog,
            hub_types,
        }
    }

    /// Builds the outbound mapping table
    ///
    /// Default entries are layered under the user-configured rows; when both
    /// resolve to the same CRM property the user row wins. Read-only default
    /// rows are kept out entirely, they exist for the inbound direction.
    pub fn outbound(&self, settings: &ConnectorSettings) -> Vec<PropertyMapping> {
        let user_rows = settings.outgoing_attributes(self.kind);
        let mut entries: Vec<PropertyMapping> = Vec::new();

        for default in defaults_for(self.kind) {
            if default.read_only {
                continue;
            }
            if let Some(entry) = self.resolve(
                MappingDirection::Outbound,
                default.hub,
                default.remote_name,
                None,
                true,
            ) {
                entries.push(entry);
            }
        }

        for row in user_rows {
            let Some((remote_property, label)) = self.resolve_user_property(row) else {
                continue;
            };
            let entry = self.resolve(
                MappingDirection::Outbound,
                &row.hub,
                &remote_property,
                label,
                row.overwrite,
            );
            let Some(entry) = entry else { continue };
            // User row replaces any default targeting the same property
            entries.retain(|e| e.remote_property != entry.remote_property);
            entries.push(entry);
        }

        entries
    }

    /// Builds the inbound mapping table
    ///
    /// User rows name the CRM property directly. Rows resolving to the same
    /// property as a default replace it.
    pub fn inbound(&self, settings: &ConnectorSettings) -> Vec<PropertyMapping> {
        let user_rows = settings.incoming_attributes(self.kind);
        let mut entries: Vec<PropertyMapping> = Vec::new();

        for default in defaults_for(self.kind) {
            if let Some(entry) = self.resolve(
                MappingDirection::Inbound,
                default.hub,
                default.remote_name,
                None,
                true,
            ) {
                entries.push(entry);
            }
        }

        for row in user_rows {
            if row.label.is_empty() || row.hub.is_empty() {
                continue;
            }
            let entry = self.resolve(
                MappingDirection::Inbound,
                &row.hub,
                &row.label,
                None,
                row.overwrite,
            );
            let Some(entry) = entry else { continue };
            entries.retain(|e| e.remote_property != entry.remote_property);
            entries.push(entry);
        }

        entries
    }

    /// Resolves one user outbound row to a CRM property name
    ///
    /// The label is matched against the catalog as-is first (standard CRM
    /// fields the user named directly), then as the connector-prefixed slug.
    fn resolve_user_property(
        &self,
        row: &AttributeMappingSetting,
    ) -> Option<(String, Option<String>)> {
        if row.label.is_empty() || row.hub.is_empty() {
            return None;
        }
        let slug = slugify(&row.label);
        if self.catalog.get(&slug).is_some() {
            return Some((slug, Some(row.label.clone())));
        }
        Some((prefixed_property_name(&row.label), Some(row.label.clone())))
    }

    /// Resolves one entry against both schema snapshots, or drops it
    fn resolve(
        &self,
        direction: MappingDirection,
        hub_attribute: &str,
        remote_property: &str,
        remote_label: Option<String>,
        overwrite_allowed: bool,
    ) -> Option<PropertyMapping> {
        let Some(property) = self.catalog.get(remote_property) else {
            let warning = MappingWarning::UnmappedProperty {
                property: remote_property.to_string(),
            };
            warn!(kind = %self.kind, %warning, "dropping mapping entry");
            return None;
        };

        let hub_attribute_type = self
            .hub_types
            .get(hub_attribute)
            .copied()
            .unwrap_or("string")
            .to_string();

        // A user row shadowing a built-in field defers to the connector's own
        // attribute unless the user allowed overwriting
        let default_hub_attribute = find_default(self.kind, remote_property)
            .filter(|d| d.hub != hub_attribute)
            .map(|d| d.hub.to_string());

        Some(PropertyMapping {
            direction,
            hub_attribute: hub_attribute.to_string(),
            hub_attribute_type,
            default_hub_attribute,
            remote_property: property.name.clone(),
            remote_label: remote_label.or_else(|| Some(property.label.clone())),
            remote_type: property.kind,
            remote_field_kind: property.field_kind,
            read_only: property.read_only,
            overwrite_allowed,
            display_order: property.display_order,
        })
    }
}
