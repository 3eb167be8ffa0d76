//! Per-run snapshot of everything the sync stages read
//!
//! A [`RunContext`] is assembled at the start of every sync run from the
//! persisted settings, the live CRM property catalog, the hub attribute
//! schema and the segment listing. The mapping tables are resolved eagerly
//! here; the stages downstream only ever see immutable borrowed slices.
//! Contexts are never shared across runs - schemas drift, and a stale
//! catalog would silently drop freshly mapped fields.

use crmlink_core::domain::entity::EntityKind;
use crmlink_core::domain::mapping::PropertyMapping;
use crmlink_core::domain::remote::RemoteCatalog;
use crmlink_core::domain::segments::{Segment, SegmentSet};
use crmlink_core::domain::settings::ConnectorSettings;
use crmlink_core::ports::hub_platform::HubAttribute;
use crmlink_mapping::builder::MappingBuilder;

/// Everything one sync run reads, snapshotted at run start
pub struct RunContext {
    pub kind: EntityKind,
    pub settings: ConnectorSettings,
    pub catalog: RemoteCatalog,
    pub hub_schema: Vec<HubAttribute>,
    pub segments: SegmentSet,
    /// Resolved outbound mapping table
    pub outbound: Vec<PropertyMapping>,
    /// Resolved inbound mapping table
    pub inbound: Vec<PropertyMapping>,
}

impl RunContext {
    /// Resolves both mapping tables against the given snapshots
    pub fn assemble(
        kind: EntityKind,
        settings: ConnectorSettings,
        catalog: RemoteCatalog,
        hub_schema: Vec<HubAttribute>,
        segments: Vec<Segment>,
    ) -> Self {
        let builder = MappingBuilder::new(kind, &catalog, &hub_schema);
        let outbound = builder.outbound(&settings);
        let inbound = builder.inbound(&settings);
        Self {
            kind,
            settings,
            catalog,
            hub_schema,
            segments: SegmentSet::new(segments),
            outbound,
            inbound,
        }
    }

    /// The segment whitelist for this run's entity kind
    pub fn whitelist(&self) -> &[String] {
        self.settings.synchronized_segments(self.kind)
    }

    /// CRM property names requested on every listing page: everything the
    /// inbound table reads plus the modification timestamp and the identity
    /// properties
    pub fn fetch_properties(&self) -> Vec<String> {
        let mut properties: Vec<String> = self
            .inbound
            .iter()
            .map(|e| e.remote_property.clone())
            .collect();

        let mut push = |name: &str| {
            if !properties.iter().any(|p| p == name) {
                properties.push(name.to_string());
            }
        };
        push(self.kind.last_modified_property());
        match self.kind {
            EntityKind::Contact => {
                push("email");
                push("firstname");
                push("lastname");
            }
            EntityKind::Company => {
                push("name");
                push("domain");
            }
        }
        properties
    }
}
