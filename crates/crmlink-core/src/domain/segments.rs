//! Segment memberships
//!
//! Hub segments drive two things: the outbound whitelist filter and the
//! derived `hub_segments` CRM property, whose value is the `;`-joined list
//! of trimmed segment names. The set is ordered and name-deduplicated so the
//! derived value is deterministic run over run.

use serde::{Deserialize, Serialize};

/// One hub segment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// Hub segment identifier
    pub id: String,
    /// Display name
    pub name: String,
}

/// Ordered set of segments known to the connector for one entity kind
#[derive(Debug, Clone, Default)]
pub struct SegmentSet {
    segments: Vec<Segment>,
}

impl SegmentSet {
    /// Builds a set from the hub's segment listing, keeping the first
    /// occurrence of each name
    pub fn new(segments: Vec<Segment>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let segments = segments
            .into_iter()
            .filter(|s| seen.insert(s.name.trim().to_string()))
            .collect();
        Self { segments }
    }

    /// All segments, in insertion order
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Trimmed display names, in insertion order
    pub fn names(&self) -> Vec<String> {
        self.segments
            .iter()
            .map(|s| s.name.trim().to_string())
            .collect()
    }

    /// Looks up a segment name by id
    pub fn name_of(&self, id: &str) -> Option<&str> {
        self.segments
            .iter()
            .find(|s| s.id == id)
            .map(|s| s.name.as_str())
    }

    /// The derived `hub_segments` property value for a record belonging to
    /// `member_ids`: distinct trimmed names joined with `;`, in set order
    pub fn membership_value(&self, member_ids: &[&str]) -> String {
        let mut names: Vec<String> = Vec::new();
        for segment in &self.segments {
            if member_ids.contains(&segment.id.as_str()) {
                let name = segment.name.trim().to_string();
                if !name.is_empty() && !names.contains(&name) {
                    names.push(name);
                }
            }
        }
        names.join(";")
    }
}
