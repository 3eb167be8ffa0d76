//! Outbound record classification
//!
//! Decides per envelope whether the write goes out as an insert, an update,
//! or not at all. Rules run in order, first match wins:
//!
//! 1. loop prevention: the diff touched the connector's own fetch stamp and
//!    nothing about segment membership changed, so the notification is the
//!    echo of the previous inbound write
//! 2. segment whitelist: outside batch mode the record must belong to at
//!    least one synchronized segment
//! 3. identity: contacts need an email, companies a domain or a known CRM id
//!
//! Loop prevention runs before the whitelist on purpose: an inbound write can
//! transiently flip whitelist-relevant attributes, and those notifications
//! must die here rather than be judged on membership.

use crmlink_core::domain::entity::EntityKind;
use crmlink_core::domain::record::{Disposition, SkipReason, UpdateMessage, FETCHED_AT_ATTRIBUTE};

/// Classifies outbound change notifications for one entity kind
pub struct FilterEngine<'a> {
    kind: EntityKind,
    /// Segment ids whitelisted for outbound sync
    whitelist: &'a [String],
    /// Full exports bypass the whitelist; the export is an explicit user
    /// action over the whole dataset
    batch_mode: bool,
}

impl<'a> FilterEngine<'a> {
    pub fn new(kind: EntityKind, whitelist: &'a [String], batch_mode: bool) -> Self {
        Self {
            kind,
            whitelist,
            batch_mode,
        }
    }

    /// Applies the rules to one change notification
    pub fn classify(&self, message: &UpdateMessage) -> Disposition {
        if self.is_self_triggered(message) {
            return Disposition::Skip(SkipReason::SelfTriggered);
        }
        if !self.batch_mode && !self.is_whitelisted(message) {
            return Disposition::Skip(SkipReason::NotWhitelisted);
        }
        if !self.has_identity(message) {
            return Disposition::Skip(SkipReason::MissingIdentity);
        }
        if message.record.remote_id().is_some() {
            Disposition::ToUpdate
        } else {
            Disposition::ToInsert
        }
    }

    /// The notification is the echo of this connector's own inbound write:
    /// the fetch stamp moved and segment membership did not
    fn is_self_triggered(&self, message: &UpdateMessage) -> bool {
        message.changes.attributes.contains_key(FETCHED_AT_ATTRIBUTE)
            && !message.changes.has_segment_changes()
    }

    fn is_whitelisted(&self, message: &UpdateMessage) -> bool {
        message
            .segment_ids()
            .iter()
            .any(|id| self.whitelist.iter().any(|w| w == id))
    }

    fn has_identity(&self, message: &UpdateMessage) -> bool {
        match self.kind {
            EntityKind::Contact => message.record.email().is_some(),
            EntityKind::Company => {
                message.record.domain().is_some() || message.record.remote_id().is_some()
            }
        }
    }
}
