//! Built-in default mapping tables
//!
//! One row per standard CRM field the connector maps out of the box. Rows
//! marked read-only exist for the inbound direction only; the outbound
//! writer never sends them. Hub-side attributes for CRM-sourced data live
//! under the `crm/` namespace.

use crmlink_core::domain::entity::EntityKind;

/// One row of the built-in mapping table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DefaultMapping {
    /// CRM property name
    pub remote_name: &'static str,
    /// Hub attribute name
    pub hub: &'static str,
    /// Declared type used when (re)creating the property remotely
    pub kind: &'static str,
    /// Whether the CRM computes this field itself
    pub read_only: bool,
}

const fn row(remote_name: &'static str, hub: &'static str, kind: &'static str) -> DefaultMapping {
    DefaultMapping {
        remote_name,
        hub,
        kind,
        read_only: false,
    }
}

const fn computed(
    remote_name: &'static str,
    hub: &'static str,
    kind: &'static str,
) -> DefaultMapping {
    DefaultMapping {
        remote_name,
        hub,
        kind,
        read_only: true,
    }
}

/// Default contact field mappings
pub const CONTACT_DEFAULTS: &[DefaultMapping] = &[
    row("email", "email", "string"),
    row("salutation", "crm/salutation", "string"),
    row("firstname", "crm/first_name", "string"),
    row("lastname", "crm/last_name", "string"),
    row("phone", "crm/phone", "string"),
    row("mobilephone", "crm/mobile_phone", "string"),
    row("address", "crm/address_street", "string"),
    row("city", "crm/address_city", "string"),
    row("zip", "crm/address_postal_code", "string"),
    row("state", "crm/address_state", "string"),
    row("country", "crm/address_country", "string"),
    row("fax", "crm/fax", "string"),
    row("company", "crm/company", "string"),
    row("industry", "crm/industry", "string"),
    row("jobtitle", "crm/job_title", "string"),
    row("numemployees", "crm/employees_count", "number"),
    row("website", "crm/website", "string"),
    row("createdate", "crm/created_at", "date"),
    row("closedate", "crm/closed_at", "date"),
    row("lastmodifieddate", "crm/updated_at", "date"),
    row("annualrevenue", "crm/annual_revenue", "number"),
    row("total_revenue", "crm/total_revenue", "number"),
    row("lifecyclestage", "crm/lifecycle_stage", "string"),
    computed("days_to_close", "crm/days_to_close", "number"),
    row("first_deal_created_date", "crm/first_deal_created_at", "date"),
    computed("num_associated_deals", "crm/associated_deals_count", "number"),
    row("hubspot_owner_id", "crm/owner_id", "string"),
    computed("hs_email_optout", "crm/email_optout", "boolean"),
    row("message", "crm/message", "string"),
    row("recent_deal_amount", "crm/recent_deal_amount", "number"),
    row("recent_deal_close_date", "crm/recent_deal_closed_at", "date"),
    computed("num_notes", "crm/notes_count", "number"),
    computed("num_contacted_notes", "crm/contacted_notes_count", "string"),
    row("notes_last_contacted", "crm/notes_last_contacted_at", "date"),
    row("notes_last_updated", "crm/last_activity_at", "date"),
    row("notes_next_activity_date", "crm/next_activity_at", "date"),
    row("hubspot_owner_assigneddate", "crm/owner_assigned_at", "date"),
    row("hs_lead_status", "crm/lead_status", "string"),
    row("hs_lifecyclestage_customer_date", "crm/became_customer_at", "date"),
    row("hs_lifecyclestage_lead_date", "crm/became_lead_at", "date"),
    row(
        "hs_lifecyclestage_marketingqualifiedlead_date",
        "crm/became_marketing_qualified_lead_at",
        "date",
    ),
    row(
        "hs_lifecyclestage_salesqualifiedlead_date",
        "crm/became_sales_qualified_lead_at",
        "date",
    ),
    row(
        "hs_lifecyclestage_subscriber_date",
        "crm/became_subscriber_at",
        "date",
    ),
    row(
        "hs_lifecyclestage_evangelist_date",
        "crm/became_evangelist_at",
        "date",
    ),
    row(
        "hs_lifecyclestage_opportunity_date",
        "crm/became_opportunity_at",
        "date",
    ),
    row("hs_lifecyclestage_other_date", "crm/became_other_at", "date"),
];

/// Default company field mappings
pub const COMPANY_DEFAULTS: &[DefaultMapping] = &[
    row("name", "name", "string"),
    row("domain", "domain", "string"),
    row("website", "crm/website", "string"),
    row("industry", "crm/industry", "string"),
    row("phone", "crm/phone", "string"),
    row("city", "crm/address_city", "string"),
    row("state", "crm/address_state", "string"),
    row("country", "crm/address_country", "string"),
    row("numberofemployees", "crm/employees_count", "number"),
    row("annualrevenue", "crm/annual_revenue", "number"),
    row("createdate", "crm/created_at", "date"),
    row("hs_lastmodifieddate", "crm/updated_at", "date"),
    row("lifecyclestage", "crm/lifecycle_stage", "string"),
    row("description", "crm/description", "string"),
    computed("is_public", "crm/is_public", "boolean"),
];

/// The default table for one entity kind
pub fn defaults_for(kind: EntityKind) -> &'static [DefaultMapping] {
    match kind {
        EntityKind::Contact => CONTACT_DEFAULTS,
        EntityKind::Company => COMPANY_DEFAULTS,
    }
}

/// Finds the default row whose CRM property name equals `remote_name`
pub fn find_default(kind: EntityKind, remote_name: &str) -> Option<&'static DefaultMapping> {
    defaults_for(kind)
        .iter()
        .find(|d| d.remote_name == remote_name)
}
