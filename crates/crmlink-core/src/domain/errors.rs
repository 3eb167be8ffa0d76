//! Connector error taxonomy
//!
//! Four recoverable/non-recoverable classes plus the non-fatal
//! [`MappingWarning`]:
//!
//! - [`SyncError::Configuration`] - missing credentials; the run aborts and
//!   no retry can succeed without user action.
//! - [`SyncError::AuthExpired`] - surfaced only after the single
//!   refresh-and-retry performed by the token manager also failed.
//! - [`SyncError::Validation`] - a per-record rejection from a batch write;
//!   never aborts the batch.
//! - [`SyncError::TransientNetwork`] - not retried internally; the job
//!   scheduler owns retry/backoff policy.

use thiserror::Error;

/// Errors surfaced by the synchronization core
#[derive(Debug, Error)]
pub enum SyncError {
    /// The connector is missing credentials or required settings
    #[error("connector is not configured: {0}")]
    Configuration(String),

    /// The access token could not be refreshed, or the refreshed token was
    /// rejected again. Carries the CRM error body for diagnostics.
    #[error("authorization expired and refresh failed: {body}")]
    AuthExpired {
        /// Raw CRM error body from the second unauthorized response
        body: String,
    },

    /// A single record was rejected by the CRM's validation
    #[error("record rejected by CRM: {message}")]
    Validation {
        /// CRM validation message (truncated)
        message: String,
        /// The CRM property the validation failed on, when known
        property: Option<String>,
    },

    /// Network-level failure talking to the CRM
    #[error("CRM request failed: {0}")]
    TransientNetwork(String),

    /// Unexpected CRM response that fits no structured error shape
    #[error("unexpected CRM response: {0}")]
    UnexpectedResponse(String),

    /// Failure writing to the hub platform
    #[error("hub write failed: {0}")]
    HubWrite(String),

    /// Failure persisting connector settings
    #[error("settings update failed: {0}")]
    Settings(String),
}

/// A non-fatal problem found while mapping one record
///
/// Warnings accumulate during mapping and are logged; a single unmapped or
/// unparseable field never aborts the rest of the record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingWarning {
    /// A mapping entry referenced a CRM property that no longer resolves
    UnmappedProperty {
        /// The remote property name that could not be resolved
        property: String,
    },
    /// A hub attribute held a value that could not be parsed as a date
    UnparseableDate {
        /// The hub attribute the value came from
        attribute: String,
        /// The offending raw value, stringified
        value: String,
    },
}

impl std::fmt::Display for MappingWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MappingWarning::UnmappedProperty { property } => {
                write!(f, "cannot find mapped CRM property: {property}")
            }
            MappingWarning::UnparseableDate { attribute, value } => {
                write!(f, "cannot parse date value for {attribute}: {value}")
            }
        }
    }
}
