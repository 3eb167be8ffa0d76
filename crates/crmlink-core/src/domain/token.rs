//! Access-token state
//!
//! The CRM credential as persisted in connector settings. Only the token
//! manager in `crmlink-remote` mutates this; every outbound call reads it.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// OAuth token state for the CRM API
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenState {
    /// Bearer token for authenticating API requests
    pub access_token: String,
    /// Token used to obtain a new access token without user interaction
    pub refresh_token: Option<String>,
    /// When the access token was obtained
    pub fetched_at: DateTime<Utc>,
    /// Access token lifetime in seconds, as reported by the CRM
    pub expires_in_secs: i64,
}

impl TokenState {
    /// The instant the access token expires
    pub fn expires_at(&self) -> DateTime<Utc> {
        self.fetched_at + Duration::seconds(self.expires_in_secs)
    }

    /// Whether the token should be refreshed now
    ///
    /// True when the token expires within `advance_secs` seconds. A token
    /// with unknown age (`expires_in_secs == 0`) always needs a refresh.
    pub fn needs_refresh(&self, advance_secs: i64) -> bool {
        let remaining = self.expires_at() - Utc::now();
        remaining.num_seconds() <= advance_secs
    }
}
