//! Incremental fetch windows and pagination cursors
//!
//! A [`FetchWindow`] defines which CRM records count as "recently changed"
//! for one sync run. `since` persists across runs as the connector watermark;
//! `until` is fixed at run start so the run does not chase a moving target.
//! The trailing overlap re-includes borderline records because the CRM's
//! recently-modified listing rounds timestamps more coarsely than the filter.

use chrono::{DateTime, Duration, Utc};

/// Time window for one incremental fetch run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    /// Lower bound: records modified at or before this instant are stale
    pub since: DateTime<Utc>,
    /// Upper bound, fixed at run start
    pub until: DateTime<Utc>,
    /// Trailing buffer past `until` tolerating coarse CRM timestamps
    pub overlap_secs: i64,
}

impl FetchWindow {
    /// Builds a window ending now
    pub fn ending_now(since: DateTime<Utc>, overlap_secs: i64) -> Self {
        Self {
            since,
            until: Utc::now(),
            overlap_secs,
        }
    }

    /// Whether a record modified at `modified` belongs to this run
    ///
    /// The record must be strictly newer than `since`, and must not be more
    /// than `overlap_secs` past `until`.
    pub fn contains(&self, modified: DateTime<Utc>) -> bool {
        modified > self.since && modified - Duration::seconds(self.overlap_secs) < self.until
    }
}

/// Opaque CRM paging state for one fetch operation
///
/// Created at page one, discarded once `has_more` turns false or the window
/// is exhausted. A cursor is only valid after the page it came from has been
/// fully consumed, which is why fetching is strictly sequential.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaginationCursor {
    /// Offset token to pass on the next page request (None for page one)
    pub offset: Option<String>,
    /// Whether the CRM reported more pages
    pub has_more: bool,
}
