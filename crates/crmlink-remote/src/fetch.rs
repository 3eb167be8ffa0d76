//! Paged record fetching
//!
//! Pull-based iteration over the CRM's record listings. A [`PageStream`] is
//! created per fetch operation and consumed strictly in order, because the
//! CRM's pagination cursor is only valid once the page it came from has been
//! fully processed. Streams are finite and not restartable mid-way; callers
//! start a fresh one to resume.
//!
//! Incremental fetches filter each page against a [`FetchWindow`]; a page
//! whose records all fall outside the window still advances the cursor, so
//! filtering is never mistaken for exhaustion. The wrap-around guard stops
//! iteration when the CRM's cursor points back at the page's first record, a
//! known listing quirk that would otherwise loop forever.

use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crmlink_core::domain::entity::EntityKind;
use crmlink_core::domain::errors::SyncError;
use crmlink_core::domain::remote::RemoteRecord;
use crmlink_core::domain::window::{FetchWindow, PaginationCursor};

use crate::client::RemoteClient;
use crate::token::TokenManager;

// ============================================================================
// Wire types
// ============================================================================

/// One page of the contact listing endpoints
#[derive(Debug, Deserialize)]
struct ContactListPage {
    #[serde(default)]
    contacts: Vec<RemoteRecord>,
    #[serde(default, rename = "has-more")]
    has_more: bool,
    #[serde(default, rename = "vid-offset")]
    offset: Option<u64>,
}

/// One page of the company listing endpoints
///
/// The recent-modified and full listings disagree on field casing, hence the
/// aliases.
#[derive(Debug, Deserialize)]
struct CompanyListPage {
    #[serde(default, alias = "results")]
    companies: Vec<RemoteRecord>,
    #[serde(default, rename = "has-more", alias = "hasMore")]
    has_more: bool,
    #[serde(default)]
    offset: Option<u64>,
}

/// One normalized page handed to the caller
#[derive(Debug)]
pub struct RecordPage {
    /// Records surviving the window filter
    pub records: Vec<RemoteRecord>,
    /// 1-based page number, for progress logging
    pub page: u32,
}

// ============================================================================
// IncrementalFetcher
// ============================================================================

/// Fetches record listings for one entity kind
pub struct IncrementalFetcher {
    client: Arc<RemoteClient>,
    tokens: Arc<TokenManager>,
    kind: EntityKind,
    page_size: u32,
    /// CRM property names requested on every page
    properties: Vec<String>,
}

impl IncrementalFetcher {
    pub fn new(
        client: Arc<RemoteClient>,
        tokens: Arc<TokenManager>,
        kind: EntityKind,
        page_size: u32,
        properties: Vec<String>,
    ) -> Self {
        Self {
            client,
            tokens,
            kind,
            page_size,
            properties,
        }
    }

    /// Streams the recently-modified listing filtered to `window`
    pub fn fetch_window(&self, window: FetchWindow) -> PageStream<'_> {
        PageStream {
            fetcher: self,
            window: Some(window),
            cursor: PaginationCursor::default(),
            page: 0,
            done: false,
        }
    }

    /// Streams the full listing, unfiltered; used only for backfill
    pub fn fetch_all(&self) -> PageStream<'_> {
        PageStream {
            fetcher: self,
            window: None,
            cursor: PaginationCursor::default(),
            page: 0,
            done: false,
        }
    }
}

// ============================================================================
// PageStream
// ============================================================================

/// One in-flight fetch operation
pub struct PageStream<'a> {
    fetcher: &'a IncrementalFetcher,
    window: Option<FetchWindow>,
    cursor: PaginationCursor,
    page: u32,
    done: bool,
}

impl PageStream<'_> {
    /// Fetches the next page, or `None` once the listing is exhausted
    pub async fn next_page(&mut self) -> Result<Option<RecordPage>, SyncError> {
        if self.done {
            return Ok(None);
        }

        let offset = self.cursor.offset.clone();
        let fetcher = self.fetcher;
        let recent = self.window.is_some();
        let response = fetcher
            .tokens
            .with_auth_retry(|token| {
                let offset = offset.clone();
                async move {
                    if recent {
                        fetcher
                            .client
                            .recent_page(
                                &token,
                                fetcher.kind,
                                fetcher.page_size,
                                offset.as_deref(),
                                &fetcher.properties,
                            )
                            .await
                    } else {
                        fetcher
                            .client
                            .all_page(
                                &token,
                                fetcher.kind,
                                fetcher.page_size,
                                offset.as_deref(),
                                &fetcher.properties,
                            )
                            .await
                    }
                }
            })
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::UnexpectedResponse(format!(
                "listing request failed with {status}: {body}"
            )));
        }

        let (mut records, has_more, next_offset) = parse_page(fetcher.kind, response).await?;
        self.page += 1;

        if records.is_empty() {
            self.done = true;
            return Ok(None);
        }

        // Cursor wrap-around guard: the next offset pointing at this page's
        // first record means the listing restarted from the top
        let first_id = records.first().and_then(RemoteRecord::record_id);
        let wrapped = match (&next_offset, first_id) {
            (Some(offset), Some(first)) => *offset == first.to_string(),
            _ => false,
        };

        let raw_count = records.len();
        if let Some(window) = self.window {
            let kind = fetcher.kind;
            records.retain(|r| {
                r.modified_at(kind)
                    .map(|modified| window.contains(modified))
                    .unwrap_or(false)
            });
        }
        debug!(
            kind = %fetcher.kind,
            page = self.page,
            fetched = raw_count,
            kept = records.len(),
            has_more,
            "fetched listing page"
        );

        if wrapped {
            warn!(
                kind = %fetcher.kind,
                page = self.page,
                "pagination cursor wrapped to the first record, stopping"
            );
            self.done = true;
        } else if !has_more {
            self.done = true;
        }
        self.cursor = PaginationCursor {
            offset: next_offset,
            has_more,
        };

        Ok(Some(RecordPage {
            records,
            page: self.page,
        }))
    }
}

async fn parse_page(
    kind: EntityKind,
    response: reqwest::Response,
) -> Result<(Vec<RemoteRecord>, bool, Option<String>), SyncError> {
    match kind {
        EntityKind::Contact => {
            let page: ContactListPage = response
                .json()
                .await
                .map_err(|e| SyncError::UnexpectedResponse(e.to_string()))?;
            Ok((
                page.contacts,
                page.has_more,
                page.offset.map(|o| o.to_string()),
            ))
        }
        EntityKind::Company => {
            let page: CompanyListPage = response
                .json()
                .await
                .map_err(|e| SyncError::UnexpectedResponse(e.to_string()))?;
            Ok((
                page.companies,
                page.has_more,
                page.offset.map(|o| o.to_string()),
            ))
        }
    }
}
