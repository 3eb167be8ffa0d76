//! Sync orchestration
//!
//! The [`SyncEngine`] drives the two per-entity flows:
//!
//! 1. **Inbound** (poll): build the fetch window, persist the new watermark,
//!    page through the CRM listing, translate each record and write it to
//!    the hub
//! 2. **Outbound** (push): derive a write payload per change notification,
//!    classify it, send the survivors in batches and log every outcome
//!
//! Pages are fetched and saved strictly in order; the CRM's pagination
//! cursor is only valid once the page it came from has been consumed. A run
//! is abandoned on the first unhandled error - retrying a whole run is the
//! job scheduler's responsibility, not the engine's.

use std::fmt;
use std::sync::Arc;

use chrono::{Duration, Utc};
use tracing::{debug, error, info, warn};

use crmlink_core::config::{Config, SyncConfig};
use crmlink_core::domain::entity::EntityKind;
use crmlink_core::domain::errors::SyncError;
use crmlink_core::domain::record::{Disposition, RecordEnvelope, UpdateMessage, WriteOutcome};
use crmlink_core::domain::segments::SegmentSet;
use crmlink_core::domain::settings::{ConnectorSettings, SettingsPatch};
use crmlink_core::domain::window::FetchWindow;
use crmlink_core::ports::hub_platform::IHubPlatform;
use crmlink_core::ports::settings_store::ISettingsStore;
use crmlink_mapping::filter::FilterEngine;
use crmlink_mapping::inbound::InboundMapper;
use crmlink_mapping::outbound::OutboundMapper;
use crmlink_remote::batch::BatchWriter;
use crmlink_remote::client::RemoteClient;
use crmlink_remote::fetch::{IncrementalFetcher, PageStream};
use crmlink_remote::registry::PropertyRegistry;
use crmlink_remote::token::TokenManager;

use crate::context::RunContext;

// ============================================================================
// SyncState
// ============================================================================

/// Position of an inbound run in its fetch/save sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SyncState {
    Idle,
    Fetching(u32),
    Saving(u32),
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncState::Idle => write!(f, "idle"),
            SyncState::Fetching(page) => write!(f, "fetching page {page}"),
            SyncState::Saving(page) => write!(f, "saving page {page}"),
        }
    }
}

fn transition(kind: EntityKind, state: &mut SyncState, next: SyncState) {
    debug!(kind = %kind, from = %state, to = %next, "sync state transition");
    *state = next;
}

// ============================================================================
// FetchSummary
// ============================================================================

/// Summary of one completed inbound run
#[derive(Debug, Clone, Default)]
pub struct FetchSummary {
    /// Listing pages consumed
    pub pages: u32,
    /// Records surviving the window filter
    pub fetched: u64,
    /// Records written to the hub
    pub saved: u64,
    /// Records that failed to save (non-fatal, logged per record)
    pub errors: u64,
}

// ============================================================================
// SyncEngine
// ============================================================================

/// Composes the fetch, mapping, filter and batch-write stages per entity kind
///
/// ## Dependencies
///
/// - `hub`: schema reads, segment reads and attribute writes toward the hub
/// - `settings`: persisted connector state (tokens, watermarks, mappings)
/// - `client` / `tokens`: the CRM REST surface behind the auth-retry wrapper
pub struct SyncEngine {
    hub: Arc<dyn IHubPlatform>,
    settings: Arc<dyn ISettingsStore>,
    client: Arc<RemoteClient>,
    tokens: Arc<TokenManager>,
    sync: SyncConfig,
}

impl SyncEngine {
    pub fn new(
        hub: Arc<dyn IHubPlatform>,
        settings: Arc<dyn ISettingsStore>,
        client: Arc<RemoteClient>,
        tokens: Arc<TokenManager>,
        config: &Config,
    ) -> Self {
        Self {
            hub,
            settings,
            client,
            tokens,
            sync: config.sync.clone(),
        }
    }

    // ========================================================================
    // Inbound: CRM -> hub
    // ========================================================================

    /// Fetches records modified since the persisted watermark and saves them
    /// to the hub
    ///
    /// The new watermark is persisted before the first page is requested;
    /// a run that dies halfway forfeits the rest of its window instead of
    /// replaying it, and a record that keeps failing to save can never pin
    /// the watermark in place.
    pub async fn fetch_recent(&self, kind: EntityKind) -> Result<FetchSummary, SyncError> {
        let settings = self.load_settings().await?;
        let run_start = Utc::now();
        let since = settings
            .last_fetch_at(kind)
            .unwrap_or(run_start - Duration::seconds(self.sync.initial_fetch_lookback_secs));
        let window = FetchWindow {
            since,
            until: run_start,
            overlap_secs: self.sync.fetch_overlap_secs,
        };

        self.settings
            .update(SettingsPatch::watermark(kind, run_start))
            .await
            .map_err(|e| SyncError::Settings(e.to_string()))?;
        info!(
            kind = %kind,
            since = %window.since,
            until = %window.until,
            "incoming.job.start"
        );

        let context = self.build_context(kind, settings).await?;
        let fetcher = self.fetcher(&context);
        self.drain(fetcher.fetch_window(window), &context).await
    }

    /// Pages through the full listing and saves every record; used for
    /// backfill, ignores the watermark in both directions
    pub async fn fetch_all(&self, kind: EntityKind) -> Result<FetchSummary, SyncError> {
        let settings = self.load_settings().await?;
        info!(kind = %kind, "incoming.job.start");

        let context = self.build_context(kind, settings).await?;
        let fetcher = self.fetcher(&context);
        self.drain(fetcher.fetch_all(), &context).await
    }

    /// Consumes a page stream, translating and saving each record
    async fn drain(
        &self,
        mut stream: PageStream<'_>,
        context: &RunContext,
    ) -> Result<FetchSummary, SyncError> {
        let kind = context.kind;
        let mapper = InboundMapper::new(kind, &context.inbound);
        let mut state = SyncState::Idle;
        let mut summary = FetchSummary::default();

        loop {
            transition(kind, &mut state, SyncState::Fetching(summary.pages + 1));
            let page = match stream.next_page().await {
                Ok(Some(page)) => page,
                Ok(None) => break,
                Err(e) => {
                    error!(kind = %kind, error = %e, "incoming.job.error");
                    transition(kind, &mut state, SyncState::Idle);
                    return Err(e);
                }
            };
            summary.pages = page.page;
            summary.fetched += page.records.len() as u64;

            transition(kind, &mut state, SyncState::Saving(page.page));
            let fetched_at = Utc::now();
            for record in &page.records {
                let Some(write) = mapper.translate(record, fetched_at) else {
                    warn!(kind = %kind, "incoming.record.skip: record carries no identifier");
                    continue;
                };
                let ident = write
                    .ident
                    .anonymous_id
                    .clone()
                    .unwrap_or_else(|| "unidentified".to_string());
                match self
                    .hub
                    .write_attributes(kind, &write.ident, write.writes)
                    .await
                {
                    Ok(()) => {
                        summary.saved += 1;
                        debug!(kind = %kind, ident = %ident, "incoming.record.success");
                    }
                    Err(e) => {
                        summary.errors += 1;
                        error!(kind = %kind, ident = %ident, error = %e, "incoming.record.error");
                    }
                }
            }
            info!(
                kind = %kind,
                page = page.page,
                fetched = summary.fetched,
                saved = summary.saved,
                "incoming.job.progress"
            );
        }

        transition(kind, &mut state, SyncState::Idle);
        info!(
            kind = %kind,
            pages = summary.pages,
            saved = summary.saved,
            errors = summary.errors,
            "incoming.job.success"
        );
        Ok(summary)
    }

    // ========================================================================
    // Outbound: hub -> CRM
    // ========================================================================

    /// Classifies and sends one batch of hub change notifications
    ///
    /// Returns every envelope with its disposition and, for the ones that
    /// went out, the per-record write outcome. `batch_mode` marks a full
    /// export, which bypasses the segment whitelist.
    pub async fn send_messages(
        &self,
        kind: EntityKind,
        messages: Vec<UpdateMessage>,
        batch_mode: bool,
    ) -> Result<Vec<RecordEnvelope>, SyncError> {
        let settings = self.load_settings().await?;
        let context = self.build_context(kind, settings).await?;
        let mapper = OutboundMapper::new(kind, &context.outbound, &context.segments);
        let filter = FilterEngine::new(kind, context.whitelist(), batch_mode);

        let mut envelopes = Vec::with_capacity(messages.len());
        for message in messages {
            let payload = mapper.payload(&message);
            for warning in &payload.warnings {
                warn!(kind = %kind, %warning, "outgoing.record.warning");
            }
            let mut envelope = RecordEnvelope::new(message, payload.record);
            let disposition = filter.classify(&envelope.message);
            if let Disposition::Skip(reason) = &disposition {
                info!(kind = %kind, reason = %reason, "outgoing.record.skip");
            }
            envelope.disposition = Some(disposition);
            envelopes.push(envelope);
        }

        let writer = BatchWriter::new(
            self.client.clone(),
            self.tokens.clone(),
            kind,
            self.sync.batch_size,
        );
        let envelopes = writer.write(envelopes).await?;

        for envelope in &envelopes {
            match &envelope.outcome {
                Some(WriteOutcome::Accepted) => {
                    debug!(kind = %kind, "outgoing.record.success");
                }
                Some(WriteOutcome::Rejected { message, property }) => {
                    error!(
                        kind = %kind,
                        message = %message,
                        property = property.as_deref().unwrap_or(""),
                        "outgoing.record.error"
                    );
                }
                None => {}
            }
        }
        Ok(envelopes)
    }

    // ========================================================================
    // Schema
    // ========================================================================

    /// Runs the CRM schema reconciliation pass; never fatal
    pub async fn sync_schema(&self, kind: EntityKind) {
        let settings = match self.load_settings().await {
            Ok(settings) => settings,
            Err(e) => {
                error!(kind = %kind, error = %e, "connector.sync.error: settings unavailable");
                return;
            }
        };
        let hub_schema = match self.hub.attribute_schema().await {
            Ok(schema) => schema,
            Err(e) => {
                error!(kind = %kind, error = %e, "connector.sync.error: hub schema unavailable");
                return;
            }
        };
        let segments = match self.hub.segments(kind).await {
            Ok(segments) => segments,
            Err(e) => {
                error!(kind = %kind, error = %e, "connector.sync.error: segments unavailable");
                return;
            }
        };

        let registry = PropertyRegistry::new(self.client.clone(), self.tokens.clone(), kind);
        registry
            .sync(&settings, &hub_schema, &SegmentSet::new(segments))
            .await;
    }

    // ========================================================================
    // Run setup
    // ========================================================================

    async fn load_settings(&self) -> Result<ConnectorSettings, SyncError> {
        self.settings
            .load()
            .await
            .map_err(|e| SyncError::Settings(e.to_string()))
    }

    /// Snapshots both schemas and the segment listing into a [`RunContext`]
    async fn build_context(
        &self,
        kind: EntityKind,
        settings: ConnectorSettings,
    ) -> Result<RunContext, SyncError> {
        let registry = PropertyRegistry::new(self.client.clone(), self.tokens.clone(), kind);
        let catalog = registry.catalog().await?;
        let hub_schema = self
            .hub
            .attribute_schema()
            .await
            .map_err(|e| SyncError::TransientNetwork(format!("hub schema read failed: {e}")))?;
        let segments = self
            .hub
            .segments(kind)
            .await
            .map_err(|e| SyncError::TransientNetwork(format!("segment read failed: {e}")))?;

        Ok(RunContext::assemble(
            kind, settings, catalog, hub_schema, segments,
        ))
    }

    fn fetcher(&self, context: &RunContext) -> IncrementalFetcher {
        IncrementalFetcher::new(
            self.client.clone(),
            self.tokens.clone(),
            context.kind,
            self.sync.page_size,
            context.fetch_properties(),
        )
    }
}
