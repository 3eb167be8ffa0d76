//! Chunked batch writes
//!
//! Sends outbound envelopes to the CRM's batch upsert endpoint in chunks of
//! at most the configured batch size. The CRM accepts a chunk with `202`
//! (processing is asynchronous; acceptance is all this confirms) or rejects
//! it with a structured body mapping failures to chunk indices. On a
//! structured rejection the failing envelopes are annotated and the
//! surviving subset is resent exactly once; one retry resolves the common
//! "whole batch bounced on one bad record" case without a retry storm.
//!
//! Envelopes classified as skips pass through untouched.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use tracing::{debug, warn};

use crmlink_core::domain::entity::EntityKind;
use crmlink_core::domain::errors::SyncError;
use crmlink_core::domain::record::{Disposition, RecordEnvelope, WriteOutcome};

use crate::client::RemoteClient;
use crate::token::TokenManager;

/// Validation messages are truncated to this many characters before logging
const MESSAGE_LIMIT: usize = 100;

/// Outcome message for chunks rejected without a parseable failure list
const UNKNOWN_RESPONSE: &str = "unknown response from remote system";

// ============================================================================
// Wire types
// ============================================================================

/// Structured batch rejection body
#[derive(Debug, Deserialize)]
struct BatchErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "failureMessages")]
    failure_messages: Vec<FailureMessage>,
}

/// One per-record failure, addressed by index within the submitted chunk
#[derive(Debug, Deserialize)]
struct FailureMessage {
    index: usize,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, rename = "propertyValidationResult")]
    property_validation_result: Option<PropertyValidationResult>,
}

/// Validation detail pointing at one property
#[derive(Debug, Deserialize)]
struct PropertyValidationResult {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

impl FailureMessage {
    /// The most specific message available for this failure
    fn best_message<'m>(&'m self, batch_message: &'m Option<String>) -> &'m str {
        self.property_validation_result
            .as_ref()
            .and_then(|r| r.message.as_deref().or(r.error.as_deref()))
            .or(self.message.as_deref())
            .or(self.error.as_deref())
            .or(batch_message.as_deref())
            .unwrap_or(UNKNOWN_RESPONSE)
    }

    fn property(&self) -> Option<String> {
        self.property_validation_result
            .as_ref()
            .and_then(|r| r.name.clone())
    }
}

// ============================================================================
// BatchWriter
// ============================================================================

/// Writes outbound envelopes to the CRM in bounded chunks
pub struct BatchWriter {
    client: Arc<RemoteClient>,
    tokens: Arc<TokenManager>,
    kind: EntityKind,
    chunk_size: usize,
}

impl BatchWriter {
    pub fn new(
        client: Arc<RemoteClient>,
        tokens: Arc<TokenManager>,
        kind: EntityKind,
        chunk_size: usize,
    ) -> Self {
        Self {
            client,
            tokens,
            kind,
            chunk_size: chunk_size.max(1),
        }
    }

    /// Sends every insert/update envelope and fills in its outcome
    pub async fn write(
        &self,
        mut envelopes: Vec<RecordEnvelope>,
    ) -> Result<Vec<RecordEnvelope>, SyncError> {
        let sendable: Vec<usize> = envelopes
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                matches!(
                    e.disposition,
                    Some(Disposition::ToInsert) | Some(Disposition::ToUpdate)
                )
            })
            .map(|(i, _)| i)
            .collect();

        let chunks: Vec<Vec<usize>> = sendable
            .chunks(self.chunk_size)
            .map(|c| c.to_vec())
            .collect();
        for chunk in chunks {
            self.send_chunk(&mut envelopes, &chunk, true).await?;
        }
        Ok(envelopes)
    }

    /// Sends one chunk; on a structured partial failure annotates the failed
    /// envelopes and retries the survivors once
    async fn send_chunk(
        &self,
        envelopes: &mut Vec<RecordEnvelope>,
        indices: &[usize],
        allow_retry: bool,
    ) -> Result<(), SyncError> {
        if indices.is_empty() {
            return Ok(());
        }
        let records: Vec<_> = indices.iter().map(|&i| envelopes[i].payload.clone()).collect();

        let response = self
            .tokens
            .with_auth_retry(|token| {
                let records = records.clone();
                let client = self.client.clone();
                let kind = self.kind;
                async move { client.batch_upsert(&token, kind, &records).await }
            })
            .await?;

        let status = response.status();
        if status.is_success() {
            debug!(kind = %self.kind, records = indices.len(), "batch chunk accepted");
            for &i in indices {
                envelopes[i].outcome = Some(WriteOutcome::Accepted);
            }
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        let parsed = serde_json::from_str::<BatchErrorBody>(&body).ok();
        let Some(error) = parsed.filter(|e| !e.failure_messages.is_empty()) else {
            warn!(kind = %self.kind, %status, "batch chunk rejected without failure detail");
            for &i in indices {
                envelopes[i].outcome = Some(WriteOutcome::Rejected {
                    message: UNKNOWN_RESPONSE.to_string(),
                    property: None,
                });
            }
            return Ok(());
        };

        let mut failed_positions = HashSet::new();
        for failure in &error.failure_messages {
            let Some(&envelope_index) = indices.get(failure.index) else {
                continue;
            };
            failed_positions.insert(failure.index);
            envelopes[envelope_index].outcome = Some(WriteOutcome::Rejected {
                message: truncate(failure.best_message(&error.message)),
                property: failure.property(),
            });
        }
        warn!(
            kind = %self.kind,
            failed = failed_positions.len(),
            submitted = indices.len(),
            "batch chunk partially rejected"
        );

        let survivors: Vec<usize> = indices
            .iter()
            .enumerate()
            .filter(|(position, _)| !failed_positions.contains(position))
            .map(|(_, &i)| i)
            .collect();
        if survivors.is_empty() {
            return Ok(());
        }

        if allow_retry {
            Box::pin(self.send_chunk(envelopes, &survivors, false)).await
        } else {
            // Second rejection, no further retry
            let message = truncate(error.message.as_deref().unwrap_or(UNKNOWN_RESPONSE));
            for &i in survivors.iter() {
                envelopes[i].outcome = Some(WriteOutcome::Rejected {
                    message: message.clone(),
                    property: None,
                });
            }
            Ok(())
        }
    }
}

fn truncate(message: &str) -> String {
    message.chars().take(MESSAGE_LIMIT).collect()
}
