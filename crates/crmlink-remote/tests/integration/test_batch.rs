//! Integration tests for batch writes: acceptance, structured partial
//! failure with selective retry, and unstructured rejections

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, ResponseTemplate};

use crmlink_core::domain::entity::EntityKind;
use crmlink_core::domain::record::{
    Disposition, HubRecord, RecordEnvelope, RemotePropertyValue, RemoteWriteRecord, SkipReason,
    UpdateMessage, WriteOutcome,
};
use crmlink_remote::batch::BatchWriter;

use crate::common;

const BATCH_PATH: &str = "/contacts/v1/contact/batch/";

fn envelope(email: &str, disposition: Disposition) -> RecordEnvelope {
    let record: HubRecord = serde_json::from_value(json!({ "email": email })).unwrap();
    let message = UpdateMessage {
        record,
        changes: Default::default(),
        segments: Vec::new(),
    };
    let payload = RemoteWriteRecord {
        id: None,
        email: Some(email.to_string()),
        properties: vec![RemotePropertyValue {
            property: "email".to_string(),
            value: json!(email),
        }],
    };
    let mut envelope = RecordEnvelope::new(message, payload);
    envelope.disposition = Some(disposition);
    envelope
}

#[tokio::test]
async fn test_accepted_chunk_marks_every_envelope() {
    let (server, client, tokens, _store) = common::setup(common::settings_with_token(21600)).await;

    Mock::given(method("POST"))
        .and(path(BATCH_PATH))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let writer = BatchWriter::new(client, tokens, EntityKind::Contact, 100);
    let envelopes = vec![
        envelope("a@example.com", Disposition::ToInsert),
        envelope("b@example.com", Disposition::ToUpdate),
        envelope("c@example.com", Disposition::Skip(SkipReason::NotWhitelisted)),
    ];

    let written = writer.write(envelopes).await.unwrap();

    assert_eq!(written[0].outcome, Some(WriteOutcome::Accepted));
    assert_eq!(written[1].outcome, Some(WriteOutcome::Accepted));
    // Skips never reach the wire
    assert!(written[2].outcome.is_none());
    server.verify().await;
}

#[tokio::test]
async fn test_partial_failure_retries_the_surviving_subset_once() {
    let (server, client, tokens, _store) = common::setup(common::settings_with_token(21600)).await;

    // First submission rejects index 1; the retry without it is accepted
    Mock::given(method("POST"))
        .and(path(BATCH_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "status": "error",
            "message": "Errors found processing batch update",
            "failureMessages": [{
                "index": 1,
                "propertyValidationResult": {
                    "isValid": false,
                    "message": "bad is not a valid email address",
                    "error": "INVALID_EMAIL",
                    "name": "email"
                }
            }]
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(BATCH_PATH))
        .and(body_partial_json(json!([
            { "email": "a@example.com" },
            { "email": "c@example.com" }
        ])))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let writer = BatchWriter::new(client, tokens, EntityKind::Contact, 100);
    let envelopes = vec![
        envelope("a@example.com", Disposition::ToInsert),
        envelope("bad", Disposition::ToInsert),
        envelope("c@example.com", Disposition::ToUpdate),
    ];

    let written = writer.write(envelopes).await.unwrap();

    assert_eq!(written[0].outcome, Some(WriteOutcome::Accepted));
    match written[1].outcome.as_ref().unwrap() {
        WriteOutcome::Rejected { message, property } => {
            assert_eq!(message, "bad is not a valid email address");
            assert_eq!(property.as_deref(), Some("email"));
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(written[2].outcome, Some(WriteOutcome::Accepted));
    server.verify().await;
}

#[tokio::test]
async fn test_second_structured_failure_annotates_without_third_attempt() {
    let (server, client, tokens, _store) = common::setup(common::settings_with_token(21600)).await;

    // Both submissions reject their first record; exactly two requests total
    Mock::given(method("POST"))
        .and(path(BATCH_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "status": "error",
            "message": "Errors found processing batch update",
            "failureMessages": [{ "index": 0, "error": "INVALID_EMAIL" }]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let writer = BatchWriter::new(client, tokens, EntityKind::Contact, 100);
    let envelopes = vec![
        envelope("bad-one", Disposition::ToInsert),
        envelope("b@example.com", Disposition::ToInsert),
    ];

    let written = writer.write(envelopes).await.unwrap();

    match written[0].outcome.as_ref().unwrap() {
        WriteOutcome::Rejected { message, .. } => assert_eq!(message, "INVALID_EMAIL"),
        other => panic!("expected rejection, got {other:?}"),
    }
    // The survivor was rejected again on the retry and is not retried further
    match written[1].outcome.as_ref().unwrap() {
        WriteOutcome::Rejected { message, .. } => assert_eq!(message, "INVALID_EMAIL"),
        other => panic!("expected rejection, got {other:?}"),
    }
    server.verify().await;
}

#[tokio::test]
async fn test_unstructured_failure_marks_the_whole_chunk() {
    let (server, client, tokens, _store) = common::setup(common::settings_with_token(21600)).await;

    Mock::given(method("POST"))
        .and(path(BATCH_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .expect(1)
        .mount(&server)
        .await;

    let writer = BatchWriter::new(client, tokens, EntityKind::Contact, 100);
    let envelopes = vec![
        envelope("a@example.com", Disposition::ToInsert),
        envelope("b@example.com", Disposition::ToUpdate),
    ];

    let written = writer.write(envelopes).await.unwrap();
    for env in &written {
        match env.outcome.as_ref().unwrap() {
            WriteOutcome::Rejected { message, property } => {
                assert_eq!(message, "unknown response from remote system");
                assert!(property.is_none());
            }
            other => panic!("expected rejection, got {other:?}"),
        }
    }
    server.verify().await;
}

#[tokio::test]
async fn test_chunking_splits_large_batches() {
    let (server, client, tokens, _store) = common::setup(common::settings_with_token(21600)).await;

    Mock::given(method("POST"))
        .and(path(BATCH_PATH))
        .respond_with(ResponseTemplate::new(202))
        .expect(3)
        .mount(&server)
        .await;

    let writer = BatchWriter::new(client, Arc::clone(&tokens), EntityKind::Contact, 2);
    let envelopes: Vec<_> = (0..5)
        .map(|i| envelope(&format!("user{i}@example.com"), Disposition::ToInsert))
        .collect();

    let written = writer.write(envelopes).await.unwrap();
    assert!(written
        .iter()
        .all(|e| e.outcome == Some(WriteOutcome::Accepted)));
    server.verify().await;
}
