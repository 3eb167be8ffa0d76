//! End-to-end engine tests over a mock CRM

use chrono::{Duration, Utc};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crmlink_core::domain::entity::EntityKind;
use crmlink_core::domain::errors::SyncError;
use crmlink_core::domain::record::{
    AttributeChange, ChangeSet, Disposition, HubRecord, SkipReason, UpdateMessage, WriteOutcome,
    FETCHED_AT_ATTRIBUTE,
};
use crmlink_core::domain::segments::Segment;

use crate::common;

const GROUPS_PATH: &str = "/properties/v1/contacts/groups";
const RECENT_PATH: &str = "/contacts/v1/lists/recently_updated/contacts/recent";
const ALL_PATH: &str = "/contacts/v1/lists/all/contacts/all";
const BATCH_PATH: &str = "/contacts/v1/contact/batch/";

async fn mount_groups(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(GROUPS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(common::contact_groups()))
        .mount(server)
        .await;
}

fn message(attrs: serde_json::Value, segments: Vec<Segment>) -> UpdateMessage {
    UpdateMessage {
        record: serde_json::from_value::<HubRecord>(attrs).unwrap(),
        changes: ChangeSet::default(),
        segments,
    }
}

// ============================================================================
// Inbound
// ============================================================================

#[tokio::test]
async fn test_fetch_recent_saves_records_to_the_hub() {
    let hub = common::MemoryHub::new(Vec::new(), Vec::new());
    let (server, engine, hub, store) = common::setup(common::configured_settings(), hub).await;
    mount_groups(&server).await;

    let modified = (Utc::now() - Duration::minutes(5)).timestamp_millis();
    Mock::given(method("GET"))
        .and(path(RECENT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "contacts": [common::contact(3714, "ada@example.com", modified)],
            "has-more": false,
            "vid-offset": 3714
        })))
        .expect(1)
        .mount(&server)
        .await;

    let run_start = Utc::now();
    let summary = engine.fetch_recent(EntityKind::Contact).await.unwrap();

    assert_eq!(summary.pages, 1);
    assert_eq!(summary.saved, 1);
    assert_eq!(summary.errors, 0);

    let writes = hub.writes().await;
    assert_eq!(writes.len(), 1);
    let write = &writes[0];
    assert_eq!(write.kind, EntityKind::Contact);
    assert_eq!(write.ident.email.as_deref(), Some("ada@example.com"));
    assert_eq!(write.ident.anonymous_id.as_deref(), Some("crm:3714"));
    assert!(write.writes.iter().any(|w| w.name == "crm/id"));
    assert!(write.writes.iter().any(|w| w.name == "crm/fetched_at"));
    assert!(write
        .writes
        .iter()
        .any(|w| w.name == "email" && w.value == json!("ada@example.com")));
    assert!(write
        .writes
        .iter()
        .any(|w| w.name == "crm/first_name" && w.value == json!("Ada")));
    // Top-level person names only fill gaps
    assert!(write
        .writes
        .iter()
        .any(|w| w.name == "first_name" && w.set_if_null));

    // Watermark advanced to the run start
    let settings = store.snapshot().await;
    assert!(settings.last_fetch_at.unwrap() >= run_start - Duration::seconds(1));
}

#[tokio::test]
async fn test_watermark_is_persisted_before_the_first_page() {
    let hub = common::MemoryHub::new(Vec::new(), Vec::new());
    let (server, engine, _hub, store) = common::setup(common::configured_settings(), hub).await;
    mount_groups(&server).await;

    Mock::given(method("GET"))
        .and(path(RECENT_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("listing down"))
        .mount(&server)
        .await;

    let err = engine.fetch_recent(EntityKind::Contact).await.unwrap_err();
    assert!(matches!(err, SyncError::UnexpectedResponse(_)));

    // The run died on page 1 but the watermark had already moved
    let settings = store.snapshot().await;
    assert!(settings.last_fetch_at.is_some());
}

#[tokio::test]
async fn test_fetch_recent_resumes_from_the_stored_watermark() {
    let mut settings = common::configured_settings();
    let watermark = Utc::now() - Duration::minutes(30);
    settings.last_fetch_at = Some(watermark);

    let hub = common::MemoryHub::new(Vec::new(), Vec::new());
    let (server, engine, hub, _store) = common::setup(settings, hub).await;
    mount_groups(&server).await;

    // One record inside the window, one modified before the watermark
    let fresh = (Utc::now() - Duration::minutes(5)).timestamp_millis();
    let stale = (Utc::now() - Duration::hours(2)).timestamp_millis();
    Mock::given(method("GET"))
        .and(path(RECENT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "contacts": [
                common::contact(1, "fresh@example.com", fresh),
                common::contact(2, "stale@example.com", stale)
            ],
            "has-more": false,
            "vid-offset": 2
        })))
        .mount(&server)
        .await;

    let summary = engine.fetch_recent(EntityKind::Contact).await.unwrap();
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.saved, 1);

    let writes = hub.writes().await;
    assert_eq!(writes.len(), 1);
    assert_eq!(writes[0].ident.email.as_deref(), Some("fresh@example.com"));
}

#[tokio::test]
async fn test_fetch_all_takes_the_unfiltered_listing() {
    let hub = common::MemoryHub::new(Vec::new(), Vec::new());
    let (server, engine, hub, _store) = common::setup(common::configured_settings(), hub).await;
    mount_groups(&server).await;

    let ancient = (Utc::now() - Duration::days(900)).timestamp_millis();
    Mock::given(method("GET"))
        .and(path(ALL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "contacts": [common::contact(1, "old@example.com", ancient)],
            "has-more": false,
            "vid-offset": 1
        })))
        .expect(1)
        .mount(&server)
        .await;

    let summary = engine.fetch_all(EntityKind::Contact).await.unwrap();
    assert_eq!(summary.saved, 1);
    assert_eq!(hub.writes().await.len(), 1);
    server.verify().await;
}

#[tokio::test]
async fn test_failed_hub_writes_are_counted_not_fatal() {
    let (server, engine, _hub, _store) =
        common::setup(common::configured_settings(), common::MemoryHub::failing()).await;
    mount_groups(&server).await;

    let modified = (Utc::now() - Duration::minutes(5)).timestamp_millis();
    Mock::given(method("GET"))
        .and(path(RECENT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "contacts": [common::contact(1, "a@example.com", modified)],
            "has-more": false,
            "vid-offset": 1
        })))
        .mount(&server)
        .await;

    let summary = engine.fetch_recent(EntityKind::Contact).await.unwrap();
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.saved, 0);
    assert_eq!(summary.errors, 1);
}

#[tokio::test]
async fn test_sequential_pages_are_saved_in_order() {
    let hub = common::MemoryHub::new(Vec::new(), Vec::new());
    let (server, engine, hub, _store) = common::setup(common::configured_settings(), hub).await;
    mount_groups(&server).await;

    let modified = (Utc::now() - Duration::minutes(5)).timestamp_millis();
    Mock::given(method("GET"))
        .and(path(RECENT_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "contacts": [common::contact(1, "one@example.com", modified)],
            "has-more": true,
            "vid-offset": 100
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(RECENT_PATH))
        .and(query_param("vidOffset", "100"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "contacts": [common::contact(2, "two@example.com", modified)],
            "has-more": false,
            "vid-offset": 200
        })))
        .mount(&server)
        .await;

    let summary = engine.fetch_recent(EntityKind::Contact).await.unwrap();
    assert_eq!(summary.pages, 2);
    assert_eq!(summary.saved, 2);

    let writes = hub.writes().await;
    assert_eq!(writes[0].ident.email.as_deref(), Some("one@example.com"));
    assert_eq!(writes[1].ident.email.as_deref(), Some("two@example.com"));
}

// ============================================================================
// Outbound
// ============================================================================

#[tokio::test]
async fn test_send_messages_classifies_and_batches() {
    let mut settings = common::configured_settings();
    settings.synchronized_segments = vec!["s1".to_string()];

    let hub = common::MemoryHub::new(Vec::new(), vec![common::segment("s1", "VIP")]);
    let (server, engine, _hub, _store) = common::setup(settings, hub).await;
    mount_groups(&server).await;

    // Exactly one record reaches the wire
    Mock::given(method("POST"))
        .and(path(BATCH_PATH))
        .and(body_partial_json(json!([{ "email": "in@example.com" }])))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let whitelisted = message(
        json!({ "email": "in@example.com" }),
        vec![common::segment("s1", "VIP")],
    );
    let outsider = message(json!({ "email": "out@example.com" }), Vec::new());
    let mut echo = message(
        json!({ "email": "echo@example.com" }),
        vec![common::segment("s1", "VIP")],
    );
    echo.changes.attributes.insert(
        FETCHED_AT_ATTRIBUTE.to_string(),
        AttributeChange {
            previous: serde_json::Value::Null,
            current: json!("2024-03-01T00:00:00Z"),
        },
    );

    let envelopes = engine
        .send_messages(EntityKind::Contact, vec![whitelisted, outsider, echo], false)
        .await
        .unwrap();

    assert_eq!(envelopes[0].disposition, Some(Disposition::ToInsert));
    assert_eq!(envelopes[0].outcome, Some(WriteOutcome::Accepted));
    assert_eq!(
        envelopes[1].disposition,
        Some(Disposition::Skip(SkipReason::NotWhitelisted))
    );
    assert!(envelopes[1].outcome.is_none());
    assert_eq!(
        envelopes[2].disposition,
        Some(Disposition::Skip(SkipReason::SelfTriggered))
    );
    server.verify().await;
}

#[tokio::test]
async fn test_send_messages_injects_the_segment_property() {
    let mut settings = common::configured_settings();
    settings.synchronized_segments = vec!["s1".to_string()];

    let hub = common::MemoryHub::new(Vec::new(), vec![common::segment("s1", "VIP")]);
    let (server, engine, _hub, _store) = common::setup(settings, hub).await;
    mount_groups(&server).await;

    Mock::given(method("POST"))
        .and(path(BATCH_PATH))
        .respond_with(ResponseTemplate::new(202))
        .mount(&server)
        .await;

    let envelopes = engine
        .send_messages(
            EntityKind::Contact,
            vec![message(
                json!({ "email": "in@example.com" }),
                vec![common::segment("s1", "VIP")],
            )],
            false,
        )
        .await
        .unwrap();

    let payload = &envelopes[0].payload;
    let membership = payload
        .properties
        .iter()
        .find(|p| p.property == "hub_segments")
        .unwrap();
    assert_eq!(membership.value, json!("VIP"));
}

#[tokio::test]
async fn test_batch_mode_bypasses_the_whitelist() {
    // No synchronized segments configured at all
    let hub = common::MemoryHub::new(Vec::new(), Vec::new());
    let (server, engine, _hub, _store) = common::setup(common::configured_settings(), hub).await;
    mount_groups(&server).await;

    Mock::given(method("POST"))
        .and(path(BATCH_PATH))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&server)
        .await;

    let envelopes = engine
        .send_messages(
            EntityKind::Contact,
            vec![message(json!({ "email": "in@example.com" }), Vec::new())],
            true,
        )
        .await
        .unwrap();

    assert_eq!(envelopes[0].disposition, Some(Disposition::ToInsert));
    assert_eq!(envelopes[0].outcome, Some(WriteOutcome::Accepted));
    server.verify().await;
}

// ============================================================================
// Schema
// ============================================================================

#[tokio::test]
async fn test_sync_schema_is_never_fatal() {
    let hub = common::MemoryHub::new(Vec::new(), Vec::new());
    let (server, engine, _hub, _store) = common::setup(common::configured_settings(), hub).await;

    Mock::given(method("GET"))
        .and(path(GROUPS_PATH))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    engine.sync_schema(EntityKind::Contact).await;
    server.verify().await;
}
