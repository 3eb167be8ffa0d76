//! Integration tests for crmlink-sync
//!
//! Drives the engine against a wiremock CRM and in-memory hub platform /
//! settings store doubles, verifying the inbound fetch-and-save flow, the
//! outbound batch flow, and watermark handling.

mod common;

mod test_engine;
