//! CRM REST adapter
//!
//! Everything that talks HTTP to the CRM lives here:
//!
//! - [`client::RemoteClient`] - typed endpoint plumbing over `reqwest`
//! - [`token::TokenManager`] - access-token lifecycle and the
//!   unauthorized-refresh-retry wrapper every call goes through
//! - [`fetch::IncrementalFetcher`] - paged record listings with
//!   time-window filtering and the cursor wrap-around guard
//! - [`batch::BatchWriter`] - chunked batch upserts with selective retry on
//!   structured partial failures
//! - [`registry::PropertyRegistry`] - best-effort remote schema
//!   reconciliation (property group, custom properties, segment options)
//!
//! Domain types come from `crmlink-core`; nothing in this crate decides sync
//! policy beyond the retry bounds the CRM's behavior forces.

pub mod batch;
pub mod client;
pub mod fetch;
pub mod registry;
pub mod token;
