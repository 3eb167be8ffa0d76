//! Bidirectional property mapping and outbound filtering
//!
//! Pure, synchronous translation between the hub's attribute model and the
//! CRM's property model:
//!
//! - [`builder::MappingBuilder`] resolves the default table and the
//!   user-configured rows against live schema snapshots into per-direction
//!   [`PropertyMapping`](crmlink_core::domain::mapping::PropertyMapping) lists
//! - [`outbound`] derives CRM write payloads from hub records (type
//!   coercion, overwrite policy, segment-name injection)
//! - [`inbound`] derives hub attribute writes from CRM records
//! - [`filter::FilterEngine`] classifies outbound envelopes into
//!   insert/update/skip
//!
//! Nothing here performs I/O; schema snapshots are taken once per sync run
//! by the orchestrator and passed in by reference.

pub mod builder;
pub mod defaults;
pub mod filter;
pub mod inbound;
pub mod outbound;
