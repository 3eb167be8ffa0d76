//! Domain entities and value types
//!
//! Pure data types shared by the mapping engine, the CRM adapter, and the
//! sync orchestrator. Nothing in this module performs I/O.

pub mod entity;
pub mod errors;
pub mod mapping;
pub mod record;
pub mod remote;
pub mod segments;
pub mod settings;
pub mod token;
pub mod window;
