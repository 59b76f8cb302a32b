//! Shared Schemas
//!
//! Service configuration records and the normalized output types.
//! Output structs use `serde(rename_all = "camelCase")` for JSON compatibility.

pub mod aggregated;
pub mod service_definition;

pub use aggregated::*;
pub use service_definition::*;
