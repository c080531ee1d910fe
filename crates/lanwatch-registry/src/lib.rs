//! lanwatch-registry: Durable per-MAC device registry.
//!
//! This crate is the single mutation point for device records. Scan
//! results and vendor enrichment both write through it, one writer at a
//! time, and every write ends with an atomic persist of the whole
//! document. Readers only ever see the last successfully persisted state.

pub mod error;
pub mod mutations;
pub mod queries;
pub mod registry;
pub mod store;

pub use error::{RegistryError, Result};
pub use mutations::UpdateOutcome;
pub use queries::{DeviceFilter, RegistryStatistics};
pub use registry::Registry;
pub use store::{RegistryDocument, SCHEMA_VERSION};
