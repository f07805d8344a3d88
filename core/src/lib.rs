//! Root of the `defsync-core` library.
//!
//! Audits the `licensed.declared` field of definitions held in a document
//! database against the canonical blobs they were derived from, extrapolates
//! drift over each time range, and optionally repairs drifted records.

// Operator output goes through tracing; only the binary prints.
#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod blob;
pub mod comparator;
pub mod config;
pub mod coordinates;
mod error;
pub mod memory;
pub mod orchestrator;
pub mod pager;
pub mod range;
pub mod recompute;
pub mod record;
pub mod repair;
pub mod results;
pub mod stats;
pub mod store;

pub use blob::BlobStore;
pub use blob::HttpBlobStore;
pub use config::Config;
pub use config::RawSettings;
pub use coordinates::Coordinates;
pub use error::DefsyncErr;
pub use error::Result;
pub use memory::InMemoryDocumentStore;
pub use orchestrator::DryRunRow;
pub use orchestrator::Orchestrator;
pub use orchestrator::RunReport;
pub use orchestrator::RunState;
pub use orchestrator::dry_run;
pub use recompute::HttpRecomputeService;
pub use recompute::RecomputeService;
pub use record::CanonicalBlob;
pub use record::Record;
pub use repair::RepairMode;
pub use store::DeclaredUpdate;
pub use store::DocumentStore;
pub use store::RecordFilter;
