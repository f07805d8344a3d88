use crate::Result;
use crate::range::UpdatedWindow;
use crate::record::Record;
use async_trait::async_trait;
use serde_json::Value;

/// Structured predicate the document store evaluates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordFilter {
    pub window: UpdatedWindow,
    /// Narrow to records without a `licensed.declared` field. A field holding
    /// null is present and does not match.
    pub missing_declared_only: bool,
}

impl RecordFilter {
    pub fn matches(&self, record: &Record) -> bool {
        let in_window = record
            .updated
            .as_deref()
            .is_some_and(|updated| self.window.contains(updated));
        in_window && (!self.missing_declared_only || !record.declared_present)
    }
}

/// Sets `licensed.declared` on the record with the given identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct DeclaredUpdate {
    pub id: String,
    pub declared: Option<Value>,
}

/// The document database holding the derived definitions.
///
/// Page reads must use a deterministic order so a `skip` offset taken from a
/// previous run resumes at the same record.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn count(&self, filter: &RecordFilter) -> Result<u64>;

    async fn find_page(&self, filter: &RecordFilter, skip: u64, limit: u64) -> Result<Vec<Record>>;

    async fn database_names(&self) -> Result<Vec<String>>;

    async fn collection_names(&self) -> Result<Vec<String>>;

    /// Applies every update, matched by identifier. Returns how many records
    /// were modified.
    async fn set_declared(&self, updates: &[DeclaredUpdate]) -> Result<u64>;
}
