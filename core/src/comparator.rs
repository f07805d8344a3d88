use crate::blob::BlobStore;
use crate::record::CanonicalBlob;
use crate::record::Record;
use serde_json::Value;

/// Outcome of comparing one record with its blob.
#[derive(Debug, Clone, PartialEq)]
pub struct Comparison {
    pub is_drift: bool,
    pub db_value: Option<Value>,
    pub blob_value: Option<Value>,
    pub blob_meta: Value,
}

/// Exact equality on the declared value. Absence is its own value, distinct
/// from every concrete value including the empty string.
pub fn classify(record: &Record, blob: CanonicalBlob) -> Comparison {
    Comparison {
        is_drift: record.declared != blob.declared,
        db_value: record.declared.clone(),
        blob_value: blob.declared,
        blob_meta: blob.meta,
    }
}

pub struct Comparator<'a> {
    blobs: &'a dyn BlobStore,
}

impl<'a> Comparator<'a> {
    pub fn new(blobs: &'a dyn BlobStore) -> Self {
        Self { blobs }
    }

    pub async fn compare(&self, record: &Record) -> Comparison {
        let blob = self.blobs.fetch(&record.coordinates).await;
        let comparison = classify(record, blob);
        if comparison.is_drift {
            tracing::debug!(
                id = %record.id,
                db = ?comparison.db_value,
                blob = ?comparison.blob_value,
                "declared value drifted"
            );
        }
        comparison
    }
}
