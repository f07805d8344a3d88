use crate::Result;
use crate::record::Record;
use crate::store::DeclaredUpdate;
use crate::store::DocumentStore;
use crate::store::RecordFilter;
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::PoisonError;

/// `DocumentStore` over a vector kept sorted by identifier.
#[derive(Debug)]
pub struct InMemoryDocumentStore {
    database: String,
    collection: String,
    records: Mutex<Vec<Record>>,
}

impl InMemoryDocumentStore {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
            records: Mutex::new(Vec::new()),
        }
    }

    pub fn with_records(mut self, records: impl IntoIterator<Item = Record>) -> Self {
        let inner = self
            .records
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        inner.extend(records);
        inner.sort_by(|a, b| a.id.cmp(&b.id));
        self
    }

    pub fn get(&self, id: &str) -> Option<Record> {
        self.lock().iter().find(|record| record.id == id).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Record>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn count(&self, filter: &RecordFilter) -> Result<u64> {
        Ok(self.lock().iter().filter(|r| filter.matches(r)).count() as u64)
    }

    async fn find_page(&self, filter: &RecordFilter, skip: u64, limit: u64) -> Result<Vec<Record>> {
        Ok(self
            .lock()
            .iter()
            .filter(|r| filter.matches(r))
            .skip(skip as usize)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn database_names(&self) -> Result<Vec<String>> {
        Ok(vec![self.database.clone()])
    }

    async fn collection_names(&self) -> Result<Vec<String>> {
        Ok(vec![self.collection.clone()])
    }

    async fn set_declared(&self, updates: &[DeclaredUpdate]) -> Result<u64> {
        let mut records = self.lock();
        let mut modified = 0;
        for update in updates {
            if let Some(record) = records.iter_mut().find(|r| r.id == update.id)
                && (!record.declared_present || record.declared != update.declared)
            {
                record.declared = update.declared.clone();
                record.declared_present = true;
                modified += 1;
            }
        }
        Ok(modified)
    }
}
