//! `DocumentStore` backed by a MongoDB collection of definitions.

use async_trait::async_trait;
use defsync_core::DeclaredUpdate;
use defsync_core::DefsyncErr;
use defsync_core::DocumentStore;
use defsync_core::Record;
use defsync_core::RecordFilter;
use defsync_core::Result;
use futures::TryStreamExt;
use mongodb::Client;
use mongodb::Collection;
use mongodb::bson::Bson;
use mongodb::bson::Document;
use mongodb::bson::doc;
use std::time::Duration;

#[derive(Clone)]
pub struct MongoDocumentStore {
    client: Client,
    database: String,
    collection: Collection<Document>,
    timeout: Duration,
}

impl MongoDocumentStore {
    /// Connects lazily; the first query surfaces an unreachable server.
    pub async fn connect(
        uri: &str,
        database: &str,
        collection: &str,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::with_uri_str(uri).await.map_err(DefsyncErr::store)?;
        let collection = client.database(database).collection::<Document>(collection);
        Ok(Self {
            client,
            database: database.to_string(),
            collection,
            timeout,
        })
    }
}

/// Translates a record filter into the equivalent query document.
pub fn filter_document(filter: &RecordFilter) -> Document {
    let mut query = doc! {
        "_meta.updated": {
            "$gte": filter.window.lower_bound(),
            "$lt": filter.window.upper_bound(),
        },
    };
    if filter.missing_declared_only {
        query.insert("licensed.declared", doc! { "$exists": false });
    }
    query
}

fn declared_bson(update: &DeclaredUpdate) -> Result<Bson> {
    match &update.declared {
        Some(value) => mongodb::bson::to_bson(value).map_err(DefsyncErr::store),
        None => Ok(Bson::Null),
    }
}

#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn count(&self, filter: &RecordFilter) -> Result<u64> {
        self.collection
            .count_documents(filter_document(filter))
            .max_time(self.timeout)
            .await
            .map_err(DefsyncErr::store)
    }

    async fn find_page(&self, filter: &RecordFilter, skip: u64, limit: u64) -> Result<Vec<Record>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let cursor = self
            .collection
            .find(filter_document(filter))
            .sort(doc! { "_id": 1 })
            .skip(skip)
            .limit(limit)
            .max_time(self.timeout)
            .await
            .map_err(DefsyncErr::store)?;
        let documents: Vec<Document> = cursor.try_collect().await.map_err(DefsyncErr::store)?;

        let mut records = Vec::with_capacity(documents.len());
        for document in documents {
            let id = document.get("_id").map(ToString::to_string);
            match Record::from_json(Bson::Document(document).into_relaxed_extjson()) {
                Ok(record) => records.push(record),
                Err(err) => tracing::warn!(id = ?id, "skipping record: {err}"),
            }
        }
        Ok(records)
    }

    async fn database_names(&self) -> Result<Vec<String>> {
        self.client
            .list_database_names()
            .await
            .map_err(DefsyncErr::store)
    }

    async fn collection_names(&self) -> Result<Vec<String>> {
        self.client
            .database(&self.database)
            .list_collection_names()
            .await
            .map_err(DefsyncErr::store)
    }

    async fn set_declared(&self, updates: &[DeclaredUpdate]) -> Result<u64> {
        let mut modified = 0;
        for update in updates {
            let declared = match declared_bson(update) {
                Ok(declared) => declared,
                Err(err) => {
                    tracing::warn!(id = %update.id, "skipping unconvertible declared value: {err}");
                    continue;
                }
            };
            let result = self
                .collection
                .update_one(
                    doc! { "_id": update.id.as_str() },
                    doc! { "$set": { "licensed.declared": declared } },
                )
                .await;
            match result {
                Ok(result) => modified += result.modified_count,
                Err(err) => tracing::warn!(id = %update.id, "failed to update record: {err}"),
            }
        }
        Ok(modified)
    }
}
