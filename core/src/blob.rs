use crate::coordinates::Coordinates;
use crate::record::CanonicalBlob;
use async_trait::async_trait;
use defsync_client::HttpTransport;
use defsync_client::Request;
use defsync_client::RetryPolicy;
use defsync_client::TransportError;
use defsync_client::run_with_retry;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Source of truth for definitions.
///
/// Fetching never fails: anything other than a readable JSON document is
/// reported as [`CanonicalBlob::empty`].
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn fetch(&self, coordinates: &Coordinates) -> CanonicalBlob;
}

/// Reads `{base_url}/{container}/{blob_path}` over HTTP.
#[derive(Clone)]
pub struct HttpBlobStore {
    transport: Arc<dyn HttpTransport>,
    base_url: String,
    container: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl HttpBlobStore {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        base_url: &str,
        container: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            base_url: base_url.trim_end_matches('/').to_string(),
            container: container.trim_matches('/').to_string(),
            timeout,
            retry,
        }
    }

    pub fn blob_url(&self, coordinates: &Coordinates) -> String {
        format!(
            "{}/{}/{}",
            self.base_url,
            self.container,
            coordinates.blob_path()
        )
    }
}

#[async_trait]
impl BlobStore for HttpBlobStore {
    async fn fetch(&self, coordinates: &Coordinates) -> CanonicalBlob {
        let url = self.blob_url(coordinates);
        let req = Request::get(url.clone()).with_timeout(self.timeout);
        let resp = match run_with_retry(&self.retry, self.transport.as_ref(), req).await {
            Ok(resp) => resp,
            Err(TransportError::Http { status, .. }) => {
                tracing::debug!(%url, %status, "blob not available");
                return CanonicalBlob::empty();
            }
            Err(err) => {
                tracing::warn!(%url, "failed to fetch blob: {err}");
                return CanonicalBlob::empty();
            }
        };
        match resp.json::<Value>() {
            Ok(value) => CanonicalBlob::from_json(&value),
            Err(err) => {
                tracing::warn!(%url, "blob is not valid JSON: {err}");
                CanonicalBlob::empty()
            }
        }
    }
}
