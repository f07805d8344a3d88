use async_trait::async_trait;
use defsync_client::HttpTransport;
use defsync_client::Request;
use defsync_client::RetryPolicy;
use defsync_client::TransportError;
use defsync_client::run_with_retry;
use std::sync::Arc;
use std::time::Duration;

/// Upstream service that regenerates definitions on demand.
#[async_trait]
pub trait RecomputeService: Send + Sync {
    /// Forces recomputation of every coordinate in one request.
    async fn recompute_batch(&self, coordinates: &[String]) -> Result<(), TransportError>;

    /// Forces recomputation of a single coordinate.
    async fn recompute_one(&self, coordinate: &str) -> Result<(), TransportError>;
}

#[derive(Clone)]
pub struct HttpRecomputeService {
    transport: Arc<dyn HttpTransport>,
    service_url: String,
    timeout: Duration,
    retry: RetryPolicy,
}

impl HttpRecomputeService {
    pub fn new(
        transport: Arc<dyn HttpTransport>,
        service_url: &str,
        timeout: Duration,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            transport,
            service_url: service_url.trim_end_matches('/').to_string(),
            timeout,
            retry,
        }
    }

    pub fn batch_url(&self) -> String {
        format!("{}/definitions?force=true", self.service_url)
    }

    pub fn single_url(&self, coordinate: &str) -> String {
        format!("{}/definitions/{coordinate}?force=true", self.service_url)
    }
}

#[async_trait]
impl RecomputeService for HttpRecomputeService {
    async fn recompute_batch(&self, coordinates: &[String]) -> Result<(), TransportError> {
        let req = Request::post(self.batch_url())
            .with_text(coordinates.join("\n"))
            .with_timeout(self.timeout);
        run_with_retry(&self.retry, self.transport.as_ref(), req).await?;
        Ok(())
    }

    async fn recompute_one(&self, coordinate: &str) -> Result<(), TransportError> {
        let req = Request::get(self.single_url(coordinate)).with_timeout(self.timeout);
        run_with_retry(&self.retry, self.transport.as_ref(), req).await?;
        Ok(())
    }
}
