use crate::error::TransportError;
use crate::request::Request;
use crate::request::Response;
use crate::transport::HttpTransport;
use rand::Rng;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryOn {
    pub retry_429: bool,
    pub retry_5xx: bool,
    pub retry_transport: bool,
}

/// Bounded retry for a single request. `max_attempts` counts the first try,
/// so `1` disables retries entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u64,
    pub base_delay: Duration,
    pub retry_on: RetryOn,
}

impl RetryPolicy {
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::from_millis(200),
            retry_on: RetryOn {
                retry_429: false,
                retry_5xx: false,
                retry_transport: false,
            },
        }
    }

    /// Retries throttling, server errors and transport failures, never 4xx.
    pub fn transient(max_attempts: u64, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            retry_on: RetryOn {
                retry_429: true,
                retry_5xx: true,
                retry_transport: true,
            },
        }
    }

    fn should_retry(&self, err: &TransportError, attempt: u64) -> bool {
        if attempt >= self.max_attempts {
            return false;
        }
        match err {
            TransportError::Http { status, .. } => {
                (self.retry_on.retry_429 && status.as_u16() == 429)
                    || (self.retry_on.retry_5xx && status.is_server_error())
            }
            TransportError::Timeout | TransportError::Network(_) => self.retry_on.retry_transport,
            TransportError::Build(_) => false,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::no_retry()
    }
}

/// Exponential backoff with +/-10% jitter. `attempt` is 1-based.
pub fn backoff(base: Duration, attempt: u64) -> Duration {
    let exp = 2_f64.powi(attempt.saturating_sub(1) as i32);
    let millis = base.as_millis() as f64 * exp;
    let jitter = rand::rng().random_range(0.9..1.1);
    Duration::from_millis((millis * jitter) as u64)
}

pub async fn run_with_retry(
    policy: &RetryPolicy,
    transport: &dyn HttpTransport,
    req: Request,
) -> Result<Response, TransportError> {
    let mut attempt = 1;
    loop {
        match transport.execute(req.clone()).await {
            Ok(resp) => return Ok(resp),
            Err(err) if policy.should_retry(&err, attempt) => {
                let delay = backoff(policy.base_delay, attempt);
                tracing::warn!(
                    url = %req.url,
                    attempt,
                    max_attempts = policy.max_attempts,
                    "request failed ({err}); retrying in {delay:?}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
