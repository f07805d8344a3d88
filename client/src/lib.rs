//! Minimal HTTP plumbing shared by the blob-store and recompute-service
//! clients.
//!
//! Callers build a [`Request`], hand it to an [`HttpTransport`], and get back
//! either a successful [`Response`] or a [`TransportError`]. Non-2xx statuses
//! are surfaced as [`TransportError::Http`] so callers can decide whether a
//! miss is fatal or simply means "absent".

mod error;
mod request;
mod retry;
mod transport;

pub use error::TransportError;
pub use request::Request;
pub use request::RequestBody;
pub use request::Response;
pub use retry::RetryOn;
pub use retry::RetryPolicy;
pub use retry::backoff;
pub use retry::run_with_retry;
pub use transport::HttpTransport;
pub use transport::ReqwestTransport;
