use crate::error::TransportError;
use crate::request::Request;
use crate::request::RequestBody;
use crate::request::Response;
use async_trait::async_trait;
use tracing::Level;
use tracing::enabled;
use tracing::trace;

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, req: Request) -> Result<Response, TransportError>;
}

#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }

    fn build(&self, req: Request) -> reqwest::RequestBuilder {
        let Request {
            method,
            url,
            headers,
            body,
            timeout,
        } = req;

        let mut builder = self.client.request(method, &url);

        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        builder = builder.headers(headers);
        match body {
            Some(RequestBody::Text(text)) => builder
                .header(http::header::CONTENT_TYPE, "text/plain; charset=utf-8")
                .body(text),
            None => builder,
        }
    }

    fn map_error(err: reqwest::Error) -> TransportError {
        if err.is_timeout() {
            TransportError::Timeout
        } else if err.is_builder() {
            TransportError::Build(err.to_string())
        } else {
            TransportError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, req: Request) -> Result<Response, TransportError> {
        if enabled!(Level::TRACE) {
            trace!("{} to {}: {:?}", req.method, req.url, req.body);
        }

        let method = req.method.clone();
        let url = req.url.clone();
        let resp = match self.build(req).send().await {
            Ok(resp) => resp,
            Err(err) => {
                tracing::debug!(%method, %url, error = %err, "Request failed");
                return Err(Self::map_error(err));
            }
        };
        let status = resp.status();
        let headers = resp.headers().clone();
        tracing::debug!(%method, %url, %status, "Request completed");
        let bytes = resp.bytes().await.map_err(Self::map_error)?;
        if !status.is_success() {
            let body = String::from_utf8(bytes.to_vec()).ok();
            return Err(TransportError::Http { status, url, body });
        }
        Ok(Response {
            status,
            headers,
            body: bytes,
        })
    }
}
