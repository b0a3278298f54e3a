//! The stable error surface for the proxy core.
//!
//! Every fallible call in the request path returns `Result<_, ProxyError>`. The
//! per-connection task is the single place that converts a `ProxyError` into an
//! HTTP response, per the mapping in `ProxyError::status_code`.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde_json::json;

use crate::context::{full_body, ResponseBody};

#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("no endpoint matches {0}")]
    NotRouted(String),

    #[error("endpoint has no active backend handler")]
    NoHandler,

    #[error("method {0} not allowed for this backend")]
    MethodNotAllowed(String),

    #[error("upstream request timed out")]
    UpstreamTimeout,

    #[error("upstream error: {0}")]
    UpstreamError(String),

    #[error("access denied")]
    Forbidden,

    #[error("cache I/O error: {0}")]
    CacheIo(String),

    #[error("virtual backend cycle detected at '{0}'")]
    Cycle(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ProxyError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::NotRouted(_) => StatusCode::NOT_FOUND,
            ProxyError::NoHandler => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            ProxyError::UpstreamTimeout => StatusCode::REQUEST_TIMEOUT,
            ProxyError::UpstreamError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Forbidden => StatusCode::FORBIDDEN,
            ProxyError::CacheIo(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Cycle(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Renders the JSON body the client sees. `EForbidden` and `ENotRouted`
    /// use a plain-text shape the original responses used; everything else
    /// is `{"error": msg}`.
    pub fn to_response(&self) -> Response<Full<Bytes>> {
        let status = self.status_code();
        let body = match self {
            ProxyError::Forbidden => Bytes::from_static(b"Access denied"),
            ProxyError::NotRouted(msg) => Bytes::from(msg.clone()),
            _ => Bytes::from(json!({ "error": self.to_string() }).to_string()),
        };
        Response::builder()
            .status(status)
            .header("content-type", "application/json")
            .body(Full::new(body))
            .unwrap_or_else(|_| {
                Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body(Full::new(Bytes::new()))
                    .expect("static response builds")
            })
    }

    /// Same rendering as `to_response`, boxed to `ResponseBody` so it can
    /// flow through the pipeline's `Response<ResponseBody>` type alongside
    /// ordinary backend responses — used by the virtual backend, which needs
    /// to inspect a source's status before deciding whether to fall through
    /// to the next one.
    pub fn to_boxed_response(&self) -> Response<ResponseBody> {
        let status = self.status_code();
        let body = match self {
            ProxyError::Forbidden => Bytes::from_static(b"Access denied"),
            ProxyError::NotRouted(msg) => Bytes::from(msg.clone()),
            _ => Bytes::from(json!({ "error": self.to_string() }).to_string()),
        };
        Response::builder()
            .status(status)
            .header("content-type", "application/json")
            .body(full_body(body))
            .expect("static response builds")
    }
}
