//! The streaming request/response abstraction the middleware pipeline is
//! built over.
//!
//! `RequestContext` is what a middleware or backend actually reads: method,
//! normalized path, query, headers, and a body already collected into
//! `Bytes` (request bodies in this proxy are bounded by design — no backend
//! needs a request body larger than fits in memory). `ResponseOut` is what a
//! middleware or backend produces; its body is boxed so that a streaming
//! backend (HTTPS in `-stream` mode, File, Command) and a buffering one
//! (cache, transformer) share one response type all the way up to the
//! connection task.

use std::collections::HashMap;
use std::net::SocketAddr;

use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full, StreamBody};
use hyper::body::{Frame, Incoming};
use hyper::{HeaderMap, Method, Request, Response, StatusCode};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;
pub type ResponseBody = BoxBody<Bytes, BoxError>;

/// A single connection's view of an inbound request, after the server layer
/// has collected the body.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub method: Method,
    /// Raw request path, e.g. `/a/b`, never trailing-slash normalized here;
    /// normalization happens at the routing boundary (see `matcher::normalize`).
    pub path: String,
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub client_addr: Option<SocketAddr>,
    pub body: Bytes,
}

impl RequestContext {
    pub async fn from_hyper(
        req: Request<Incoming>,
        client_addr: Option<SocketAddr>,
    ) -> Result<Self, hyper::Error> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();
        let query = req.uri().query().map(|q| q.to_string());
        let headers = req.headers().clone();
        let body = req.into_body().collect().await?.to_bytes();
        Ok(Self { method, path, query, headers, client_addr, body })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    /// Query parameters as a list of (key, value) pairs, preserving
    /// repetition so callers needing array semantics (the Echo backend) can
    /// group by key themselves.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        match &self.query {
            Some(q) => urlencoding_decode_pairs(q),
            None => Vec::new(),
        }
    }

    pub fn cookies(&self) -> HashMap<String, String> {
        let mut out = HashMap::new();
        if let Some(raw) = self.header("cookie") {
            for part in raw.split(';') {
                if let Some((k, v)) = part.trim().split_once('=') {
                    out.insert(k.trim().to_string(), v.trim().to_string());
                }
            }
        }
        out
    }

    /// Full path as the client sent it, including `?query` if present.
    pub fn path_and_query(&self) -> String {
        match &self.query {
            Some(q) => format!("{}?{}", self.path, q),
            None => self.path.clone(),
        }
    }
}

fn urlencoding_decode_pairs(query: &str) -> Vec<(String, String)> {
    query
        .split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (
                urlencoding::decode(k).map(|c| c.into_owned()).unwrap_or_else(|_| k.to_string()),
                urlencoding::decode(v).map(|c| c.into_owned()).unwrap_or_else(|_| v.to_string()),
            )
        })
        .collect()
}

/// Builds a fully-buffered response body. Most middlewares and backends in
/// this proxy end up here; only the HTTPS streaming mode and the Command/File
/// backends need true chunk-by-chunk emission (`stream_body`).
pub fn full_body(bytes: Bytes) -> ResponseBody {
    Full::new(bytes).map_err(|never| match never {}).boxed()
}

/// Builds a response body from a stream of already-framed chunks, used by
/// backends that must emit data as it becomes available instead of buffering
/// the whole response first.
pub fn stream_body<S>(stream: S) -> ResponseBody
where
    S: futures::Stream<Item = Result<Frame<Bytes>, BoxError>> + Send + 'static,
{
    StreamBody::new(stream).boxed()
}

pub fn text_response(status: StatusCode, body: impl Into<Bytes>) -> Response<ResponseBody> {
    Response::builder()
        .status(status)
        .body(full_body(body.into()))
        .expect("static response builds")
}

pub fn json_response(status: StatusCode, value: &serde_json::Value) -> Response<ResponseBody> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(full_body(Bytes::from(value.to_string())))
        .expect("static response builds")
}

/// Buffers an already-built response body into `Bytes`, preserving the
/// status and headers. Used by middlewares that must inspect or rewrite the
/// full body (cache admission, response transform, content-length).
pub async fn buffer_response(
    resp: Response<ResponseBody>,
) -> Result<(StatusCode, HeaderMap, Bytes), BoxError> {
    let (parts, body) = resp.into_parts();
    let bytes = body.collect().await?.to_bytes();
    Ok((parts.status, parts.headers, bytes))
}
