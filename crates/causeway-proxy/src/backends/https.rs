//! HTTPS backend (SPEC_FULL.md §4.I): forwards a request to an upstream
//! HTTPS service, rewriting the target URL and streaming or buffering the
//! response depending on the client's `accept` header.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use hyper::{HeaderMap, Response, StatusCode};

use crate::auth::Auth;
use crate::config::{Endpoint, HttpsBackend};
use crate::context::{full_body, stream_body, RequestContext, ResponseBody};
use crate::error::ProxyError;

use super::{resource_path, BackendDeps, BACKEND_KIND_HEADER};

const STREAM_CHUNK_SIZE: usize = 8192;

// Upper bounds from the streaming/non-streaming timeout profiles; connect and
// read sub-timeouts aren't separately selectable on a shared pooled
// `reqwest::Client`, so the total bound is what's actually enforced here.
const STREAM_TOTAL_TIMEOUT: Duration = Duration::from_secs(1800);
const BUFFERED_TOTAL_TIMEOUT: Duration = Duration::from_secs(60);

pub async fn handle(
    ctx: &RequestContext,
    endpoint: &Endpoint,
    backend: &HttpsBackend,
    auth: Option<&Arc<dyn Auth>>,
    deps: &Arc<BackendDeps>,
) -> Result<Response<ResponseBody>, ProxyError> {
    let method_name = ctx.method.as_str().to_ascii_uppercase();
    if !backend.methods.iter().any(|m| m.eq_ignore_ascii_case(&method_name)) {
        return Err(ProxyError::MethodNotAllowed(method_name));
    }

    let target = build_target_url(ctx, endpoint, backend);
    let method = reqwest::Method::from_bytes(ctx.method.as_str().as_bytes())
        .map_err(|e| ProxyError::UpstreamError(e.to_string()))?;

    let mut request = deps.http_client.request(method.clone(), &target);
    request = request.headers(forward_headers(ctx, backend, auth, &deps.version));

    if matches!(method, reqwest::Method::POST | reqwest::Method::PUT | reqwest::Method::PATCH) {
        let content_type = ctx.header("content-type").unwrap_or_default();
        if content_type.contains("application/json") {
            match serde_json::from_slice::<serde_json::Value>(&ctx.body) {
                Ok(json) => request = request.json(&json),
                Err(_) => request = request.body(ctx.body.clone()),
            }
        } else {
            request = request.body(ctx.body.clone());
        }
    }

    let wants_stream = ctx
        .header("accept")
        .map(|v| v.split(',').any(|part| part.contains("-stream")))
        .unwrap_or(false);

    if wants_stream {
        dispatch_streaming(request).await
    } else {
        dispatch_buffered(request).await
    }
}

/// `target = backend.url + "/" + (request_path − endpoint.prefix)`, unless
/// `backend.url` ends with `$`, in which case it's a pinned URL used
/// verbatim and the request's path/query are ignored.
fn build_target_url(ctx: &RequestContext, endpoint: &Endpoint, backend: &HttpsBackend) -> String {
    if let Some(pinned) = backend.url.strip_suffix('$') {
        return pinned.to_string();
    }
    let resource = resource_path(&ctx.path, &endpoint.prefix);
    let mut target = format!("{}/{}", backend.url.trim_end_matches('/'), resource);
    if let Some(query) = &ctx.query {
        target.push('?');
        target.push_str(query);
    }
    target
}

fn forward_headers(
    ctx: &RequestContext,
    backend: &HttpsBackend,
    auth: Option<&Arc<dyn Auth>>,
    version: &str,
) -> reqwest::header::HeaderMap {
    let mut out = reqwest::header::HeaderMap::new();
    for (name, value) in ctx.headers.iter() {
        let lower = name.as_str().to_ascii_lowercase();
        if matches!(lower.as_str(), "host" | "content-length" | "accept-encoding" | "user-agent") {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            reqwest::header::HeaderName::from_bytes(name.as_str().as_bytes()),
            reqwest::header::HeaderValue::from_bytes(value.as_bytes()),
        ) {
            out.insert(name, value);
        }
    }
    out.insert(
        reqwest::header::USER_AGENT,
        reqwest::header::HeaderValue::from_str(&format!("proxy/{version}"))
            .unwrap_or_else(|_| reqwest::header::HeaderValue::from_static("proxy/unknown")),
    );
    for (name, value) in &backend.headers {
        if let (Ok(name), Ok(value)) = (
            reqwest::header::HeaderName::from_bytes(name.as_bytes()),
            reqwest::header::HeaderValue::from_str(value),
        ) {
            out.insert(name, value);
        }
    }
    if let Some(auth) = auth {
        for (name, value) in auth.get_headers() {
            if let (Ok(name), Ok(value)) = (
                reqwest::header::HeaderName::from_bytes(name.as_bytes()),
                reqwest::header::HeaderValue::from_str(&value),
            ) {
                out.insert(name, value);
            }
        }
    }
    out
}

async fn dispatch_streaming(
    request: reqwest::RequestBuilder,
) -> Result<Response<ResponseBody>, ProxyError> {
    let request = request.timeout(STREAM_TOTAL_TIMEOUT);
    let response = tokio::time::timeout(STREAM_TOTAL_TIMEOUT, request.send())
        .await
        .map_err(|_| ProxyError::UpstreamTimeout)?
        .map_err(upstream_connect_error)?;

    let status = response.status();
    let byte_stream = response.bytes_stream();
    let framed = byte_stream.flat_map(|chunk| {
        let frames: Vec<Result<hyper::body::Frame<Bytes>, crate::context::BoxError>> = match chunk
        {
            Ok(bytes) => bytes
                .chunks(STREAM_CHUNK_SIZE)
                .map(|c| Ok(hyper::body::Frame::data(Bytes::copy_from_slice(c))))
                .collect(),
            Err(e) => vec![Err(Box::new(e) as crate::context::BoxError)],
        };
        futures::stream::iter(frames)
    });

    Response::builder()
        .status(StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::OK))
        .header("cache-control", "no-cache")
        .header("content-type", "text/octet-stream")
        .header(BACKEND_KIND_HEADER, "https")
        .body(stream_body(framed))
        .map_err(|e| ProxyError::UpstreamError(e.to_string()))
}

async fn dispatch_buffered(
    request: reqwest::RequestBuilder,
) -> Result<Response<ResponseBody>, ProxyError> {
    let request = request.timeout(BUFFERED_TOTAL_TIMEOUT);
    let response = tokio::time::timeout(BUFFERED_TOTAL_TIMEOUT, request.send())
        .await
        .map_err(|_| ProxyError::UpstreamTimeout)?
        .map_err(upstream_connect_error)?;

    let status = StatusCode::from_u16(response.status().as_u16()).unwrap_or(StatusCode::OK);
    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());

    let Some(content_type) = content_type else {
        return Response::builder()
            .status(StatusCode::NO_CONTENT)
            .header(BACKEND_KIND_HEADER, "https")
            .body(full_body(Bytes::new()))
            .map_err(|e| ProxyError::UpstreamError(e.to_string()));
    };

    let bytes = response.bytes().await.map_err(|e| ProxyError::UpstreamError(e.to_string()))?;

    let mut builder = Response::builder().status(status).header(BACKEND_KIND_HEADER, "https");
    if content_type.contains("application/json") {
        let reencoded = match serde_json::from_slice::<serde_json::Value>(&bytes) {
            Ok(value) => Bytes::from(value.to_string()),
            Err(_) => bytes,
        };
        builder = builder.header("content-type", "application/json");
        builder.body(full_body(reencoded)).map_err(|e| ProxyError::UpstreamError(e.to_string()))
    } else {
        // text/* and application/* (octet-stream, jar, ...) both forward verbatim.
        builder = builder.header("content-type", content_type);
        builder.body(full_body(bytes)).map_err(|e| ProxyError::UpstreamError(e.to_string()))
    }
}

fn upstream_connect_error(e: reqwest::Error) -> ProxyError {
    if e.is_timeout() {
        ProxyError::UpstreamTimeout
    } else {
        ProxyError::UpstreamError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProxyUpstream, UpstreamConfig};
    use hyper::HeaderMap as HyperHeaderMap;

    fn endpoint(prefix: &str) -> Endpoint {
        Endpoint {
            prefix: prefix.to_string(),
            r#match: String::new(),
            upstream: UpstreamConfig {
                proxy: Some(ProxyUpstream { enabled: true, timeout_seconds: 30 }),
                ..Default::default()
            },
            identifier: None,
            weight: 100,
            backends: None,
            transformers: None,
            auth: None,
            timeout: 30.0,
        }
    }

    fn backend(url: &str) -> HttpsBackend {
        HttpsBackend {
            url: url.to_string(),
            id: None,
            weight: 0,
            ssl: true,
            timeout: 30,
            retries: None,
            rate_limiting: None,
            headers: Default::default(),
            methods: vec!["GET".to_string()],
        }
    }

    fn ctx(path: &str, query: Option<&str>) -> RequestContext {
        RequestContext {
            method: hyper::Method::GET,
            path: path.to_string(),
            query: query.map(|q| q.to_string()),
            headers: HyperHeaderMap::new(),
            client_addr: None,
            body: Bytes::new(),
        }
    }

    #[test]
    fn pinned_url_ignores_request_path() {
        let ep = endpoint("/api");
        let be = backend("https://example.com/fixed$");
        let c = ctx("/api/anything", Some("x=1"));
        assert_eq!(build_target_url(&c, &ep, &be), "https://example.com/fixed");
    }

    #[test]
    fn joined_url_strips_prefix_and_keeps_query() {
        let ep = endpoint("/api");
        let be = backend("https://example.com/upstream");
        let c = ctx("/api/users/1", Some("x=1"));
        assert_eq!(build_target_url(&c, &ep, &be), "https://example.com/upstream/users/1?x=1");
    }

    #[test]
    fn joined_url_without_query() {
        let ep = endpoint("/api");
        let be = backend("https://example.com/upstream");
        let c = ctx("/api/users/1", None);
        assert_eq!(build_target_url(&c, &ep, &be), "https://example.com/upstream/users/1");
    }
}
