//! The file-cache pipeline slot: looks up the two-tier `CacheEngine` on GET,
//! serves a HIT with `x-cache-status: HIT`, and otherwise calls through and
//! admits the response if it qualifies.

use std::sync::Arc;

use async_trait::async_trait;
use hyper::{Method, Response, StatusCode};

use crate::cache::{CacheEngine, Lookup};
use crate::context::{buffer_response, full_body, RequestContext, ResponseBody};
use crate::error::ProxyError;
use crate::pipeline::{BoxHandler, Handler, Middleware};

pub struct FileCacheMiddleware {
    engine: Arc<CacheEngine>,
}

impl FileCacheMiddleware {
    pub fn new(engine: Arc<CacheEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl Middleware for FileCacheMiddleware {
    async fn call(
        &self,
        ctx: RequestContext,
        next: &BoxHandler,
    ) -> Result<Response<ResponseBody>, ProxyError> {
        if ctx.method != Method::GET {
            return next.handle(ctx).await;
        }

        let path = ctx.path.clone();
        let query = ctx.query.clone();

        if let Lookup::Hit(entry) = self.engine.lookup(&path, query.as_deref()).await {
            let mut builder = Response::builder()
                .status(StatusCode::from_u16(entry.status_code).unwrap_or(StatusCode::OK))
                .header("x-cache-status", "HIT")
                .header("content-length", entry.body.len().to_string());
            for (name, value) in &entry.headers {
                if name.eq_ignore_ascii_case("content-length") {
                    continue;
                }
                builder = builder.header(name.as_str(), value.as_str());
            }
            return Ok(builder.body(full_body(entry.body)).expect("cached response rebuilds"));
        }

        let resp = next.handle(ctx).await?;
        let (status, headers, body) =
            buffer_response(resp).await.map_err(|e| ProxyError::UpstreamError(e.to_string()))?;

        if self.engine.is_cacheable(&Method::GET, &path, status.as_u16()) {
            let header_map = headers
                .iter()
                .filter_map(|(name, value)| {
                    Some((name.to_string(), value.to_str().ok()?.to_string()))
                })
                .collect();
            self.engine.admit(&path, query.as_deref(), status.as_u16(), header_map, body.clone());
        }

        let mut builder = Response::builder().status(status);
        for (name, value) in headers.iter() {
            builder = builder.header(name, value);
        }
        Ok(builder.body(full_body(body)).expect("rebuilt response is valid"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FileCacheConfig;
    use crate::context::text_response;

    struct FixedBody;
    #[async_trait]
    impl Handler for FixedBody {
        async fn handle(&self, _ctx: RequestContext) -> Result<Response<ResponseBody>, ProxyError> {
            Ok(text_response(StatusCode::OK, bytes::Bytes::from("fresh")))
        }
    }

    fn engine(dir: &std::path::Path) -> Arc<CacheEngine> {
        Arc::new(
            CacheEngine::new(&FileCacheConfig {
                path: dir.to_string_lossy().to_string(),
                ttl: 60,
                max_size_mb: 10,
                max_entries: 1000,
                enabled: true,
                include_patterns: Some(vec!["**/*.json".into()]),
                exclude_patterns: None,
                cleanup_interval: "1h".into(),
            })
            .unwrap(),
        )
    }

    fn ctx(path: &str) -> RequestContext {
        RequestContext {
            method: Method::GET,
            path: path.to_string(),
            query: None,
            headers: hyper::HeaderMap::new(),
            client_addr: None,
            body: bytes::Bytes::new(),
        }
    }

    #[tokio::test]
    async fn second_request_is_served_from_cache() {
        let dir = tempfile::tempdir().unwrap();
        let mw = FileCacheMiddleware::new(engine(dir.path()));
        let next: BoxHandler = Arc::new(FixedBody);

        let first = mw.call(ctx("/x.json"), &next).await.unwrap();
        assert!(first.headers().get("x-cache-status").is_none());

        let second = mw.call(ctx("/x.json"), &next).await.unwrap();
        assert_eq!(second.headers().get("x-cache-status").unwrap(), "HIT");
        let (_, _, body) = buffer_response(second).await.unwrap();
        assert_eq!(body, bytes::Bytes::from("fresh"));
    }

    #[tokio::test]
    async fn non_includable_path_is_never_cached() {
        let dir = tempfile::tempdir().unwrap();
        let mw = FileCacheMiddleware::new(engine(dir.path()));
        let next: BoxHandler = Arc::new(FixedBody);
        let _ = mw.call(ctx("/x.html"), &next).await.unwrap();
        let second = mw.call(ctx("/x.html"), &next).await.unwrap();
        assert!(second.headers().get("x-cache-status").is_none());
    }
}
