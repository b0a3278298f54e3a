//! IP filter: blacklist-only, glob-over-address-string matching. A client
//! address absent from the request passes through with a warning rather
//! than being treated as a match.

use async_trait::async_trait;
use hyper::Response;
use tracing::warn;

use crate::context::{RequestContext, ResponseBody};
use crate::error::ProxyError;
use crate::matcher::CompiledMatcher;
use crate::pipeline::{BoxHandler, Handler, Middleware};

pub struct IpFilterMiddleware {
    enabled: bool,
    blacklist: Vec<CompiledMatcher>,
}

impl IpFilterMiddleware {
    pub fn new(enabled: bool, blacklist: &[String]) -> Result<Self, anyhow::Error> {
        let blacklist = blacklist
            .iter()
            .map(|p| CompiledMatcher::compile(p).map_err(|e| anyhow::anyhow!("{e}")))
            .collect::<Result<_, _>>()?;
        Ok(Self { enabled, blacklist })
    }
}

#[async_trait]
impl Middleware for IpFilterMiddleware {
    async fn call(
        &self,
        ctx: RequestContext,
        next: &BoxHandler,
    ) -> Result<Response<ResponseBody>, ProxyError> {
        if !self.enabled {
            return next.handle(ctx).await;
        }

        let Some(addr) = ctx.client_addr else {
            warn!("ip filter enabled but request has no client address; passing through");
            return next.handle(ctx).await;
        };
        let ip_str = addr.ip().to_string();

        if self.blacklist.iter().any(|m| m.is_match(&ip_str)) {
            return Err(ProxyError::Forbidden);
        }
        next.handle(ctx).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::text_response;
    use hyper::StatusCode;
    use std::net::SocketAddr;

    struct Ok200;
    #[async_trait]
    impl Handler for Ok200 {
        async fn handle(&self, _ctx: RequestContext) -> Result<Response<ResponseBody>, ProxyError> {
            Ok(text_response(StatusCode::OK, bytes::Bytes::new()))
        }
    }

    fn ctx(addr: Option<SocketAddr>) -> RequestContext {
        RequestContext {
            method: hyper::Method::GET,
            path: "/x".into(),
            query: None,
            headers: hyper::HeaderMap::new(),
            client_addr: addr,
            body: bytes::Bytes::new(),
        }
    }

    #[tokio::test]
    async fn blacklisted_ip_is_forbidden() {
        let mw = IpFilterMiddleware::new(true, &["*.0.0.2".to_string()]).unwrap();
        let next: BoxHandler = std::sync::Arc::new(Ok200);
        let addr: SocketAddr = "1.0.0.2:1234".parse().unwrap();
        let result = mw.call(ctx(Some(addr)), &next).await;
        assert!(matches!(result, Err(ProxyError::Forbidden)));
    }

    #[tokio::test]
    async fn non_blacklisted_ip_passes_through() {
        let mw = IpFilterMiddleware::new(true, &["*.0.0.2".to_string()]).unwrap();
        let next: BoxHandler = std::sync::Arc::new(Ok200);
        let addr: SocketAddr = "1.0.0.3:1234".parse().unwrap();
        let result = mw.call(ctx(Some(addr)), &next).await.unwrap();
        assert_eq!(result.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn missing_client_address_passes_through() {
        let mw = IpFilterMiddleware::new(true, &["*.0.0.2".to_string()]).unwrap();
        let next: BoxHandler = std::sync::Arc::new(Ok200);
        let result = mw.call(ctx(None), &next).await.unwrap();
        assert_eq!(result.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn disabled_filter_passes_everything() {
        let mw = IpFilterMiddleware::new(false, &["*".to_string()]).unwrap();
        let next: BoxHandler = std::sync::Arc::new(Ok200);
        let addr: SocketAddr = "9.9.9.9:1".parse().unwrap();
        let result = mw.call(ctx(Some(addr)), &next).await.unwrap();
        assert_eq!(result.status(), StatusCode::OK);
    }
}
