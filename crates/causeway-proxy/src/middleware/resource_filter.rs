//! Resource filter: requests whose (left-stripped) path matches a configured
//! `skip_paths` glob are short-circuited with `204 No Content` before
//! reaching the rest of the pipeline.

use async_trait::async_trait;
use hyper::{Response, StatusCode};

use crate::context::{text_response, RequestContext, ResponseBody};
use crate::error::ProxyError;
use crate::matcher::CompiledMatcher;
use crate::pipeline::{BoxHandler, Handler, Middleware};

pub struct ResourceFilterMiddleware {
    enabled: bool,
    skip_paths: Vec<CompiledMatcher>,
}

impl ResourceFilterMiddleware {
    pub fn new(enabled: bool, skip_paths: &[String]) -> Result<Self, anyhow::Error> {
        let skip_paths = skip_paths
            .iter()
            .map(|p| CompiledMatcher::compile(p).map_err(|e| anyhow::anyhow!("{e}")))
            .collect::<Result<_, _>>()?;
        Ok(Self { enabled, skip_paths })
    }
}

#[async_trait]
impl Middleware for ResourceFilterMiddleware {
    async fn call(
        &self,
        ctx: RequestContext,
        next: &BoxHandler,
    ) -> Result<Response<ResponseBody>, ProxyError> {
        if !self.enabled {
            return next.handle(ctx).await;
        }
        let stripped = ctx.path.trim_start_matches('/');
        if self.skip_paths.iter().any(|m| m.is_match(stripped) || m.is_match(&ctx.path)) {
            return Ok(text_response(StatusCode::NO_CONTENT, bytes::Bytes::new()));
        }
        next.handle(ctx).await
    }
}
