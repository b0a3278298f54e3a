//! The in-memory-only cache slot. Preserved as an intentional pass-through —
//! see the Open Question resolution in SPEC_FULL.md §4.E and §9: the config
//! surface (`max_items`, `include_patterns`, ...) is parsed and validated,
//! the slot holds its place in the composed pipeline, but no admission or
//! lookup path is wired to it.

use async_trait::async_trait;
use hyper::Response;

use crate::context::{RequestContext, ResponseBody};
use crate::error::ProxyError;
use crate::pipeline::{BoxHandler, Handler, Middleware};

pub struct MemoryCacheMiddleware;

#[async_trait]
impl Middleware for MemoryCacheMiddleware {
    async fn call(
        &self,
        ctx: RequestContext,
        next: &BoxHandler,
    ) -> Result<Response<ResponseBody>, ProxyError> {
        next.handle(ctx).await
    }
}
