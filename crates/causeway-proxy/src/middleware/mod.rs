//! The ordered pipeline stages. `app.rs` assembles these into a single
//! `BoxHandler` via [`crate::pipeline::build_pipeline`] in the order documented
//! in SPEC_FULL.md §4.D.

pub mod bot_filter;
pub mod compression;
pub mod content_length;
pub mod file_cache;
pub mod ip_filter;
pub mod memory_cache;
pub mod resource_filter;
pub mod response_transform;

use async_trait::async_trait;
use hyper::Response;

use crate::context::{RequestContext, ResponseBody};
use crate::error::ProxyError;
use crate::pipeline::{BoxHandler, Handler, Middleware};

/// Fills a pipeline slot whose config section is entirely absent (e.g. no
/// `middlewares.performance.cache.file` block at all). Unlike the slots
/// above, which each carry their own `enabled` flag and self-disable, the
/// file-cache middleware unconditionally needs a built `CacheEngine`, so
/// there is no value to construct it with when the section is missing.
pub struct PassThrough;

#[async_trait]
impl Middleware for PassThrough {
    async fn call(
        &self,
        ctx: RequestContext,
        next: &BoxHandler,
    ) -> Result<Response<ResponseBody>, ProxyError> {
        next.handle(ctx).await
    }
}
