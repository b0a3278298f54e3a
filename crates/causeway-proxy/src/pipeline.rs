//! The ordered middleware chain.
//!
//! A [`Handler`] turns a request into a response. A [`Middleware`] wraps an
//! inner handler and may observe, mutate, short-circuit (return without
//! calling `inner`), or replace the response stream. The pipeline is built
//! once at startup by folding the ordered middleware list around the
//! terminal handler (routing + backend dispatch); each layer's own `enabled`
//! flag decides whether it does real work or degenerates to pass-through, so
//! the composed handler type is uniform regardless of configuration.

use std::sync::Arc;

use async_trait::async_trait;
use hyper::Response;

use crate::context::{RequestContext, ResponseBody};
use crate::error::ProxyError;

#[async_trait]
pub trait Handler: Send + Sync {
    async fn handle(&self, ctx: RequestContext) -> Result<Response<ResponseBody>, ProxyError>;
}

/// A boxed, already-composed handler: what middlewares call as their `next`.
pub type BoxHandler = Arc<dyn Handler>;

#[async_trait]
pub trait Middleware: Send + Sync {
    async fn call(
        &self,
        ctx: RequestContext,
        next: &BoxHandler,
    ) -> Result<Response<ResponseBody>, ProxyError>;
}

/// Adapts a `Middleware` + its wrapped inner handler back into a `Handler`,
/// so layers compose uniformly.
struct Layer {
    middleware: Arc<dyn Middleware>,
    inner: BoxHandler,
}

#[async_trait]
impl Handler for Layer {
    async fn handle(&self, ctx: RequestContext) -> Result<Response<ResponseBody>, ProxyError> {
        self.middleware.call(ctx, &self.inner).await
    }
}

/// Folds `middlewares` (outermost first, per SPEC_FULL.md §4.D) around
/// `terminal`, returning a single composed handler.
pub fn build_pipeline(
    middlewares: Vec<Arc<dyn Middleware>>,
    terminal: BoxHandler,
) -> BoxHandler {
    middlewares
        .into_iter()
        .rev()
        .fold(terminal, |inner, middleware| {
            Arc::new(Layer { middleware, inner }) as BoxHandler
        })
}
