//! Terminal handler (SPEC_FULL.md §4.C position 9 / §4.H-§4.J): routes the
//! request to its endpoint, then selects an upstream mode — single backend
//! (`proxy`), composite (`virtual`), a WebSocket stub, or `404` for the
//! other accepted-but-unimplemented modes.
//!
//! Kept separate from `backends` to avoid a cycle: the Virtual backend needs
//! to re-enter routing and recurse into this same selection logic, while
//! `backends::dispatch` only ever needs to be called, never to call back in.

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use hyper::{HeaderMap, Response, StatusCode};

use crate::backends::{self, virtual_backend, BackendDeps};
use crate::config::Endpoint;
use crate::context::{full_body, RequestContext, ResponseBody};
use crate::error::ProxyError;
use crate::pipeline::Handler;
use crate::routing::{CompiledEndpoint, SharedRoutingTable};

pub struct Dispatcher {
    routing: SharedRoutingTable,
    backend_deps: Arc<BackendDeps>,
}

impl Dispatcher {
    pub fn new(routing: SharedRoutingTable, backend_deps: Arc<BackendDeps>) -> Self {
        Self { routing, backend_deps }
    }
}

#[async_trait]
impl Handler for Dispatcher {
    async fn handle(&self, ctx: RequestContext) -> Result<Response<ResponseBody>, ProxyError> {
        let entry = self.routing.find(&ctx.path)?;
        let mut stack: Vec<String> = entry.endpoint.identifier.iter().cloned().collect();
        dispatch_one(&ctx, entry, &self.routing, &self.backend_deps, &mut stack).await
    }
}

/// Resolves one endpoint's upstream mode. Boxed because the `virtual` branch
/// recurses back into this same function for each source it tries, and an
/// `async fn` cannot otherwise call itself (the resulting future would have
/// unbounded size).
fn dispatch_one<'a>(
    ctx: &'a RequestContext,
    entry: &'a CompiledEndpoint,
    routing: &'a SharedRoutingTable,
    deps: &'a Arc<BackendDeps>,
    stack: &'a mut Vec<String>,
) -> BoxFuture<'a, Result<Response<ResponseBody>, ProxyError>> {
    async move {
        let endpoint = &entry.endpoint;
        if endpoint.upstream.proxy.as_ref().map(|p| p.enabled).unwrap_or(false) {
            backends::dispatch(ctx, entry, deps).await
        } else if endpoint.upstream.r#virtual.as_ref().map(|v| v.enabled).unwrap_or(false) {
            dispatch_virtual(ctx, endpoint, routing, deps, stack).await
        } else if endpoint.upstream.websocket.as_ref().map(|w| w.enabled).unwrap_or(false) {
            Ok(websocket_stub())
        } else if endpoint.upstream.graphql.as_ref().map(|g| g.enabled).unwrap_or(false)
            || endpoint.upstream.service_mesh.as_ref().map(|s| s.enabled).unwrap_or(false)
            || endpoint.upstream.function.as_ref().map(|f| f.enabled).unwrap_or(false)
        {
            // Accepted in config for forward compatibility; no handler exists
            // yet for these upstream modes (SPEC_FULL.md §14).
            Err(ProxyError::NoHandler)
        } else {
            Err(ProxyError::NotRouted(format!("no active upstream mode for {}", ctx.path)))
        }
    }
    .boxed()
}

fn dispatch_virtual<'a>(
    ctx: &'a RequestContext,
    endpoint: &'a Endpoint,
    routing: &'a SharedRoutingTable,
    deps: &'a Arc<BackendDeps>,
    stack: &'a mut Vec<String>,
) -> BoxFuture<'a, Result<Response<ResponseBody>, ProxyError>> {
    async move {
        let virtual_cfg = endpoint
            .upstream
            .r#virtual
            .as_ref()
            .expect("dispatch_one only calls this when virtual is enabled");

        for source in &virtual_cfg.sources {
            if stack.iter().any(|s| s == source) {
                return Err(ProxyError::Cycle(source.clone()));
            }
            let Some(source_entry) = routing.find_by_identifier(source) else {
                continue;
            };

            let mut source_ctx = ctx.clone();
            source_ctx.path =
                virtual_backend::target_path(&ctx.path, &endpoint.prefix, &source_entry.endpoint.prefix);

            stack.push(source.clone());
            let result = dispatch_one(&source_ctx, source_entry, routing, deps, stack).await;
            stack.pop();

            let response = match result {
                Ok(resp) => resp,
                Err(ProxyError::Cycle(id)) => return Err(ProxyError::Cycle(id)),
                Err(err) => err.to_boxed_response(),
            };

            if response.status() == StatusCode::OK {
                return Ok(virtual_backend::with_default_content_type(response));
            }
        }

        Err(ProxyError::NotRouted(format!(
            "virtual backend exhausted all sources for {}",
            ctx.path
        )))
    }
    .boxed()
}

/// WebSocket upstream mode is accepted for config compatibility but the
/// data-plane isn't proxied: the route responds and the connection closes
/// right after, rather than this crate performing a raw socket hijack (the
/// pipeline operates over the buffered `RequestContext`/`ResponseBody`
/// abstraction, not the live hyper connection).
fn websocket_stub() -> Response<ResponseBody> {
    let mut headers = HeaderMap::new();
    headers.insert("connection", "close".parse().unwrap());
    headers.insert("upgrade", "websocket".parse().unwrap());
    let mut resp = Response::builder()
        .status(StatusCode::SWITCHING_PROTOCOLS)
        .body(full_body(bytes::Bytes::new()))
        .expect("static response builds");
    resp.headers_mut().extend(headers);
    resp
}
