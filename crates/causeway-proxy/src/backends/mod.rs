//! Backend dispatcher (SPEC_FULL.md §4.H): given an endpoint's selected
//! backend (the first element if `backends` is a list), inspects which
//! variant of the tagged union is active and invokes the matching handler.
//! `dispatch` itself never handles the `virtual` upstream mode — that is
//! `dispatch::Dispatcher`'s job, since it needs to re-enter routing — only
//! the terminal, single-backend handlers below.

pub mod command;
pub mod echo;
pub mod file;
pub mod https;
pub mod mock;
pub mod redirect;
pub mod virtual_backend;

use std::sync::Arc;

use hyper::Response;

use crate::config::Endpoint;
use crate::context::{RequestContext, ResponseBody};
use crate::error::ProxyError;
use crate::routing::CompiledEndpoint;

/// Marks a response as having come from the HTTPS backend, so
/// `CompressionMiddleware` knows it's eligible for gzip. Stripped before the
/// response leaves the pipeline; never seen by the client.
pub const BACKEND_KIND_HEADER: &str = "x-causeway-internal-backend-kind";

/// Shared, process-wide dependencies every backend needs: the pooled
/// upstream HTTP client and the proxy's own version string (used to build
/// the injected `user-agent`). Built once in `main` and handed to every
/// connection task by `Arc` clone, per the `AppState` pattern in
/// SPEC_FULL.md §9.
pub struct BackendDeps {
    pub http_client: reqwest::Client,
    pub version: String,
}

impl BackendDeps {
    pub fn new(version: impl Into<String>) -> Self {
        Self { http_client: reqwest::Client::new(), version: version.into() }
    }
}

/// Strips `endpoint.prefix` (and one separating `/`) from `path`, the
/// computation every backend needs to locate the resource it serves.
pub fn resource_path(path: &str, prefix: &str) -> String {
    path.strip_prefix(prefix).unwrap_or(path).trim_start_matches('/').to_string()
}

/// Dispatches to the single active backend variant (§4.H). Called both for
/// a `proxy`-mode endpoint and, recursively, for each `virtual` source
/// endpoint once it has been resolved to a concrete (non-virtual) target.
pub async fn dispatch(
    ctx: &RequestContext,
    entry: &CompiledEndpoint,
    deps: &Arc<BackendDeps>,
) -> Result<Response<ResponseBody>, ProxyError> {
    let endpoint: &Endpoint = &entry.endpoint;
    let Some(backends) = endpoint.backends.as_ref() else {
        return Err(ProxyError::NoHandler);
    };
    let Some(backend) = backends.primary() else {
        return Err(ProxyError::NoHandler);
    };

    if let Some(list) = &backend.https {
        return https::handle(ctx, endpoint, list.primary(), entry.auth.as_ref(), deps).await;
    }
    if let Some(cfg) = &backend.file {
        return file::handle(ctx, endpoint, cfg).await;
    }
    if let Some(cfg) = &backend.echo {
        return echo::handle(ctx, endpoint, cfg).await;
    }
    if let Some(cfg) = &backend.mock {
        return mock::handle(ctx, endpoint, cfg).await;
    }
    if let Some(cfg) = &backend.redirect {
        return redirect::handle(ctx, endpoint, cfg).await;
    }
    if let Some(cfg) = &backend.command {
        return command::handle(ctx, cfg).await;
    }
    if backend.scheduler.is_some() {
        // Status-only surface; not part of the core (§4.K, §1 scope note).
        return Err(ProxyError::NoHandler);
    }
    Err(ProxyError::NoHandler)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resource_path_strips_prefix_and_slash() {
        assert_eq!(resource_path("/api/v1/users", "/api/v1"), "users");
        assert_eq!(resource_path("/api/v1/", "/api/v1"), "");
        assert_eq!(resource_path("/other", "/api/v1"), "other");
    }
}
