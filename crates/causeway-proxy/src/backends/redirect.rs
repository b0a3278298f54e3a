//! Redirect backend (SPEC_FULL.md §4.K): responds with a redirect to a
//! configured location, optionally preserving the request's path and query.

use bytes::Bytes;
use hyper::{Response, StatusCode};

use crate::config::{Endpoint, RedirectConfig};
use crate::context::{full_body, RequestContext, ResponseBody};
use crate::error::ProxyError;

use super::resource_path;

pub async fn handle(
    ctx: &RequestContext,
    endpoint: &Endpoint,
    cfg: &RedirectConfig,
) -> Result<Response<ResponseBody>, ProxyError> {
    if !cfg.enabled {
        return Err(ProxyError::NoHandler);
    }

    let status = StatusCode::from_u16(cfg.status_code).unwrap_or(StatusCode::FOUND);

    let mut location = cfg.location.clone();
    if cfg.preserve_path {
        let resource = resource_path(&ctx.path, &endpoint.prefix);
        if !resource.is_empty() {
            location = format!("{}/{}", location.trim_end_matches('/'), resource);
        }
        if let Some(query) = &ctx.query {
            location.push('?');
            location.push_str(query);
        }
    }

    Response::builder()
        .status(status)
        .header("location", location)
        .body(full_body(Bytes::new()))
        .map_err(|e| ProxyError::UpstreamError(e.to_string()))
}
