//! Mock backend (SPEC_FULL.md §4.K): serves a canned response chosen by
//! matching the resource path against `path_templates`.
//!
//! `path_templates` is a map, which has no defined iteration order; entries
//! are matched in pattern-sorted order so "first hit wins" is at least
//! deterministic across runs, rather than depending on hash-map iteration.

use bytes::Bytes;
use hyper::{Response, StatusCode};

use crate::config::{Endpoint, MockConfig, MockResponseTemplate};
use crate::context::{full_body, RequestContext, ResponseBody};
use crate::error::ProxyError;
use crate::matcher::CompiledMatcher;

use super::resource_path;

pub async fn handle(
    ctx: &RequestContext,
    endpoint: &Endpoint,
    cfg: &MockConfig,
) -> Result<Response<ResponseBody>, ProxyError> {
    if !cfg.enabled {
        return Err(ProxyError::NoHandler);
    }

    let resource = resource_path(&ctx.path, &endpoint.prefix);

    let mut patterns: Vec<&String> = cfg.path_templates.keys().collect();
    patterns.sort();

    let template = patterns
        .into_iter()
        .find(|pattern| {
            CompiledMatcher::compile(pattern).map(|m| m.is_match(&resource)).unwrap_or(false)
        })
        .and_then(|pattern| cfg.path_templates.get(pattern))
        .or(cfg.default_response.as_ref());

    let Some(template) = template else {
        return Ok(not_found());
    };

    if template.delay_ms > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(template.delay_ms)).await;
    }

    render(template)
}

fn render(template: &MockResponseTemplate) -> Result<Response<ResponseBody>, ProxyError> {
    let status = StatusCode::from_u16(template.status_code).unwrap_or(StatusCode::OK);
    let body = match &template.body {
        Some(value) if template.content_type.contains("json") => Bytes::from(value.to_string()),
        Some(serde_json::Value::String(s)) => Bytes::from(s.clone()),
        Some(value) => Bytes::from(value.to_string()),
        None => Bytes::new(),
    };

    let mut builder =
        Response::builder().status(status).header("content-type", &template.content_type);
    if let Some(headers) = &template.headers {
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
    }
    builder.body(full_body(body)).map_err(|e| ProxyError::UpstreamError(e.to_string()))
}

fn not_found() -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(full_body(Bytes::from_static(b"not found")))
        .expect("static response builds")
}
