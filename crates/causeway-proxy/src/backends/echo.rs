//! Echo backend (SPEC_FULL.md §4.K): reflects the request back as JSON,
//! useful for testing routing and middleware without a real upstream.

use std::time::{SystemTime, UNIX_EPOCH};

use hyper::{Response, StatusCode};
use serde_json::json;

use crate::config::{Endpoint, EchoConfig};
use crate::context::{json_response, RequestContext, ResponseBody};
use crate::error::ProxyError;

use super::resource_path;

pub async fn handle(
    ctx: &RequestContext,
    endpoint: &Endpoint,
    cfg: &EchoConfig,
) -> Result<Response<ResponseBody>, ProxyError> {
    if !cfg.enabled {
        return Err(ProxyError::NoHandler);
    }

    if cfg.response_delay_ms > 0 {
        tokio::time::sleep(std::time::Duration::from_millis(cfg.response_delay_ms)).await;
    }

    let resource = resource_path(&ctx.path, &endpoint.prefix);
    let path = match &ctx.query {
        Some(q) => format!("{resource}?{q}"),
        None => resource,
    };

    let mut headers = serde_json::Map::new();
    for (name, value) in ctx.headers.iter() {
        if let Ok(v) = value.to_str() {
            headers.insert(name.as_str().to_string(), json!(v));
        }
    }
    if let Some(extra) = &cfg.add_headers {
        for (key, value) in extra {
            headers.insert(key.clone(), json!(expand_timestamp(value)));
        }
    }

    let mut query_params: std::collections::HashMap<String, Vec<String>> = Default::default();
    for (key, value) in ctx.query_pairs() {
        query_params.entry(key).or_default().push(value);
    }

    let body = String::from_utf8_lossy(&ctx.body).into_owned();

    let payload = json!({
        "method": ctx.method.as_str(),
        "path": path,
        "client_ip": ctx.client_addr.map(|a| a.ip().to_string()),
        "headers": headers,
        "body": body,
        "query": query_params,
        "cookies": ctx.cookies(),
    });

    Ok(json_response(StatusCode::OK, &payload))
}

fn expand_timestamp(value: &str) -> String {
    if !value.contains("${timestamp}") {
        return value.to_string();
    }
    let now = SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(0);
    value.replace("${timestamp}", &now.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProxyUpstream, UpstreamConfig};
    use bytes::Bytes;
    use hyper::HeaderMap;

    fn endpoint(prefix: &str) -> Endpoint {
        Endpoint {
            prefix: prefix.to_string(),
            r#match: String::new(),
            upstream: UpstreamConfig {
                proxy: Some(ProxyUpstream { enabled: true, timeout_seconds: 30 }),
                ..Default::default()
            },
            identifier: None,
            weight: 100,
            backends: None,
            transformers: None,
            auth: None,
            timeout: 30.0,
        }
    }

    fn ctx(path: &str, query: Option<&str>, body: &[u8]) -> RequestContext {
        RequestContext {
            method: hyper::Method::POST,
            path: path.to_string(),
            query: query.map(|q| q.to_string()),
            headers: HeaderMap::new(),
            client_addr: None,
            body: Bytes::copy_from_slice(body),
        }
    }

    #[tokio::test]
    async fn echoes_method_path_and_body() {
        let ep = endpoint("/echo");
        let cfg = EchoConfig { enabled: true, add_headers: None, response_delay_ms: 0 };
        let c = ctx("/echo/thing", Some("a=1"), b"hi");
        let resp = handle(&c, &ep, &cfg).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let (_, _, body) = crate::context::buffer_response(resp).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["method"], "POST");
        assert_eq!(value["path"], "thing?a=1");
        assert_eq!(value["body"], "hi");
    }

    #[test]
    fn expand_timestamp_leaves_plain_values_untouched() {
        assert_eq!(expand_timestamp("static"), "static");
        assert!(expand_timestamp("at ${timestamp}").starts_with("at "));
    }
}
