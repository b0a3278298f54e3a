//! Response transformer: literal substring replacement on the matched
//! endpoint's response body, with `${path}` expansion in the replacement
//! text. Runs early in the pipeline (§4.D position 2) but needs to know
//! which endpoint would serve the request, so it carries its own routing
//! lookup rather than waiting for the terminal handler's.

use async_trait::async_trait;
use hyper::Response;

use crate::context::{buffer_response, full_body, RequestContext, ResponseBody};
use crate::error::ProxyError;
use crate::pipeline::{BoxHandler, Handler, Middleware};
use crate::routing::SharedRoutingTable;

pub struct ResponseTransformMiddleware {
    routing: SharedRoutingTable,
}

impl ResponseTransformMiddleware {
    pub fn new(routing: SharedRoutingTable) -> Self {
        Self { routing }
    }
}

#[async_trait]
impl Middleware for ResponseTransformMiddleware {
    async fn call(
        &self,
        ctx: RequestContext,
        next: &BoxHandler,
    ) -> Result<Response<ResponseBody>, ProxyError> {
        let path = ctx.path.clone();
        let replacements = self.routing.find(&path).ok().and_then(|entry| {
            entry.endpoint.transformers.as_ref().and_then(|t| {
                t.response.enabled.then(|| t.response.text_replacements.clone())
            })
        });

        let resp = next.handle(ctx).await?;

        let Some(replacements) = replacements else {
            return Ok(resp);
        };
        if replacements.is_empty() {
            return Ok(resp);
        }

        let (status, headers, body) =
            buffer_response(resp).await.map_err(|e| ProxyError::UpstreamError(e.to_string()))?;

        let Ok(text) = std::str::from_utf8(&body) else {
            // Not UTF-8: forward untouched.
            let mut builder = Response::builder().status(status);
            for (name, value) in headers.iter() {
                builder = builder.header(name, value);
            }
            return Ok(builder.body(full_body(body)).expect("rebuilt response is valid"));
        };

        let mut transformed = text.to_string();
        for replacement in &replacements {
            let expanded = replacement.newvalue.replace("${path}", &path);
            transformed = transformed.replace(&replacement.oldvalue, &expanded);
        }

        let mut builder = Response::builder().status(status);
        for (name, value) in headers.iter() {
            if name.as_str().eq_ignore_ascii_case("content-length") {
                continue;
            }
            builder = builder.header(name, value);
        }
        Ok(builder
            .body(full_body(bytes::Bytes::from(transformed)))
            .expect("rebuilt response is valid"))
    }
}
