//! Content-Length rewriter: the outermost-but-one layer before the terminal
//! handler. Buffers the full response body and sets an accurate
//! `content-length`, overwriting whatever the backend or an upstream set.

use async_trait::async_trait;
use hyper::Response;

use crate::context::{buffer_response, full_body, RequestContext, ResponseBody};
use crate::error::ProxyError;
use crate::pipeline::{BoxHandler, Handler, Middleware};

pub struct ContentLengthMiddleware;

#[async_trait]
impl Middleware for ContentLengthMiddleware {
    async fn call(
        &self,
        ctx: RequestContext,
        next: &BoxHandler,
    ) -> Result<Response<ResponseBody>, ProxyError> {
        let resp = next.handle(ctx).await?;
        let (status, mut headers, body) = buffer_response(resp)
            .await
            .map_err(|e| ProxyError::UpstreamError(e.to_string()))?;

        headers.remove("content-length");
        headers.insert("content-length", body.len().into());

        let mut builder = Response::builder().status(status);
        for (name, value) in headers.iter() {
            builder = builder.header(name, value);
        }
        Ok(builder.body(full_body(body)).expect("rebuilt response is valid"))
    }
}
