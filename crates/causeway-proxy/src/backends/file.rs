//! File backend (SPEC_FULL.md §4.K): streams a file from disk, 8KiB at a
//! time, never following symlinks.

use std::path::Path;

use bytes::Bytes;
use futures::stream;
use hyper::{Response, StatusCode};
use tokio::io::AsyncReadExt;

use crate::config::{Endpoint, FileBackendConfig};
use crate::context::{full_body, stream_body, RequestContext, ResponseBody};
use crate::error::ProxyError;

use super::resource_path;

const CHUNK_SIZE: usize = 8192;

pub async fn handle(
    ctx: &RequestContext,
    endpoint: &Endpoint,
    cfg: &FileBackendConfig,
) -> Result<Response<ResponseBody>, ProxyError> {
    if !cfg.enabled {
        return Err(ProxyError::NoHandler);
    }

    let resource = resource_path(&ctx.path, &endpoint.prefix);
    let target = Path::new(&cfg.path).join(&resource);

    let metadata = match tokio::fs::symlink_metadata(&target).await {
        Ok(m) => m,
        Err(_) => return Ok(not_found()),
    };
    if metadata.is_symlink() || !metadata.is_file() {
        return Ok(not_found());
    }

    let file = match tokio::fs::File::open(&target).await {
        Ok(f) => f,
        Err(_) => return Ok(not_found()),
    };

    let filename = file_name(&target);
    let chunked = stream::unfold(Some(file), |state| async move {
        let mut file = state?;
        let mut buf = vec![0u8; CHUNK_SIZE];
        match file.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(hyper::body::Frame::data(Bytes::from(buf))), Some(file)))
            }
            Err(e) => Some((Err(Box::new(e) as crate::context::BoxError), None)),
        }
    });

    Response::builder()
        .status(StatusCode::OK)
        .header("content-disposition", format!("attachment; filename=\"{filename}\""))
        .body(stream_body(chunked))
        .map_err(|e| ProxyError::UpstreamError(e.to_string()))
}

fn file_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| "file".to_string())
}

fn not_found() -> Response<ResponseBody> {
    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .body(full_body(Bytes::from_static(b"not found")))
        .expect("static response builds")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ProxyUpstream, UpstreamConfig};
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

    fn ctx(path: &str) -> RequestContext {
        RequestContext {
            method: hyper::Method::GET,
            path: path.to_string(),
            query: None,
            headers: HeaderMap::new(),
            client_addr: None,
            body: Bytes::new(),
        }
    }

    #[tokio::test]
    async fn missing_file_is_404() {
        let ep = endpoint("/files");
        let cfg = FileBackendConfig { path: "/nonexistent/dir/xyz".to_string(), enabled: true };
        let c = ctx("/files/missing.txt");
        let resp = handle(&c, &ep, &cfg).await.unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn streams_existing_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("hello.txt");
        tokio::fs::write(&file_path, b"hello world").await.unwrap();

        let ep = endpoint("/files");
        let cfg =
            FileBackendConfig { path: dir.path().to_string_lossy().into_owned(), enabled: true };
        let c = ctx("/files/hello.txt");
        let resp = handle(&c, &ep, &cfg).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let (_, _, body) = crate::context::buffer_response(resp).await.unwrap();
        assert_eq!(&body[..], b"hello world");
    }

    #[tokio::test]
    async fn disabled_backend_yields_no_handler() {
        let ep = endpoint("/files");
        let cfg = FileBackendConfig { path: "/tmp".to_string(), enabled: false };
        let c = ctx("/files/anything");
        assert!(matches!(handle(&c, &ep, &cfg).await, Err(ProxyError::NoHandler)));
    }
}
