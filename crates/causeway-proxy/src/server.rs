//! Connection listener (SPEC_FULL.md §10.M), matching the reference crate's
//! `proxy.rs`: a `TcpListener` accept loop handing each socket to its own
//! spawned `http1::Builder::serve_connection` task, with an optional
//! `rustls` layer in front when `config.ssl == Some(true)`.

use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tokio_rustls::rustls;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::context::{json_response, text_response, RequestContext, ResponseBody};

const DEFAULT_PLAIN_PORT: u16 = 8080;
const DEFAULT_TLS_PORT: u16 = 8443;

pub async fn run(state: Arc<AppState>) -> Result<(), anyhow::Error> {
    let acceptor = build_tls_acceptor(&state)?;
    let default_port = if acceptor.is_some() { DEFAULT_TLS_PORT } else { DEFAULT_PLAIN_PORT };
    let port = state.config.server.port.unwrap_or(default_port);
    let addr: SocketAddr = (std::net::Ipv4Addr::UNSPECIFIED, port).into();

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, tls = acceptor.is_some(), "listening");

    loop {
        let (stream, peer) = listener.accept().await?;
        let state = state.clone();
        let acceptor = acceptor.clone();

        tokio::spawn(async move {
            let result: Result<(), anyhow::Error> = async move {
                match acceptor {
                    Some(acceptor) => {
                        let tls_stream = acceptor.accept(stream).await?;
                        let io = TokioIo::new(tls_stream);
                        http1::Builder::new()
                            .serve_connection(io, service_fn(move |req| handle(state.clone(), peer, req)))
                            .await
                            .map_err(anyhow::Error::from)
                    }
                    None => {
                        let io = TokioIo::new(stream);
                        http1::Builder::new()
                            .serve_connection(io, service_fn(move |req| handle(state.clone(), peer, req)))
                            .await
                            .map_err(anyhow::Error::from)
                    }
                }
            }
            .await;
            if let Err(e) = result {
                error!(error = %e, "connection error");
            }
        });
    }
}

/// Builds the `TlsAcceptor` when `config.ssl == Some(true)`, loading
/// `fullchain.pem`/`privkey.pem` from the process's working directory.
fn build_tls_acceptor(state: &Arc<AppState>) -> Result<Option<TlsAcceptor>, anyhow::Error> {
    if state.config.ssl != Some(true) {
        return Ok(None);
    }
    let certs = load_certs("fullchain.pem")?;
    let key = load_key("privkey.pem")?;
    let server_config = rustls::ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    Ok(Some(TlsAcceptor::from(Arc::new(server_config))))
}

fn load_certs(path: &str) -> Result<Vec<rustls::pki_types::CertificateDer<'static>>, anyhow::Error> {
    let file = File::open(path).map_err(|e| anyhow::anyhow!("opening {path}: {e}"))?;
    let mut reader = BufReader::new(file);
    let certs = rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        anyhow::bail!("no certificates found in {path}");
    }
    Ok(certs)
}

fn load_key(path: &str) -> Result<rustls::pki_types::PrivateKeyDer<'static>, anyhow::Error> {
    let file = File::open(path).map_err(|e| anyhow::anyhow!("opening {path}: {e}"))?;
    let mut reader = BufReader::new(file);
    rustls_pemfile::private_key(&mut reader)?.ok_or_else(|| anyhow::anyhow!("no private key found in {path}"))
}

/// Per-request entry point: monitoring routes are served directly, anything
/// else is buffered into a `RequestContext` and handed to the pipeline.
async fn handle(
    state: Arc<AppState>,
    peer: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<ResponseBody>, hyper::Error> {
    let monitoring = state.config.monitoring.clone().unwrap_or_default();
    if monitoring.enabled {
        if req.uri().path() == monitoring.health_check_path {
            return Ok(text_response(StatusCode::OK, bytes::Bytes::from_static(b"ok")));
        }
        if req.uri().path() == monitoring.metrics_path {
            return Ok(text_response(StatusCode::OK, bytes::Bytes::from(state.metrics.render())));
        }
    }

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let ctx = match RequestContext::from_hyper(req, Some(peer)).await {
        Ok(ctx) => ctx,
        Err(_) => {
            return Ok(json_response(
                StatusCode::BAD_REQUEST,
                &serde_json::json!({ "error": "failed to read request body" }),
            ));
        }
    };

    let endpoint_label = state
        .routing
        .find(&path)
        .ok()
        .map(|entry| {
            entry.endpoint.identifier.clone().unwrap_or_else(|| entry.endpoint.prefix.clone())
        })
        .unwrap_or_else(|| path.clone());

    debug!(%method, %path, endpoint = %endpoint_label, "dispatching request");
    let started = Instant::now();
    let response = match state.pipeline.handle(ctx).await {
        Ok(resp) => resp,
        Err(err) => {
            warn!(%method, %path, error = %err, "request failed");
            err.to_boxed_response()
        }
    };

    state.metrics.record_request(&endpoint_label, response.status().as_u16());
    state.metrics.observe_upstream_latency(&endpoint_label, started.elapsed().as_secs_f64());
    Ok(response)
}
