//! Command backend (SPEC_FULL.md §4.K): spawns the per-OS-resolved command
//! in a pseudo-terminal and streams its combined stdout/stderr to the client
//! as `application/octet-stream`, appending a `[exit <rc>]` terminator line.
//!
//! The PTY pump runs on its own blocking thread and feeds chunks to the
//! client through a bounded channel as they arrive — the response is built
//! and returned as soon as the first chunk (or the pump's end-of-output)
//! shows up, not after the command finishes. `timeout` bounds how long we
//! wait for each chunk; exceeding it before anything has been sent yields
//! `408`, and exceeding it mid-stream just ends the stream early.

use std::io::Read;
use std::time::Duration;

use bytes::Bytes;
use hyper::{Response, StatusCode};
use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::config::CommandBackend;
use crate::context::{stream_body, BoxError, RequestContext, ResponseBody};
use crate::error::ProxyError;

const READ_CHUNK_SIZE: usize = 8192;

#[derive(serde::Deserialize, Default)]
struct CommandBody {
    #[serde(default)]
    args: Vec<String>,
}

pub async fn handle(
    ctx: &RequestContext,
    cfg: &CommandBackend,
) -> Result<Response<ResponseBody>, ProxyError> {
    let base = cfg.resolve();
    if base.trim().is_empty() {
        return Err(ProxyError::NoHandler);
    }

    let extra_args: Vec<String> = if ctx.body.is_empty() {
        Vec::new()
    } else {
        serde_json::from_slice::<CommandBody>(&ctx.body).map(|b| b.args).unwrap_or_default()
    };

    let mut parts = base.split_whitespace();
    let program = parts.next().unwrap_or(base).to_string();
    let mut args: Vec<String> = parts.map(|s| s.to_string()).collect();
    args.extend(extra_args);

    let timeout = Duration::from_secs(cfg.timeout_seconds);
    let (tx, mut rx) = mpsc::channel::<Result<Bytes, BoxError>>(32);

    // Detached: the pump sends into `tx` concurrently with us consuming
    // `rx` below, instead of running to completion before we even look at
    // the channel. Dropping the handle doesn't stop the blocking task.
    let _pump = tokio::task::spawn_blocking(move || run_in_pty(&program, &args, tx));

    let deadline = Instant::now() + timeout;
    let first = match tokio::time::timeout_at(deadline, rx.recv()).await {
        Ok(item) => item,
        Err(_) => {
            // Unblocks a pump stuck on `blocking_send` so its thread can exit.
            drop(rx);
            return Response::builder()
                .status(StatusCode::REQUEST_TIMEOUT)
                .body(crate::context::full_body(Bytes::from_static(b"command timed out")))
                .map_err(|e| ProxyError::UpstreamError(e.to_string()));
        }
    };

    let first = match first {
        None => {
            return Response::builder()
                .status(StatusCode::OK)
                .header("content-type", "application/octet-stream")
                .body(crate::context::full_body(Bytes::new()))
                .map_err(|e| ProxyError::UpstreamError(e.to_string()));
        }
        Some(Err(e)) => return Err(ProxyError::UpstreamError(e.to_string())),
        Some(Ok(chunk)) => chunk,
    };

    let stream = futures::stream::unfold(
        (rx, deadline, Some(Ok(first))),
        |(mut rx, deadline, pending)| async move {
            let item = match pending {
                Some(item) => Some(item),
                None => tokio::time::timeout_at(deadline, rx.recv()).await.unwrap_or(None),
            };
            item.map(|item| (item.map(hyper::body::Frame::data), (rx, deadline, None)))
        },
    );

    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "application/octet-stream")
        .body(stream_body(stream))
        .map_err(|e| ProxyError::UpstreamError(e.to_string()))
}

/// Runs synchronously on a blocking thread: opens a PTY, spawns the command,
/// and forwards output chunks to `tx` as they arrive. The PTY reader is a
/// blocking `std::io::Read`, hence the dedicated thread. Setup failures are
/// sent through `tx` as an error item rather than returned, since by the
/// time this runs the caller has already stopped awaiting this function
/// directly and is instead reading from the channel.
fn run_in_pty(program: &str, args: &[String], tx: mpsc::Sender<Result<Bytes, BoxError>>) {
    if let Err(e) = run_in_pty_inner(program, args, &tx) {
        let _ = tx.blocking_send(Err(e.into()));
    }
}

fn run_in_pty_inner(
    program: &str,
    args: &[String],
    tx: &mpsc::Sender<Result<Bytes, BoxError>>,
) -> Result<(), String> {
    let pty_system = native_pty_system();
    let pair = pty_system
        .openpty(PtySize { rows: 24, cols: 80, pixel_width: 0, pixel_height: 0 })
        .map_err(|e| e.to_string())?;

    let mut cmd = CommandBuilder::new(program);
    cmd.args(args);

    let mut child = pair.slave.spawn_command(cmd).map_err(|e| e.to_string())?;
    drop(pair.slave);

    let mut reader = pair.master.try_clone_reader().map_err(|e| e.to_string())?;
    let mut buf = [0u8; READ_CHUNK_SIZE];
    loop {
        match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                if tx.blocking_send(Ok(Bytes::copy_from_slice(&buf[..n]))).is_err() {
                    break;
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(10));
            }
            Err(_) => break,
        }
    }

    let status = child.wait().map_err(|e| e.to_string())?;
    let rc = status.exit_code();
    let _ = tx.blocking_send(Ok(Bytes::from(format!("\n[exit {rc}]"))));
    Ok(())
}
