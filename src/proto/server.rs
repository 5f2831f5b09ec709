//! Device-side transaction handling.
//!
//! # Responsibilities
//! - Read and validate the fixed frame header
//! - Dispatch the seven actions against the catalog collaborators
//! - Read variable-length bodies under the bounded retry loop
//!
//! # Design Decisions
//! - Protocol errors answer with an `error` frame and close; they never
//!   take the server down
//! - Lookup failures during `add_queue` are skipped silently; the client
//!   gets `success` for whatever subset resolved
//! - A successful `launch` is terminal for the serve loop: the handler
//!   returns `StopServing` and the hand-off happens outside it
//! - `sleep` keeps holding the busy slot after the socket closes; that
//!   window is the point of the command

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::catalog::{LaunchTarget, TitleCatalog, UiHooks};
use crate::config::TransactionConfig;
use crate::net::state::ServerState;
use crate::proto::frame::{self, Action, Response, HEADER_LEN, MAX_ERROR_MESSAGE};

/// What the dispatcher should do after a handler returns.
#[derive(Debug, PartialEq, Eq)]
pub enum HandlerOutcome {
    /// Keep serving.
    Continue,
    /// Stop the serve loop and hand the process to the launched title.
    StopServing(LaunchTarget),
}

/// Handle one accepted transaction connection end to end.
pub async fn handle_transaction<S: AsyncRead + AsyncWrite + Unpin>(
    mut stream: S,
    peer: SocketAddr,
    state: Arc<ServerState>,
) -> HandlerOutcome {
    let mut header = [0u8; HEADER_LEN];
    if let Err(e) = stream.read_exact(&mut header).await {
        tracing::debug!(peer_addr = %peer, error = %e, "Header read failed");
        return HandlerOutcome::Continue;
    }
    let request = match frame::decode_request(&header) {
        Ok(request) => request,
        Err(_) => {
            send_error(&mut stream, "bad transaction magic").await;
            return HandlerOutcome::Continue;
        }
    };

    match Action::from_byte(request.action) {
        Some(Action::AddQueue) => add_queue(&mut stream, request.size, &state).await,
        Some(Action::Nothing) => {
            send_response(&mut stream, Response::Accept).await;
            HandlerOutcome::Continue
        }
        Some(Action::Launch) => launch(&mut stream, request.size, &state).await,
        Some(Action::Sleep) => sleep_hold(stream, &state).await,
        Some(Action::InstallId) | Some(Action::InstallUrl) | Some(Action::InstallData) => {
            // Reserved actions; nothing behind them yet.
            send_error(&mut stream, "stub").await;
            HandlerOutcome::Continue
        }
        None => {
            send_error(&mut stream, "unknown action").await;
            HandlerOutcome::Continue
        }
    }
}

async fn add_queue<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    size: u32,
    state: &ServerState,
) -> HandlerOutcome {
    if size % 8 != 0 {
        send_error(stream, "queue body must be a multiple of 8 bytes").await;
        return HandlerOutcome::Continue;
    }
    let body = match read_body(stream, size as usize, &state.config.transaction).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(error = %e, "Queue body read failed");
            return HandlerOutcome::Continue;
        }
    };

    let mut added = 0usize;
    for chunk in body.chunks_exact(8) {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(chunk);
        let id = u64::from_be_bytes(raw);
        match state.catalog.lookup(id) {
            Some(title) => {
                state.catalog.enqueue(title);
                added += 1;
            }
            None => {
                tracing::debug!(
                    title_id = %format_args!("{:#018x}", id),
                    "Lookup failed, skipping"
                );
            }
        }
    }
    state
        .hooks
        .disp_req(&format!("added {} title(s) to the install queue", added));
    send_response(stream, Response::Success).await;
    HandlerOutcome::Continue
}

async fn launch<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    size: u32,
    state: &ServerState,
) -> HandlerOutcome {
    if size != 8 {
        send_error(stream, "launch body must be exactly 8 bytes").await;
        return HandlerOutcome::Continue;
    }
    let body = match read_body(stream, 8, &state.config.transaction).await {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(error = %e, "Launch body read failed");
            return HandlerOutcome::Continue;
        }
    };
    let mut raw = [0u8; 8];
    raw.copy_from_slice(&body);
    let id = u64::from_be_bytes(raw);

    let location = state
        .catalog
        .media_location(id)
        .filter(|loc| state.catalog.exists(loc));
    match location {
        Some(location) => {
            send_response(stream, Response::Success).await;
            HandlerOutcome::StopServing(LaunchTarget { id, location })
        }
        None => {
            send_response(stream, Response::NotFound).await;
            state
                .hooks
                .disp_error(&format!("title {:#018x} is not installed", id));
            HandlerOutcome::Continue
        }
    }
}

/// Reply `success`, close the socket, then keep the busy slot occupied
/// for the configured hold interval.
async fn sleep_hold<S: AsyncRead + AsyncWrite + Unpin>(
    mut stream: S,
    state: &ServerState,
) -> HandlerOutcome {
    send_response(&mut stream, Response::Success).await;
    drop(stream);
    tokio::time::sleep(Duration::from_millis(state.config.transaction.sleep_hold_ms)).await;
    HandlerOutcome::Continue
}

/// Read exactly `len` body bytes under the bounded retry loop: each
/// iteration waits at most the configured timeout, and a run of
/// consecutive empty waits abandons the read.
pub(crate) async fn read_body<S: AsyncRead + Unpin>(
    stream: &mut S,
    len: usize,
    config: &TransactionConfig,
) -> std::io::Result<Vec<u8>> {
    let timeout = Duration::from_millis(config.read_timeout_ms);
    let mut body = vec![0u8; len];
    let mut filled = 0;
    let mut idle = 0u32;
    while filled < len {
        match tokio::time::timeout(timeout, stream.read(&mut body[filled..])).await {
            Err(_) => {
                idle += 1;
                if idle >= config.max_idle_reads {
                    return Err(std::io::Error::new(
                        std::io::ErrorKind::TimedOut,
                        "body read stalled",
                    ));
                }
            }
            Ok(Ok(0)) => {
                return Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed mid-body",
                ));
            }
            Ok(Ok(n)) => {
                filled += n;
                idle = 0;
            }
            Ok(Err(e)) => return Err(e),
        }
    }
    Ok(body)
}

async fn send_response<S: AsyncWrite + Unpin>(stream: &mut S, resp: Response) {
    if let Err(e) = stream.write_all(&frame::encode_response(resp, 0)).await {
        tracing::debug!(error = %e, "Response write failed");
    }
}

/// Reply `error` with a message, truncated to the protocol cap.
async fn send_error<S: AsyncWrite + Unpin>(stream: &mut S, msg: &str) {
    let msg = &msg.as_bytes()[..msg.len().min(MAX_ERROR_MESSAGE)];
    let header = frame::encode_response(Response::Error, msg.len() as u32);
    let write = async {
        stream.write_all(&header).await?;
        stream.write_all(msg).await
    };
    if let Err(e) = write.await {
        tracing::debug!(error = %e, "Error response write failed");
    }
}
