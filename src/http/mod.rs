//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection (dispatched by net)
//!     → connection.rs (buffered parse: request line, query, headers)
//!     → content.rs (path resolution against the static root)
//!     → cache.rs (process-lifetime file bytes)
//!     → template (for .tpl pages)
//!     → connection.rs (status line, Content-Length or chunked body)
//! ```
//!
//! # Design Decisions
//! - One request per connection; the server closes after responding
//! - Everything the operator browses is a file under the static root;
//!   the only dynamic content is template output

pub mod cache;
pub mod connection;
pub mod content;
pub mod response;

pub use cache::FileCache;
pub use connection::{HttpConnection, ParseError, Request};

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};

use crate::net::state::ServerState;
use crate::proto::HandlerOutcome;

/// Handle one accepted HTTP connection end to end.
pub async fn handle<S: AsyncRead + AsyncWrite + Unpin>(
    stream: S,
    peer: SocketAddr,
    state: Arc<ServerState>,
) -> HandlerOutcome {
    let mut conn = HttpConnection::new(stream, peer);
    match conn.parse_request().await {
        Ok(req) => {
            tracing::debug!(
                peer_addr = %peer,
                method = %req.method,
                path = %req.path,
                "HTTP request"
            );
            if let Err(e) = content::serve(&mut conn, &req, &state).await {
                tracing::debug!(peer_addr = %peer, error = %e, "Response write failed");
            }
        }
        Err(e) => {
            tracing::debug!(peer_addr = %peer, error = %e, "Bad request");
            if let Err(e) = content::bad_request(&mut conn).await {
                tracing::debug!(peer_addr = %peer, error = %e, "Response write failed");
            }
        }
    }
    if let Err(e) = conn.flush().await {
        tracing::debug!(peer_addr = %peer, error = %e, "Flush failed");
    }
    HandlerOutcome::Continue
}
