//! Accept loop over both protocol listeners.
//!
//! # Responsibilities
//! - Bind the transaction and HTTP listeners
//! - Refuse connections while the single worker slot is occupied
//! - Trust-gate client addresses before any handler runs
//! - Stop serving on a launch hand-off or when the serve predicate clears
//!
//! # Design Decisions
//! - Busy and untrusted replies go out on detached tasks; the refused
//!   connection is never read from and the loop never blocks on it
//! - The loop wakes at least once a second to re-check the serve
//!   predicate while idle
//! - Bind failures are reported through the operator callback once and
//!   are fatal; accept failures are reported and the loop carries on

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpSocket, TcpStream};

use crate::catalog::{LaunchTarget, UiHooks};
use crate::http;
use crate::http::content;
use crate::http::HttpConnection;
use crate::net::executor::SingleSlot;
use crate::net::state::ServerState;
use crate::proto::frame::{encode_response, Response};
use crate::proto::server::handle_transaction;
use crate::proto::HandlerOutcome;

/// Idle wake-up interval for the serve-predicate check.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Backlog for the transaction listener. The HTTP backlog comes from
/// config.
const TRANSACTION_BACKLOG: u32 = 16;

/// Error starting the serve loop.
#[derive(Debug)]
pub enum ServeError {
    /// Failed to bind a listener.
    Bind(std::io::Error),
}

impl std::fmt::Display for ServeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServeError::Bind(e) => write!(f, "Failed to bind: {}", e),
        }
    }
}

impl std::error::Error for ServeError {}

/// Which listener a connection arrived on.
#[derive(Debug, Clone, Copy)]
enum Proto {
    Transaction,
    Http,
}

/// Owns both listeners, the worker slot, and the shared state.
pub struct Dispatcher {
    state: Arc<ServerState>,
    transaction: TcpListener,
    http: TcpListener,
    slot: SingleSlot,
}

impl Dispatcher {
    /// Bind both listeners. A failure is reported through the operator
    /// callback and returned; there is no retry.
    pub async fn bind(state: Arc<ServerState>) -> Result<Self, ServeError> {
        let config = &state.config;
        let transaction = listen(
            &config.server.bind_address,
            config.transaction.port,
            TRANSACTION_BACKLOG,
        )
        .map_err(|e| {
            state
                .hooks
                .disp_error(&format!("could not bind the transaction listener: {}", e));
            ServeError::Bind(e)
        })?;
        let http = listen(&config.server.bind_address, config.http.port, config.http.backlog)
            .map_err(|e| {
                state
                    .hooks
                    .disp_error(&format!("could not bind the http listener: {}", e));
                ServeError::Bind(e)
            })?;

        tracing::info!(
            transaction_addr = %transaction.local_addr().map(|a| a.to_string()).unwrap_or_default(),
            http_addr = %http.local_addr().map(|a| a.to_string()).unwrap_or_default(),
            "Listeners bound"
        );

        Ok(Self {
            state,
            transaction,
            http,
            slot: SingleSlot::new(),
        })
    }

    pub fn transaction_addr(&self) -> std::io::Result<SocketAddr> {
        self.transaction.local_addr()
    }

    pub fn http_addr(&self) -> std::io::Result<SocketAddr> {
        self.http.local_addr()
    }

    /// Serve until a handler requests the launch hand-off (returning its
    /// target) or the serve predicate clears (returning `None`). Both
    /// listening sockets close when this returns.
    pub async fn run(mut self) -> Option<LaunchTarget> {
        self.state.hooks.on_server_create();
        loop {
            tokio::select! {
                outcome = self.slot.join_next(), if self.slot.has_task() => {
                    self.state.hooks.on_server_create();
                    if let HandlerOutcome::StopServing(target) = outcome {
                        tracing::info!("Launch hand-off requested, stopping");
                        return Some(target);
                    }
                }
                result = self.transaction.accept() => match result {
                    Ok((stream, peer)) => {
                        if let Some(target) = self.dispatch(Proto::Transaction, stream, peer).await {
                            return Some(target);
                        }
                    }
                    Err(e) => self
                        .state
                        .hooks
                        .disp_error(&format!("transaction accept failed: {}", e)),
                },
                result = self.http.accept() => match result {
                    Ok((stream, peer)) => {
                        if let Some(target) = self.dispatch(Proto::Http, stream, peer).await {
                            return Some(target);
                        }
                    }
                    Err(e) => self
                        .state
                        .hooks
                        .disp_error(&format!("http accept failed: {}", e)),
                },
                _ = tokio::time::sleep(POLL_INTERVAL) => {
                    if !self.slot.has_task() && !self.state.hooks.keep_running() {
                        tracing::info!("Serve predicate cleared, stopping");
                        return None;
                    }
                }
            }
        }
    }

    /// Gate one accepted connection and hand it to the worker slot.
    async fn dispatch(
        &mut self,
        proto: Proto,
        stream: TcpStream,
        peer: SocketAddr,
    ) -> Option<LaunchTarget> {
        // Settle a finished worker first so its outcome cannot be lost
        // to the race between accept readiness and worker completion.
        if self.slot.has_task() && !self.slot.is_busy() {
            let outcome = self.slot.join_next().await;
            self.state.hooks.on_server_create();
            if let HandlerOutcome::StopServing(target) = outcome {
                return Some(target);
            }
        }

        if self.slot.is_busy() {
            tracing::debug!(peer_addr = %peer, protocol = ?proto, "Busy, refusing connection");
            self.reply_busy(proto, stream, peer);
            return None;
        }

        let client_ip = match peer.ip() {
            IpAddr::V4(v4) => v4,
            IpAddr::V6(_) => {
                tracing::warn!(peer_addr = %peer, "Rejecting non-IPv4 peer");
                return None;
            }
        };
        if !self.state.trust.check(client_ip, &*self.state.hooks) {
            tracing::info!(peer_addr = %peer, "Untrusted client rejected");
            self.reply_untrusted(proto, stream, peer);
            return None;
        }

        let state = Arc::clone(&self.state);
        let previous = match proto {
            Proto::Transaction => {
                self.slot.submit(handle_transaction(stream, peer, state)).await
            }
            Proto::Http => self.slot.submit(http::handle(stream, peer, state)).await,
        };
        match previous {
            Some(HandlerOutcome::StopServing(target)) => Some(target),
            _ => None,
        }
    }

    /// Refuse a connection while the slot is occupied, without reading
    /// from it.
    fn reply_busy(&self, proto: Proto, stream: TcpStream, peer: SocketAddr) {
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            match proto {
                Proto::Transaction => {
                    let mut stream = stream;
                    if let Err(e) = stream.write_all(&encode_response(Response::Busy, 0)).await {
                        tracing::debug!(peer_addr = %peer, error = %e, "Busy reply failed");
                    }
                }
                Proto::Http => {
                    let mut conn = HttpConnection::new(stream, peer);
                    if let Err(e) = content::serve_busy(&mut conn, &state).await {
                        tracing::debug!(peer_addr = %peer, error = %e, "Busy page failed");
                    }
                }
            }
        });
    }

    /// Turn away an address the operator declined.
    fn reply_untrusted(&self, proto: Proto, stream: TcpStream, peer: SocketAddr) {
        tokio::spawn(async move {
            match proto {
                Proto::Transaction => {
                    let mut stream = stream;
                    if let Err(e) =
                        stream.write_all(&encode_response(Response::Untrusted, 0)).await
                    {
                        tracing::debug!(peer_addr = %peer, error = %e, "Untrusted reply failed");
                    }
                }
                Proto::Http => {
                    let mut conn = HttpConnection::new(stream, peer);
                    if let Err(e) = content::forbidden(&mut conn).await {
                        tracing::debug!(peer_addr = %peer, error = %e, "Forbidden page failed");
                    }
                }
            }
        });
    }
}

/// Bind a listener with an explicit backlog.
fn listen(bind_address: &str, port: u16, backlog: u32) -> std::io::Result<TcpListener> {
    let addr: SocketAddr = format!("{}:{}", bind_address, port)
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
    let socket = if addr.is_ipv4() {
        TcpSocket::new_v4()?
    } else {
        TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    socket.listen(backlog)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{Media, MediaLocation, MemoryCatalog, PolicyHooks, TitleCatalog, TitleMeta};
    use crate::config::HlinkConfig;
    use crate::proto::client::{ClientError, TransactionClient};
    use tokio::io::AsyncReadExt;
    use tokio::task::JoinHandle;

    fn seeded_catalog() -> Arc<MemoryCatalog> {
        let catalog = MemoryCatalog::new();
        catalog.insert(
            TitleMeta { id: 0x1001, name: "First".into() },
            Some(MediaLocation { media: Media::Sd, path: "/title/1001".into() }),
        );
        catalog.insert(TitleMeta { id: 0x1002, name: "Second".into() }, None);
        Arc::new(catalog)
    }

    struct Server {
        transaction_addr: SocketAddr,
        http_addr: SocketAddr,
        catalog: Arc<MemoryCatalog>,
        hooks: Arc<PolicyHooks>,
        run: JoinHandle<Option<LaunchTarget>>,
        _root: tempfile::TempDir,
    }

    async fn start(auto_accept: bool, sleep_hold_ms: u64) -> Server {
        let root = tempfile::tempdir().unwrap();
        std::fs::write(root.path().join("index.html"), b"<html>admin</html>").unwrap();
        std::fs::write(root.path().join("busy.html"), b"<html>console busy</html>").unwrap();
        std::fs::write(
            root.path().join("queue.tpl"),
            b"[[if queue-empty?]]<p>queue empty</p>[[else]]<ul>[[foreach t in queue-names]]<li>[t]</li>[[end]]</ul>[[end]]",
        )
        .unwrap();
        std::fs::write(root.path().join("broken.tpl"), b"[unknown]").unwrap();

        let mut config = HlinkConfig::default();
        config.server.bind_address = "127.0.0.1".into();
        config.transaction.port = 0;
        config.http.port = 0;
        config.transaction.sleep_hold_ms = sleep_hold_ms;
        config.http.root_dir = root.path().to_path_buf();

        let catalog = seeded_catalog();
        let hooks = Arc::new(PolicyHooks::new(auto_accept));
        let state = Arc::new(ServerState::new(
            Arc::new(config),
            Arc::clone(&catalog) as Arc<dyn TitleCatalog>,
            Arc::clone(&hooks) as Arc<dyn crate::catalog::UiHooks>,
        ));

        let dispatcher = Dispatcher::bind(state).await.unwrap();
        let transaction_addr = dispatcher.transaction_addr().unwrap();
        let http_addr = dispatcher.http_addr().unwrap();
        let run = tokio::spawn(dispatcher.run());

        Server {
            transaction_addr,
            http_addr,
            catalog,
            hooks,
            run,
            _root: root,
        }
    }

    async fn client(server: &Server) -> TransactionClient {
        TransactionClient::connect(&server.transaction_addr.to_string())
            .await
            .unwrap()
    }

    async fn http_get(addr: SocketAddr, path: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(format!("GET {} HTTP/1.1\r\nHost: console\r\n\r\n", path).as_bytes())
            .await
            .unwrap();
        let mut out = Vec::new();
        stream.read_to_end(&mut out).await.unwrap();
        String::from_utf8_lossy(&out).into_owned()
    }

    #[tokio::test]
    async fn test_auth_then_add_queue() {
        let server = start(true, 5_000).await;
        let client = client(&server).await;

        client.auth().await.unwrap();
        client.add_queue(&[0x1001, 0x1002]).await.unwrap();

        let ids: Vec<u64> = server.catalog.queued().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![0x1001, 0x1002]);
        server.run.abort();
    }

    #[tokio::test]
    async fn test_untrusted_client_gets_untrusted() {
        let server = start(false, 5_000).await;
        let client = client(&server).await;

        assert!(matches!(
            client.auth().await,
            Err(ClientError::NotAuthenticated)
        ));
        // The cached decision rejects again without a second prompt.
        assert!(matches!(
            client.auth().await,
            Err(ClientError::NotAuthenticated)
        ));
        server.run.abort();
    }

    #[tokio::test]
    async fn test_launch_ends_the_serve_loop() {
        let server = start(true, 5_000).await;
        let client = client(&server).await;

        client.launch(0x1001).await.unwrap();
        let target = server.run.await.unwrap().expect("launch target");
        assert_eq!(target.id, 0x1001);
    }

    #[tokio::test]
    async fn test_http_not_found_page() {
        let server = start(true, 5_000).await;
        let reply = http_get(server.http_addr, "/missing.html").await;

        assert!(reply.starts_with("HTTP/1.1 404 Not Found"));
        assert!(reply.contains("The requested resource /missing.html could not be found"));
        server.run.abort();
    }

    #[tokio::test]
    async fn test_http_serves_static_index() {
        let server = start(true, 5_000).await;
        let reply = http_get(server.http_addr, "/").await;

        assert!(reply.starts_with("HTTP/1.1 200 OK"));
        assert!(reply.contains("<html>admin</html>"));
        server.run.abort();
    }

    #[tokio::test]
    async fn test_http_renders_template_page() {
        let server = start(true, 5_000).await;
        let client = client(&server).await;
        client.auth().await.unwrap();
        client.add_queue(&[0x1001]).await.unwrap();

        let reply = http_get(server.http_addr, "/queue").await;
        assert!(reply.starts_with("HTTP/1.1 200 OK"));
        assert!(reply.contains("Transfer-Encoding: chunked"));
        assert!(reply.contains("<li>First</li>"));
        server.run.abort();
    }

    #[tokio::test]
    async fn test_http_template_failure_reports_code() {
        let server = start(true, 5_000).await;
        let reply = http_get(server.http_addr, "/broken").await;

        assert!(reply.starts_with("HTTP/1.1 500 Internal Server Error"));
        // Unknown symbol renders as failure code 3.
        assert!(reply.contains("code 3"));
        server.run.abort();
    }

    #[tokio::test]
    async fn test_busy_window_refuses_both_protocols() {
        let server = start(true, 2_000).await;
        let client = client(&server).await;

        // sleep replies success, then the worker holds the slot.
        client.sleep().await.unwrap();

        assert!(matches!(client.auth().await, Err(ClientError::Busy)));
        let reply = http_get(server.http_addr, "/").await;
        assert!(reply.starts_with("HTTP/1.1 429 Too Many Requests"));
        assert!(reply.contains("console busy"));
        server.run.abort();
    }

    #[tokio::test]
    async fn test_serve_predicate_stops_the_loop() {
        let server = start(true, 5_000).await;
        server
            .hooks
            .serving_flag()
            .store(false, std::sync::atomic::Ordering::SeqCst);

        let stopped = tokio::time::timeout(Duration::from_secs(5), server.run)
            .await
            .expect("loop should stop within the poll interval")
            .unwrap();
        assert_eq!(stopped, None);
    }
}
