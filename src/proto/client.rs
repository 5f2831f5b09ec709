//! Host-side transaction client.
//!
//! # Responsibilities
//! - Resolve the console address (IPv4 only)
//! - Open one fresh TCP connection per call, send a frame, map the
//!   response to a typed error
//!
//! # Design Decisions
//! - `auth()` treats every response except `busy` and `untrusted` as
//!   success; it exists to surface the trust prompt, not to gate state
//! - Error-message bodies over the 100 byte cap are not read at all

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::proto::frame::{
    decode_response, encode_request, Action, FrameError, Response, HEADER_LEN, MAX_ERROR_MESSAGE,
};
use crate::proto::TRANSACTION_PORT;

/// Most ids one `add_queue` call will encode.
pub const MAX_QUEUE_IDS: usize = 64;

/// Client-side transaction failures.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("could not resolve {0} to an IPv4 address")]
    Resolve(String),
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),
    #[error("the console is busy, try again later")]
    Busy,
    #[error("not authenticated: the console declined to trust this host")]
    NotAuthenticated,
    #[error("the title was not found on the console")]
    NotFound,
    #[error("console error: {0}")]
    Server(String),
    #[error("console error message exceeds the 100 byte limit")]
    MessageTooLong,
    #[error("malformed response frame: {0}")]
    Frame(#[from] FrameError),
    #[error("add-queue accepts at most 64 ids per call")]
    TooManyIds,
}

/// A resolved console address. Every operation dials its own
/// short-lived connection; there is no session to keep alive.
pub struct TransactionClient {
    addr: SocketAddr,
}

impl TransactionClient {
    /// Resolve a console address. A bare host gets the well-known
    /// transaction port appended; only IPv4 results are accepted.
    pub async fn connect(address: &str) -> Result<Self, ClientError> {
        let lookup = if address.contains(':') {
            address.to_string()
        } else {
            format!("{}:{}", address, TRANSACTION_PORT)
        };
        let addr = tokio::net::lookup_host(&lookup)
            .await
            .map_err(|_| ClientError::Resolve(address.to_string()))?
            .find(SocketAddr::is_ipv4)
            .ok_or_else(|| ClientError::Resolve(address.to_string()))?;
        Ok(Self { addr })
    }

    pub fn address(&self) -> SocketAddr {
        self.addr
    }

    /// Authenticate with the console: sends `nothing` so the device
    /// runs its trust prompt. Transport failures surface as-is.
    pub async fn auth(&self) -> Result<(), ClientError> {
        match self.call(Action::Nothing, &[]).await {
            Err(e @ (ClientError::Busy | ClientError::NotAuthenticated)) => Err(e),
            Err(e @ (ClientError::Io(_) | ClientError::Frame(_))) => Err(e),
            // Any other answer means the console talked to us.
            _ => Ok(()),
        }
    }

    /// Enqueue titles by id, big-endian u64 each.
    pub async fn add_queue(&self, ids: &[u64]) -> Result<(), ClientError> {
        if ids.len() > MAX_QUEUE_IDS {
            return Err(ClientError::TooManyIds);
        }
        let mut body = Vec::with_capacity(ids.len() * 8);
        for id in ids {
            body.extend_from_slice(&id.to_be_bytes());
        }
        self.call(Action::AddQueue, &body).await
    }

    /// Launch an installed title by id.
    pub async fn launch(&self, title_id: u64) -> Result<(), ClientError> {
        self.call(Action::Launch, &title_id.to_be_bytes()).await
    }

    /// Put the console to sleep.
    pub async fn sleep(&self) -> Result<(), ClientError> {
        self.call(Action::Sleep, &[]).await
    }

    /// One transaction: dial, send the frame, read and map the response.
    async fn call(&self, action: Action, body: &[u8]) -> Result<(), ClientError> {
        tracing::debug!(
            console = %self.addr,
            action = ?action,
            body_len = body.len(),
            "Transaction"
        );
        let mut stream = TcpStream::connect(self.addr).await?;
        stream.write_all(&encode_request(action, body.len() as u32)).await?;
        if !body.is_empty() {
            stream.write_all(body).await?;
        }

        let mut header = [0u8; HEADER_LEN];
        stream.read_exact(&mut header).await?;
        let (resp, size) = decode_response(&header)?;
        match resp {
            Response::Accept | Response::Success => Ok(()),
            Response::Busy => Err(ClientError::Busy),
            Response::Untrusted => Err(ClientError::NotAuthenticated),
            Response::NotFound => Err(ClientError::NotFound),
            Response::Error => {
                if size as usize > MAX_ERROR_MESSAGE {
                    return Err(ClientError::MessageTooLong);
                }
                let mut msg = vec![0u8; size as usize];
                stream.read_exact(&mut msg).await?;
                Err(ClientError::Server(String::from_utf8_lossy(&msg).into_owned()))
            }
        }
    }
}
