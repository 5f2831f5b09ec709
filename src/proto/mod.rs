//! The hlink transaction protocol.
//!
//! # Data Flow
//! ```text
//! Host tool (hlink binary)
//!     → client.rs (one TCP connection per call)
//!     → frame.rs (8-byte header + optional body)
//!     → server.rs (action dispatch on the device)
//!     → Response frame back to the host
//! ```
//!
//! # Design Decisions
//! - One short-lived TCP connection per transaction; no session state
//! - Frames are encoded/decoded explicitly over byte slices, never by
//!   reinterpreting packed structs
//! - The server never retries a command; recovery is the client's call

pub mod client;
pub mod frame;
pub mod server;

pub use client::{ClientError, TransactionClient};
pub use frame::{Action, FrameError, Response, HEADER_LEN, MAGIC, MAX_ERROR_MESSAGE};
pub use server::HandlerOutcome;

/// Well-known TCP port for the transaction protocol.
pub const TRANSACTION_PORT: u16 = 37283;

/// Well-known TCP port for the admin HTTP server.
pub const HTTP_PORT: u16 = 37284;
