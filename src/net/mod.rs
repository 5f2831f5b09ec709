//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection (either listener)
//!     → dispatcher.rs (accept loop, busy gate, trust gate)
//!     → executor.rs (single worker slot)
//!     → proto::server or http handler
//!
//! Connection fates:
//!     Busy slot   → busy frame / 429 page, never read
//!     Untrusted   → untrusted frame / 403 page
//!     Trusted     → one worker runs the handler to completion
//! ```
//!
//! # Design Decisions
//! - One worker at a time across both protocols; the slot, not a
//!   convention, enforces it
//! - The dispatcher never blocks past its poll interval; all handler
//!   I/O happens on the worker

pub mod dispatcher;
pub mod executor;
pub mod state;

pub use dispatcher::{Dispatcher, ServeError};
pub use executor::SingleSlot;
pub use state::ServerState;
