//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted connection:
//!     → trust.rs (per-address operator decision, cached for the run)
//!     → Pass to the protocol handler, or reject
//! ```
//!
//! # Design Decisions
//! - LAN-trust model: the operator's first-contact decision is the whole
//!   gate; there is no TLS and no credential exchange
//! - Fail closed: a declined address stays declined until restart

pub mod trust;

pub use trust::TrustStore;
