//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via tracing)
//!
//! Consumers:
//!     → stdout (pretty format), filtered per config or RUST_LOG
//! ```
//!
//! # Design Decisions
//! - Structured fields over string interpolation
//! - RUST_LOG wins over the configured filter so a debug session never
//!   needs a config edit

pub mod logging;

pub use logging::init_logging;
