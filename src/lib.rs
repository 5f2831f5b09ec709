//! hlink — LAN remote control for a handheld content client.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌────────────────────────────────────────────────┐
//!                    │                 HLINK DAEMON                    │
//!                    │                                                 │
//!   Host tool        │  ┌──────────┐   ┌──────────┐   ┌────────────┐  │
//!   ───────────────────▶│   net    │──▶│  proto   │──▶│  catalog   │  │
//!   (binary frames)  │  │dispatcher│   │ server   │   │ (queue,    │  │
//!                    │  └────┬─────┘   └──────────┘   │  launch)   │  │
//!                    │       │                        └────────────┘  │
//!   Browser          │       │         ┌──────────┐   ┌────────────┐  │
//!   ───────────────────▶ (same gate) ─▶│   http   │──▶│  template  │  │
//!   (admin pages)    │                 │ engine   │   │  engine    │  │
//!                    │                 └──────────┘   └────────────┘  │
//!                    │                                                 │
//!                    │  ┌────────────────────────────────────────────┐│
//!                    │  │           Cross-Cutting Concerns           ││
//!                    │  │  ┌────────┐ ┌─────────┐ ┌───────────────┐  ││
//!                    │  │  │ config │ │security │ │ observability │  ││
//!                    │  │  │        │ │ (trust) │ │   (tracing)   │  ││
//!                    │  │  └────────┘ └─────────┘ └───────────────┘  ││
//!                    │  └────────────────────────────────────────────┘│
//!                    └────────────────────────────────────────────────┘
//! ```
//!
//! Both listeners share one worker slot: at most one transaction or HTTP
//! handler executes at any instant, and everyone else hears "busy".

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod proto;
pub mod template;

// Collaborator boundary
pub mod catalog;

// Cross-cutting concerns
pub mod observability;
pub mod security;
