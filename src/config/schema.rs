//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! daemon. All types derive Serde traits for deserialization from config
//! files, and every field has a default so an empty file is a valid
//! config.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::catalog::{Media, MediaLocation};
use crate::proto::{HTTP_PORT, TRANSACTION_PORT};

/// Root configuration for the hlink daemon.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HlinkConfig {
    /// Shared listener settings.
    pub server: ServerConfig,

    /// Transaction protocol settings.
    pub transaction: TransactionConfig,

    /// Admin HTTP server settings.
    pub http: HttpConfig,

    /// Trust policy for new client addresses.
    pub trust: TrustConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Titles the in-memory catalog is seeded with.
    pub titles: Vec<TitleConfig>,
}

/// Shared listener settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address both listeners bind on (ports are per-protocol).
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".to_string(),
        }
    }
}

/// Transaction protocol settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransactionConfig {
    /// TCP port for the transaction listener.
    pub port: u16,

    /// Per-iteration wait while reading a variable-length body (ms).
    pub read_timeout_ms: u64,

    /// Consecutive empty waits tolerated before a body read is abandoned.
    pub max_idle_reads: u32,

    /// How long a `sleep` command keeps the busy slot occupied (ms).
    pub sleep_hold_ms: u64,
}

impl Default for TransactionConfig {
    fn default() -> Self {
        Self {
            port: TRANSACTION_PORT,
            read_timeout_ms: 250,
            max_idle_reads: 8,
            sleep_hold_ms: 5_000,
        }
    }
}

/// Admin HTTP server settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// TCP port for the HTTP listener.
    pub port: u16,

    /// Static root the admin pages are served from.
    pub root_dir: PathBuf,

    /// Listen backlog. The admin UI serves one operator; keep it small.
    pub backlog: u32,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: HTTP_PORT,
            root_dir: PathBuf::from("www"),
            backlog: 4,
        }
    }
}

/// Trust policy for new client addresses.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrustConfig {
    /// Accept first-contact clients without an interactive prompt.
    pub auto_accept: bool,
}

impl Default for TrustConfig {
    fn default() -> Self {
        Self { auto_accept: true }
    }
}

/// Observability settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Tracing filter, overridable via RUST_LOG.
    pub log_filter: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: "hlink=info".to_string(),
        }
    }
}

/// One catalog seed entry.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TitleConfig {
    /// 64-bit title id.
    pub id: u64,

    /// Display name.
    pub name: String,

    /// Path to installed content, if any. A title without one is known
    /// to the catalog but cannot be launched.
    pub installed: Option<PathBuf>,

    /// Storage medium: "sd" or "nand".
    #[serde(default = "default_media")]
    pub media: String,
}

fn default_media() -> String {
    "sd".to_string()
}

impl TitleConfig {
    /// Resolved media location, when content is installed.
    pub fn location(&self) -> Option<MediaLocation> {
        let path = self.installed.clone()?;
        let media = match self.media.as_str() {
            "nand" => Media::Nand,
            _ => Media::Sd,
        };
        Some(MediaLocation { media, path })
    }
}
