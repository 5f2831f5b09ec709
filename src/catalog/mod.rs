//! Collaborator boundary toward the content client.
//!
//! # Data Flow
//! ```text
//! proto::server / net::dispatcher
//!     → TitleCatalog (lookup, queue, media resolution, launch)
//!     → UiHooks (trust prompt, operator notifications)
//!
//! The real device wires these to its catalog database and on-screen UI;
//! this crate ships an in-memory catalog and a policy-driven hooks
//! implementation for the standalone daemon and the tests.
//! ```
//!
//! # Design Decisions
//! - Everything past this boundary is a trait object; the protocol core
//!   never sees how titles are stored or how the operator is prompted
//! - The launch primitive runs after the serve loop has returned, never
//!   inside a handler

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;

/// Metadata for an installable title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TitleMeta {
    pub id: u64,
    pub name: String,
}

/// Storage medium a title resolves to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Media {
    Sd,
    Nand,
}

impl std::fmt::Display for Media {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Media::Sd => write!(f, "sd"),
            Media::Nand => write!(f, "nand"),
        }
    }
}

/// Resolved location of installed title content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaLocation {
    pub media: Media,
    pub path: PathBuf,
}

/// The resolved launch request carried out of the serve loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchTarget {
    pub id: u64,
    pub location: MediaLocation,
}

/// Error from the launch primitive.
#[derive(Debug, thiserror::Error)]
#[error("failed to launch title {id:#018x}: {reason}")]
pub struct LaunchError {
    pub id: u64,
    pub reason: String,
}

/// Title catalog operations the protocol core consumes.
pub trait TitleCatalog: Send + Sync {
    /// Look up title metadata by numeric id.
    fn lookup(&self, id: u64) -> Option<TitleMeta>;

    /// Append a resolved title to the install queue.
    fn enqueue(&self, title: TitleMeta);

    /// Snapshot of the install queue, in append order.
    fn queued(&self) -> Vec<TitleMeta>;

    /// Resolve the media location for an installed title.
    fn media_location(&self, id: u64) -> Option<MediaLocation>;

    /// Verify that content actually exists at a resolved location.
    fn exists(&self, location: &MediaLocation) -> bool;

    /// Hand control to the title. On the device this does not return;
    /// callers must treat success as terminal.
    fn launch(&self, target: &LaunchTarget) -> Result<(), LaunchError>;
}

/// Operator UI callbacks the protocol core consumes.
pub trait UiHooks: Send + Sync {
    /// Ask the operator whether to trust a new client address.
    fn on_requester(&self, addr: Ipv4Addr) -> bool;

    /// Show an error to the operator. Fire-and-forget.
    fn disp_error(&self, msg: &str);

    /// Show a status notification to the operator. Fire-and-forget.
    fn disp_req(&self, msg: &str);

    /// The server went from idle to listening.
    fn on_server_create(&self);

    /// External serve predicate, polled while idle.
    fn keep_running(&self) -> bool;
}

/// In-memory catalog backing the standalone daemon and the tests.
#[derive(Default)]
pub struct MemoryCatalog {
    titles: DashMap<u64, TitleMeta>,
    installed: DashMap<u64, MediaLocation>,
    queue: Mutex<Vec<TitleMeta>>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a known title, optionally with installed content.
    pub fn insert(&self, title: TitleMeta, location: Option<MediaLocation>) {
        if let Some(loc) = location {
            self.installed.insert(title.id, loc);
        }
        self.titles.insert(title.id, title);
    }
}

impl TitleCatalog for MemoryCatalog {
    fn lookup(&self, id: u64) -> Option<TitleMeta> {
        self.titles.get(&id).map(|t| t.value().clone())
    }

    fn enqueue(&self, title: TitleMeta) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.push(title);
        }
    }

    fn queued(&self) -> Vec<TitleMeta> {
        self.queue.lock().map(|q| q.clone()).unwrap_or_default()
    }

    fn media_location(&self, id: u64) -> Option<MediaLocation> {
        self.installed.get(&id).map(|l| l.value().clone())
    }

    fn exists(&self, location: &MediaLocation) -> bool {
        self.installed.iter().any(|entry| entry.value() == location)
    }

    fn launch(&self, target: &LaunchTarget) -> Result<(), LaunchError> {
        tracing::info!(
            title_id = %format_args!("{:#018x}", target.id),
            media = %target.location.media,
            "Launching title"
        );
        Ok(())
    }
}

/// Hooks implementation for the standalone daemon: trust decisions come
/// from a configured policy, notifications go to the log, and the serve
/// predicate is a shared shutdown flag.
pub struct PolicyHooks {
    auto_accept: bool,
    serving: Arc<AtomicBool>,
}

impl PolicyHooks {
    pub fn new(auto_accept: bool) -> Self {
        Self {
            auto_accept,
            serving: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Shared flag observed by `keep_running`; clear it to stop serving.
    pub fn serving_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.serving)
    }
}

impl UiHooks for PolicyHooks {
    fn on_requester(&self, addr: Ipv4Addr) -> bool {
        tracing::info!(
            peer_addr = %addr,
            accepted = self.auto_accept,
            "Trust decision for new client"
        );
        self.auto_accept
    }

    fn disp_error(&self, msg: &str) {
        tracing::error!(message = msg, "Operator notification");
    }

    fn disp_req(&self, msg: &str) {
        tracing::info!(message = msg, "Operator notification");
    }

    fn on_server_create(&self) {
        tracing::debug!("Server listening");
    }

    fn keep_running(&self) -> bool {
        self.serving.load(Ordering::SeqCst)
    }
}
