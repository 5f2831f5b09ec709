//! Shared server state.
//!
//! The dispatcher owns one `ServerState` and hands it to handlers by
//! `Arc`; nothing in the serve path lives in module-level statics.

use std::sync::Arc;

use crate::catalog::{TitleCatalog, UiHooks};
use crate::config::HlinkConfig;
use crate::http::FileCache;
use crate::security::TrustStore;

/// Everything a handler needs: configuration, the collaborator traits,
/// and the two per-run caches.
pub struct ServerState {
    pub config: Arc<HlinkConfig>,
    pub catalog: Arc<dyn TitleCatalog>,
    pub hooks: Arc<dyn UiHooks>,
    pub trust: TrustStore,
    pub cache: FileCache,
}

impl ServerState {
    pub fn new(
        config: Arc<HlinkConfig>,
        catalog: Arc<dyn TitleCatalog>,
        hooks: Arc<dyn UiHooks>,
    ) -> Self {
        Self {
            config,
            catalog,
            hooks,
            trust: TrustStore::new(),
            cache: FileCache::new(),
        }
    }
}
