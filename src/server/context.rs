//! Application context shared by all request handlers.

use std::sync::Arc;

use sharegate_common::ShareRecord;
use sharegate_db::ShareStore;

use crate::config::Config;
use crate::origin::MediaBackendClient;
use crate::proxy::{PlaylistCache, StreamProxy};

/// Upper bound on cached rewritten playlists.
const PLAYLIST_CACHE_CAPACITY: usize = 1024;

/// Application context shared by all request handlers (via Axum state).
///
/// This is cheaply cloneable because it only holds `Arc`s and the store
/// handle, which wraps a connection pool.
#[derive(Clone)]
pub struct AppContext {
    /// Immutable application configuration snapshot.
    pub config: Arc<Config>,
    /// Share database.
    pub store: ShareStore,
    /// Origin access and byte relaying.
    pub proxy: Arc<StreamProxy>,
    /// Rewritten playlists keyed by share and path.
    pub playlists: Arc<PlaylistCache>,
}

impl AppContext {
    pub fn new(config: Config, store: ShareStore) -> Self {
        let origin = Arc::new(MediaBackendClient::new(&config));
        let proxy = Arc::new(StreamProxy::new(origin, &config.proxy.cache_control));
        let playlists = Arc::new(PlaylistCache::new(
            PLAYLIST_CACHE_CAPACITY,
            config.proxy.playlist_cache_ttl(),
        ));
        Self {
            config: Arc::new(config),
            store,
            proxy,
            playlists,
        }
    }

    pub fn origin(&self) -> &MediaBackendClient {
        self.proxy.origin()
    }

    /// Link handed out for a share, absolute when `public_url` is set.
    pub fn share_url(&self, record: &ShareRecord) -> String {
        let base = self.config.server.public_url.trim().trim_end_matches('/');
        format!("{base}{}", record.share_path())
    }
}
