//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which starts mock scene and library servers,
//! builds a config pointing at them, and creates an [`AppContext`] over an
//! in-memory share store. [`TestHarness::serve`] starts Axum on a random
//! port for HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;

use axum::Router;
use chrono::{Duration, Utc};
use wiremock::MockServer;

use sharegate::config::{Config, LibraryServerConfig, SceneServerConfig};
use sharegate::server::{build_router, AppContext};
use sharegate_common::{parse_ip_allowlist, OriginRef, ShareRecord, StreamResolution};
use sharegate_db::ShareStore;

pub const SCENE_KEY: &str = "scene-secret-key";
pub const LIBRARY_KEY: &str = "library-secret-key";
pub const LIBRARY_USER: &str = "user1";
pub const ADMIN_KEY: &str = "admin-test-key";

/// Test harness wrapping a fully-constructed [`AppContext`] with mock
/// origins.
pub struct TestHarness {
    pub ctx: AppContext,
    pub scene: MockServer,
    pub library: MockServer,
}

impl TestHarness {
    /// Harness with both origins configured and admin auth disabled.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Harness whose config can be adjusted before the context is built.
    pub async fn with_config(tweak: impl FnOnce(&mut Config)) -> Self {
        let scene = MockServer::start().await;
        let library = MockServer::start().await;

        let mut config = Config::default();
        config.scene_server = Some(SceneServerConfig {
            url: scene.uri(),
            api_key: SCENE_KEY.into(),
        });
        config.library_server = Some(LibraryServerConfig {
            url: library.uri(),
            api_key: LIBRARY_KEY.into(),
            user_id: Some(LIBRARY_USER.into()),
        });
        tweak(&mut config);

        let store = ShareStore::in_memory().expect("failed to create in-memory store");
        let ctx = AppContext::new(config, store);

        Self {
            ctx,
            scene,
            library,
        }
    }

    /// Harness with admin auth enabled using [`ADMIN_KEY`].
    pub async fn with_admin_auth() -> Self {
        Self::with_config(|config| {
            config.server.auth.enabled = true;
            config.server.auth.api_key = Some(ADMIN_KEY.into());
        })
        .await
    }

    pub fn router(&self) -> Router {
        build_router(self.ctx.clone())
    }

    /// Start an Axum server on a random port and return its address.
    pub async fn serve(&self) -> SocketAddr {
        let app = self.router();

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            .ok();
        });

        addr
    }

    /// Insert a scene server share straight into the store.
    pub async fn scene_share(&self, scene_id: &str, max_views: Option<u32>, ips: &[&str]) -> ShareRecord {
        self.insert(
            OriginRef::SceneServer {
                scene_id: scene_id.into(),
                resolution: StreamResolution::Original,
            },
            max_views,
            ips,
        )
        .await
    }

    /// Insert a library server share straight into the store.
    pub async fn library_share(&self, item_id: &str, max_views: Option<u32>) -> ShareRecord {
        self.insert(
            OriginRef::LibraryServer {
                item_id: item_id.into(),
                media_source_id: "src1".into(),
            },
            max_views,
            &[],
        )
        .await
    }

    async fn insert(&self, origin: OriginRef, max_views: Option<u32>, ips: &[&str]) -> ShareRecord {
        let record = ShareRecord::new(
            origin,
            "test share",
            Utc::now() + Duration::days(1),
            max_views,
            parse_ip_allowlist(ips).expect("invalid test IP"),
        );
        self.ctx
            .store
            .create(record.clone())
            .await
            .expect("failed to create share");
        record
    }
}

