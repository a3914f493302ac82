//! Axum router construction.
//!
//! Public share routes are open to anyone holding a token; the share
//! management routes sit behind the admin API key.

use axum::http::{header, Method};
use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::context::AppContext;
use super::middleware::auth::admin_auth_middleware;
use super::middleware::request_id::request_id_middleware;
use super::routes;

/// Build the complete Axum router.
pub fn build_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::RANGE])
        .expose_headers([
            header::CONTENT_LENGTH,
            header::CONTENT_RANGE,
            header::ACCEPT_RANGES,
        ]);

    // Share playback, no admin credentials.
    let public_routes = Router::new()
        .route("/playlist/{token}/{*path}", get(routes::stream::playlist_path))
        .route("/stream/{token}", get(routes::stream::direct_stream));

    // Share management.
    let admin_routes = Router::new()
        .route(
            "/shares",
            get(routes::shares::list_shares).post(routes::shares::create_share),
        )
        .route("/shares/export.m3u", get(routes::shares::export_shares))
        .route(
            "/shares/import/{playlist_id}",
            post(routes::shares::import_playlist),
        )
        .route(
            "/shares/{token}",
            get(routes::shares::get_share)
                .put(routes::shares::update_share)
                .delete(routes::shares::delete_share),
        )
        .layer(middleware::from_fn_with_state(
            ctx.clone(),
            admin_auth_middleware,
        ));

    Router::new()
        .route("/health", get(routes::health::health_check))
        .merge(public_routes)
        .merge(admin_routes)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}
