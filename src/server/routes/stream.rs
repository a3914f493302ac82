//! Public share routes: playlists, segments and direct streams.
//!
//! Every request is looked up and judged before any origin traffic. Only
//! requests that start a view (the master playlist and the direct stream)
//! count against the quota; segments and sub-playlists of an admitted view
//! do not.

use std::net::IpAddr;
use std::sync::Arc;

use axum::extract::{Path, Query, RawQuery, State};
use axum::http::HeaderMap;
use axum::response::Response;
use chrono::{DateTime, Utc};
use sharegate_common::guard::{self, DenyReason};
use sharegate_common::{BackendKind, Error, Result, ShareRecord, ShareToken, Verdict};
use sharegate_media::hls::{is_playlist_path, normalize_path, parent_dir, rewrite_playlist_in};

use crate::origin::OriginResource;
use crate::server::context::AppContext;
use crate::server::error::AppError;
use crate::server::middleware::client_ip::ClientIp;
use crate::server::middleware::request_id::RequestId;

/// Playlist path that starts a new view.
pub const MASTER_PLAYLIST: &str = "master.m3u8";

/// GET /playlist/{token}/{*path}
pub async fn playlist_path(
    State(ctx): State<AppContext>,
    Path((token, path)): Path<(String, String)>,
    RawQuery(raw_query): RawQuery,
    Query(query): Query<Vec<(String, String)>>,
    ClientIp(ip): ClientIp,
    request_id: RequestId,
    headers: HeaderMap,
) -> std::result::Result<Response, AppError> {
    let result = if path == MASTER_PLAYLIST {
        serve_master(&ctx, &token, ip).await
    } else {
        serve_nested(&ctx, &token, &path, raw_query.as_deref(), &query, &headers, ip).await
    };
    result.map_err(|e| AppError::new(e).with_request_id(&request_id))
}

/// GET /stream/{token}
pub async fn direct_stream(
    State(ctx): State<AppContext>,
    Path(token): Path<String>,
    ClientIp(ip): ClientIp,
    request_id: RequestId,
    headers: HeaderMap,
) -> std::result::Result<Response, AppError> {
    serve_direct(&ctx, &token, &headers, ip)
        .await
        .map_err(|e| AppError::new(e).with_request_id(&request_id))
}

async fn serve_master(ctx: &AppContext, token: &str, ip: Option<IpAddr>) -> Result<Response> {
    let token: ShareToken = token.parse()?;
    let generation = ctx.playlists.generation(&token);
    let record = ctx.store.get(&token).await?;
    let record = count_view(ctx, record, ip).await?;

    let body = rewritten_playlist(
        ctx,
        &record,
        generation,
        MASTER_PLAYLIST,
        "",
        OriginResource::MasterPlaylist,
    )
    .await?;
    ctx.proxy.playlist_response(body)
}

async fn serve_nested(
    ctx: &AppContext,
    token: &str,
    raw_path: &str,
    raw_query: Option<&str>,
    query: &[(String, String)],
    headers: &HeaderMap,
    ip: Option<IpAddr>,
) -> Result<Response> {
    let token: ShareToken = token.parse()?;
    let path = normalize_path(raw_path)
        .ok_or_else(|| Error::validation(format!("Invalid playlist path: {raw_path}")))?;

    let generation = ctx.playlists.generation(&token);
    let record = ctx.store.get(&token).await?;
    let now = Utc::now();
    if let Verdict::Deny(reason) = guard::evaluate_continuation(&record, now, ip) {
        return Err(deny(ctx, &token, reason, now).await);
    }

    let resource = OriginResource::Nested {
        path: &path,
        query,
    };

    if is_playlist_path(&path) {
        let cache_key = match raw_query {
            Some(q) if !q.is_empty() => format!("{path}?{q}"),
            _ => path.clone(),
        };
        let body = rewritten_playlist(
            ctx,
            &record,
            generation,
            &cache_key,
            parent_dir(&path),
            resource,
        )
        .await?;
        return ctx.proxy.playlist_response(body);
    }

    ctx.proxy
        .relay(&record.origin, resource, headers, &path)
        .await
}

async fn serve_direct(
    ctx: &AppContext,
    token: &str,
    headers: &HeaderMap,
    ip: Option<IpAddr>,
) -> Result<Response> {
    let token: ShareToken = token.parse()?;
    let record = ctx.store.get(&token).await?;
    if record.backend() != BackendKind::SceneServer {
        return Err(Error::validation(
            "Direct streaming is only available for scene server shares; use the playlist link",
        ));
    }
    let record = count_view(ctx, record, ip).await?;

    ctx.proxy
        .relay(&record.origin, OriginResource::File, headers, "stream.mp4")
        .await
}

/// Admit a request that starts a view and count it.
///
/// The guard runs first so refused callers never touch the counter; the
/// store then re-checks expiry and quota inside its transaction, which is
/// what holds the quota under concurrent playback starts.
async fn count_view(
    ctx: &AppContext,
    record: ShareRecord,
    ip: Option<IpAddr>,
) -> Result<ShareRecord> {
    let now = Utc::now();
    if let Verdict::Deny(reason) = guard::evaluate(&record, now, ip) {
        return Err(deny(ctx, &record.token, reason, now).await);
    }
    if !ctx.origin().is_configured(record.backend()) {
        tracing::error!(token = %record.token, backend = %record.backend(), "Share points at an unconfigured backend");
        return Err(Error::origin(None, "origin backend is not configured"));
    }

    let (verdict, record) = ctx.store.consume_view(&record.token, now).await?;
    match verdict {
        Verdict::Admit => {
            tracing::info!(
                token = %record.token,
                views = record.views,
                max_views = ?record.max_views,
                "View counted"
            );
            Ok(record)
        }
        Verdict::Deny(reason) => Err(deny(ctx, &record.token, reason, now).await),
    }
}

/// Turn a deny verdict into an error, purging the share when it is dead.
async fn deny(ctx: &AppContext, token: &ShareToken, reason: DenyReason, now: DateTime<Utc>) -> Error {
    tracing::info!(token = %token, reason = ?reason, "Share request denied");

    if reason.is_terminal() {
        match ctx.store.delete_if_dead(token, now).await {
            Ok(true) => {
                ctx.playlists.forget(token);
                tracing::info!(token = %token, "Purged dead share");
            }
            Ok(false) => {}
            Err(e) => tracing::warn!(token = %token, "Failed to purge dead share: {}", e),
        }
    }

    reason.into()
}

/// Serve a rewritten playlist from the cache or the origin.
///
/// `generation` must be read before `record` was loaded.
async fn rewritten_playlist(
    ctx: &AppContext,
    record: &ShareRecord,
    generation: u64,
    cache_key: &str,
    base_dir: &str,
    resource: OriginResource<'_>,
) -> Result<Arc<str>> {
    if let Some(body) = ctx.playlists.get(&record.token, cache_key) {
        tracing::debug!(token = %record.token, path = cache_key, "Playlist served from cache");
        return Ok(body);
    }

    let origin_body = ctx.proxy.fetch_playlist(&record.origin, resource).await?;
    let rewritten = rewrite_playlist_in(&origin_body, &record.token, base_dir).map_err(|e| {
        tracing::error!(token = %record.token, path = cache_key, "Origin playlist rejected: {}", e);
        Error::from(e)
    })?;

    let body: Arc<str> = Arc::from(rewritten);
    if !ctx
        .playlists
        .insert_if_current(&record.token, cache_key, Arc::clone(&body), generation)
    {
        tracing::debug!(token = %record.token, path = cache_key, "Share changed during fetch, playlist not cached");
    }
    Ok(body)
}
