//! Share management route handlers (admin).

use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sharegate_common::{
    check_expiry_bound, expiry_after_days, parse_ip_allowlist, validate_max_views,
    validate_origin_id, BackendKind, Error, OriginRef, Result, ShareRecord, ShareToken,
    StreamResolution,
};

use crate::server::context::AppContext;
use crate::server::error::AppError;
use crate::server::middleware::request_id::RequestId;

/// Content type of the exported share list.
pub const EXPORT_CONTENT_TYPE: &str = "audio/x-mpegurl";

/// Request body for creating a share.
#[derive(Debug, Default, Deserialize)]
pub struct CreateShareRequest {
    pub backend: Option<BackendKind>,
    #[serde(default)]
    pub scene_id: Option<String>,
    #[serde(default)]
    pub resolution: Option<StreamResolution>,
    #[serde(default)]
    pub item_id: Option<String>,
    /// Looked up from the library server when omitted.
    #[serde(default)]
    pub media_source_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    /// Absolute expiry. Mutually exclusive with `expires_in_days`.
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_in_days: Option<u32>,
    #[serde(default)]
    pub max_views: Option<u32>,
    #[serde(default)]
    pub allowed_ips: Vec<String>,
}

/// Request body for editing a share. Absent fields are left alone;
/// `max_views: null` removes the quota.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateShareRequest {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "present")]
    pub max_views: Option<Option<u32>>,
    #[serde(default)]
    pub allowed_ips: Option<Vec<String>>,
    #[serde(default)]
    pub resolution: Option<StreamResolution>,
    #[serde(default)]
    pub media_source_id: Option<String>,
}

/// Distinguishes an explicit `null` from a missing field.
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Query parameters for playlist import.
#[derive(Debug, Default, Deserialize)]
pub struct ImportParams {
    #[serde(default)]
    pub expires_in_days: Option<u32>,
    #[serde(default)]
    pub max_views: Option<u32>,
    /// Comma-separated IP literals.
    #[serde(default)]
    pub allowed_ips: Option<String>,
}

/// Share as returned by the admin API.
#[derive(Debug, Serialize)]
pub struct ShareResponse {
    #[serde(flatten)]
    pub share: ShareRecord,
    pub share_url: String,
    pub mime_type: &'static str,
}

impl ShareResponse {
    fn from_record(ctx: &AppContext, share: ShareRecord) -> Self {
        Self {
            share_url: ctx.share_url(&share),
            mime_type: share.share_mime_type(),
            share,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CreateShareResponse {
    pub token: ShareToken,
    pub share_url: String,
    pub share: ShareResponse,
}

#[derive(Debug, Serialize)]
pub struct ImportSkipped {
    pub item_id: String,
    pub name: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct ImportResponse {
    pub created: Vec<ShareResponse>,
    pub skipped: Vec<ImportSkipped>,
}

/// POST /shares
pub async fn create_share(
    State(ctx): State<AppContext>,
    request_id: RequestId,
    Json(payload): Json<CreateShareRequest>,
) -> std::result::Result<impl IntoResponse, AppError> {
    let record = build_share(&ctx, payload)
        .await
        .map_err(|e| AppError::new(e).with_request_id(&request_id))?;
    ctx.store
        .create(record.clone())
        .await
        .map_err(|e| AppError::new(e).with_request_id(&request_id))?;

    tracing::info!(
        token = %record.token,
        backend = %record.backend(),
        name = %record.display_name,
        "Share created"
    );

    let share = ShareResponse::from_record(&ctx, record);
    Ok((
        StatusCode::CREATED,
        Json(CreateShareResponse {
            token: share.share.token.clone(),
            share_url: share.share_url.clone(),
            share,
        }),
    ))
}

/// GET /shares
pub async fn list_shares(
    State(ctx): State<AppContext>,
) -> std::result::Result<Json<Vec<ShareResponse>>, AppError> {
    let shares = ctx.store.list().await?;
    Ok(Json(
        shares
            .into_iter()
            .map(|share| ShareResponse::from_record(&ctx, share))
            .collect(),
    ))
}

/// GET /shares/{token}
pub async fn get_share(
    State(ctx): State<AppContext>,
    Path(token): Path<String>,
) -> std::result::Result<Json<ShareResponse>, AppError> {
    let token: ShareToken = token.parse()?;
    let share = ctx.store.get(&token).await?;
    Ok(Json(ShareResponse::from_record(&ctx, share)))
}

/// PUT /shares/{token}
pub async fn update_share(
    State(ctx): State<AppContext>,
    Path(token): Path<String>,
    request_id: RequestId,
    Json(payload): Json<UpdateShareRequest>,
) -> std::result::Result<Json<ShareResponse>, AppError> {
    let token: ShareToken = token.parse()?;
    let share = apply_update(&ctx, &token, payload)
        .await
        .map_err(|e| AppError::new(e).with_request_id(&request_id))?;

    ctx.playlists.invalidate(&token);
    tracing::info!(token = %token, "Share updated");

    Ok(Json(ShareResponse::from_record(&ctx, share)))
}

/// DELETE /shares/{token}
pub async fn delete_share(
    State(ctx): State<AppContext>,
    Path(token): Path<String>,
) -> std::result::Result<impl IntoResponse, AppError> {
    let token: ShareToken = token.parse()?;
    ctx.store.delete(&token).await?;
    ctx.playlists.forget(&token);
    tracing::info!(token = %token, "Share removed");
    Ok(Json(serde_json::json!({ "message": "removed" })))
}

/// POST /shares/import/{playlist_id}
///
/// Creates one library share per playlist item. Items whose lookup fails
/// are reported in `skipped` instead of failing the whole import.
pub async fn import_playlist(
    State(ctx): State<AppContext>,
    Path(playlist_id): Path<String>,
    Query(params): Query<ImportParams>,
    request_id: RequestId,
) -> std::result::Result<Json<ImportResponse>, AppError> {
    import(&ctx, &playlist_id, params)
        .await
        .map(Json)
        .map_err(|e| AppError::new(e).with_request_id(&request_id))
}

/// GET /shares/export.m3u
///
/// Extended M3U of every live share, one entry per share link.
pub async fn export_shares(
    State(ctx): State<AppContext>,
) -> std::result::Result<Response, AppError> {
    let now = Utc::now();
    let shares = ctx.store.list().await?;

    let mut body = String::from("#EXTM3U\n");
    for share in shares.iter().filter(|s| !s.is_dead(now)) {
        let name: String = share
            .display_name
            .chars()
            .map(|c| if c == '\r' || c == '\n' { ' ' } else { c })
            .collect();
        body.push_str(&format!("#EXTINF:-1,{name}\n{}\n", ctx.share_url(share)));
    }

    Ok((
        [
            (header::CONTENT_TYPE, EXPORT_CONTENT_TYPE),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"sharegate.m3u\"",
            ),
        ],
        body,
    )
        .into_response())
}

async fn build_share(ctx: &AppContext, payload: CreateShareRequest) -> Result<ShareRecord> {
    let backend = payload
        .backend
        .ok_or_else(|| Error::validation("backend is required"))?;
    if !ctx.origin().is_configured(backend) {
        return Err(Error::validation(format!("No {backend} is configured")));
    }

    let expires_at = resolve_expiry(
        payload.expires_at,
        payload.expires_in_days,
        ctx.config.proxy.default_expiry_days,
        Utc::now(),
    )?;
    let max_views = validate_max_views(payload.max_views)?;
    let allowed_ips = parse_ip_allowlist(&payload.allowed_ips)?;

    let (origin, default_name) = match backend {
        BackendKind::SceneServer => {
            let scene_id = payload.scene_id.unwrap_or_default();
            validate_origin_id("scene_id", &scene_id)?;
            let name = format!("Scene {scene_id}");
            (
                OriginRef::SceneServer {
                    scene_id,
                    resolution: payload.resolution.unwrap_or_default(),
                },
                name,
            )
        }
        BackendKind::LibraryServer => {
            let item_id = payload.item_id.unwrap_or_default();
            validate_origin_id("item_id", &item_id)?;
            match payload.media_source_id {
                Some(media_source_id) => {
                    validate_origin_id("media_source_id", &media_source_id)?;
                    let name = item_id.clone();
                    (
                        OriginRef::LibraryServer {
                            item_id,
                            media_source_id,
                        },
                        name,
                    )
                }
                None => {
                    let item = ctx.origin().lookup_item(&item_id).await?;
                    (
                        OriginRef::LibraryServer {
                            item_id,
                            media_source_id: item.media_source_id,
                        },
                        item.name,
                    )
                }
            }
        }
    };

    let display_name = payload
        .display_name
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or(default_name);

    Ok(ShareRecord::new(
        origin,
        display_name,
        expires_at,
        max_views,
        allowed_ips,
    ))
}

/// Pick the expiry instant for a new share.
fn resolve_expiry(
    expires_at: Option<DateTime<Utc>>,
    expires_in_days: Option<u32>,
    default_days: u32,
    now: DateTime<Utc>,
) -> Result<DateTime<Utc>> {
    match (expires_at, expires_in_days) {
        (Some(_), Some(_)) => Err(Error::validation(
            "expires_at and expires_in_days are mutually exclusive",
        )),
        (Some(at), None) if at <= now => Err(Error::validation("expires_at must be in the future")),
        (Some(at), None) => {
            check_expiry_bound(at, now)?;
            Ok(at)
        }
        (None, days) => expiry_after_days(now, days.unwrap_or(default_days)),
    }
}

async fn apply_update(
    ctx: &AppContext,
    token: &ShareToken,
    payload: UpdateShareRequest,
) -> Result<ShareRecord> {
    let allowed_ips = payload
        .allowed_ips
        .as_ref()
        .map(|ips| parse_ip_allowlist(ips))
        .transpose()?;
    if let Some(max_views) = payload.max_views {
        validate_max_views(max_views)?;
    }
    if let Some(at) = payload.expires_at {
        check_expiry_bound(at, Utc::now())?;
    }
    let display_name = match payload.display_name {
        Some(name) if name.trim().is_empty() => {
            return Err(Error::validation("display_name cannot be empty"))
        }
        other => other.map(|name| name.trim().to_string()),
    };
    let UpdateShareRequest {
        expires_at,
        max_views,
        resolution,
        media_source_id,
        ..
    } = payload;

    ctx.store
        .update(token, move |share| {
            if let Some(name) = display_name {
                share.display_name = name;
            }
            if let Some(at) = expires_at {
                share.expires_at = at;
            }
            if let Some(max) = max_views {
                share.max_views = max;
            }
            if let Some(ips) = allowed_ips {
                share.allowed_ips = ips;
            }
            match (&mut share.origin, resolution, media_source_id) {
                (_, None, None) => {}
                (OriginRef::SceneServer { resolution: current, .. }, Some(res), None) => {
                    *current = res;
                }
                (
                    OriginRef::LibraryServer {
                        media_source_id: current,
                        ..
                    },
                    None,
                    Some(id),
                ) => {
                    *current = id;
                }
                (OriginRef::SceneServer { .. }, _, Some(_)) => {
                    return Err(Error::validation(
                        "media_source_id only applies to library server shares",
                    ))
                }
                (OriginRef::LibraryServer { .. }, Some(_), _) => {
                    return Err(Error::validation(
                        "resolution only applies to scene server shares",
                    ))
                }
            }
            Ok(())
        })
        .await
}

async fn import(ctx: &AppContext, playlist_id: &str, params: ImportParams) -> Result<ImportResponse> {
    validate_origin_id("playlist_id", playlist_id)?;
    let expires_at = resolve_expiry(
        None,
        params.expires_in_days,
        ctx.config.proxy.default_expiry_days,
        Utc::now(),
    )?;
    let max_views = validate_max_views(params.max_views)?;
    let allowed_ips = parse_ip_allowlist(
        params
            .allowed_ips
            .as_deref()
            .unwrap_or_default()
            .split(','),
    )?;

    let entries = ctx.origin().playlist_items(playlist_id).await?;
    let mut created = Vec::with_capacity(entries.len());
    let mut skipped = Vec::new();

    for entry in entries {
        let item = match ctx.origin().lookup_item(&entry.item_id).await {
            Ok(item) => item,
            Err(e) => {
                tracing::warn!(item_id = %entry.item_id, "Skipping playlist item: {}", e);
                skipped.push(ImportSkipped {
                    item_id: entry.item_id,
                    name: entry.name,
                    error: e.to_string(),
                });
                continue;
            }
        };

        let record = ShareRecord::new(
            OriginRef::LibraryServer {
                item_id: entry.item_id,
                media_source_id: item.media_source_id,
            },
            entry.name,
            expires_at,
            max_views,
            allowed_ips.clone(),
        );
        ctx.store.create(record.clone()).await?;
        created.push(ShareResponse::from_record(ctx, record));
    }

    tracing::info!(
        playlist_id,
        created = created.len(),
        skipped = skipped.len(),
        "Playlist imported"
    );

    Ok(ImportResponse { created, skipped })
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;
    use sharegate_common::MAX_EXPIRY_DAYS;

    #[test]
    fn test_resolve_expiry_default() {
        let now = Utc::now();
        assert_eq!(resolve_expiry(None, None, 7, now).unwrap(), now + Duration::days(7));
        assert_eq!(resolve_expiry(None, Some(2), 7, now).unwrap(), now + Duration::days(2));
    }

    #[test]
    fn test_resolve_expiry_rejects() {
        let now = Utc::now();
        assert_matches!(resolve_expiry(None, Some(0), 7, now), Err(Error::Validation(_)));
        assert_matches!(
            resolve_expiry(Some(now - Duration::hours(1)), None, 7, now),
            Err(Error::Validation(_))
        );
        assert_matches!(
            resolve_expiry(Some(now + Duration::hours(1)), Some(1), 7, now),
            Err(Error::Validation(_))
        );
    }

    #[test]
    fn test_resolve_expiry_huge_values_are_rejected() {
        let now = Utc::now();
        assert_matches!(
            resolve_expiry(None, Some(4_000_000_000), 7, now),
            Err(Error::Validation(_))
        );
        assert_matches!(
            resolve_expiry(None, Some(3_000_000), 7, now),
            Err(Error::Validation(_))
        );
        assert_matches!(
            resolve_expiry(None, None, u32::MAX, now),
            Err(Error::Validation(_))
        );
        assert_matches!(
            resolve_expiry(Some(DateTime::<Utc>::MAX_UTC), None, 7, now),
            Err(Error::Validation(_))
        );
        assert_eq!(
            resolve_expiry(None, Some(MAX_EXPIRY_DAYS), 7, now).unwrap(),
            now + Duration::days(i64::from(MAX_EXPIRY_DAYS))
        );
    }

    #[test]
    fn test_update_request_distinguishes_null() {
        let absent: UpdateShareRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(absent.max_views, None);

        let cleared: UpdateShareRequest = serde_json::from_str(r#"{"max_views": null}"#).unwrap();
        assert_eq!(cleared.max_views, Some(None));

        let set: UpdateShareRequest = serde_json::from_str(r#"{"max_views": 4}"#).unwrap();
        assert_eq!(set.max_views, Some(Some(4)));
    }

    #[test]
    fn test_create_request_shape() {
        let request: CreateShareRequest = serde_json::from_str(
            r#"{"backend": "scene_server", "scene_id": "12", "resolution": "FULL_HD", "allowed_ips": ["10.0.0.5"]}"#,
        )
        .unwrap();
        assert_eq!(request.backend, Some(BackendKind::SceneServer));
        assert_eq!(request.resolution, Some(StreamResolution::FullHd));
        assert_eq!(request.allowed_ips, vec!["10.0.0.5".to_string()]);
    }
}
