//! Byte relaying from the origin to the viewer.
//!
//! Origin bodies are streamed through as they arrive, never buffered in
//! full. Playlists are the exception: they are small, and have to be read
//! whole to be rewritten.

mod playlist_cache;

pub use playlist_cache::PlaylistCache;

use axum::body::Body;
use axum::http::{header, HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::Response;
use futures::TryStreamExt;
use sharegate_common::{Error, OriginRef, Result};
use sharegate_media::hls::content_type_for;
use std::sync::Arc;

use crate::origin::{MediaBackendClient, OriginResource, OriginUrl};

/// Content type of every playlist the proxy serves.
pub const PLAYLIST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Viewer request headers passed on to the origin.
static FORWARDED_REQUEST_HEADERS: [HeaderName; 4] = [
    header::RANGE,
    header::IF_RANGE,
    header::IF_MODIFIED_SINCE,
    header::IF_NONE_MATCH,
];

/// Origin response headers passed back to the viewer.
static RELAYED_RESPONSE_HEADERS: [HeaderName; 5] = [
    header::CONTENT_LENGTH,
    header::CONTENT_RANGE,
    header::CONTENT_TYPE,
    header::LAST_MODIFIED,
    header::ETAG,
];

/// Relays origin media for admitted requests.
pub struct StreamProxy {
    origin: Arc<MediaBackendClient>,
    cache_control: HeaderValue,
}

impl StreamProxy {
    pub fn new(origin: Arc<MediaBackendClient>, cache_control: &str) -> Self {
        let cache_control = HeaderValue::from_str(cache_control).unwrap_or_else(|e| {
            tracing::warn!("Invalid cache control value {:?}: {}", cache_control, e);
            HeaderValue::from_static("no-cache")
        });
        Self {
            origin,
            cache_control,
        }
    }

    pub fn origin(&self) -> &MediaBackendClient {
        &self.origin
    }

    /// Stream an origin resource to the viewer.
    ///
    /// `fallback_name` picks a content type when the origin sends none.
    pub async fn relay(
        &self,
        origin: &OriginRef,
        resource: OriginResource<'_>,
        request_headers: &HeaderMap,
        fallback_name: &str,
    ) -> Result<Response> {
        let url = self.origin.url_for(origin, resource)?;
        let upstream = self
            .origin
            .get(&url, forward_headers(request_headers))
            .await?;
        self.build_relay_response(&url, upstream, fallback_name)
    }

    /// Fetch an origin playlist as text for rewriting.
    pub async fn fetch_playlist(
        &self,
        origin: &OriginRef,
        resource: OriginResource<'_>,
    ) -> Result<String> {
        let url = self.origin.url_for(origin, resource)?;
        self.origin.get_playlist(&url).await
    }

    /// Response carrying a rewritten playlist.
    pub fn playlist_response(&self, body: Arc<str>) -> Result<Response> {
        Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, PLAYLIST_CONTENT_TYPE)
            .header(header::CACHE_CONTROL, self.cache_control.clone())
            .body(Body::from(body.to_string()))
            .map_err(|e| Error::internal(format!("Failed to build playlist response: {e}")))
    }

    fn build_relay_response(
        &self,
        url: &OriginUrl,
        upstream: reqwest::Response,
        fallback_name: &str,
    ) -> Result<Response> {
        let status = upstream.status();
        let mut builder = Response::builder().status(status.as_u16());

        let upstream_headers = upstream.headers();
        for name in RELAYED_RESPONSE_HEADERS.iter() {
            if let Some(value) = upstream_headers.get(name) {
                builder = builder.header(name, value.clone());
            }
        }
        if !upstream_headers.contains_key(header::CONTENT_TYPE) {
            builder = builder.header(header::CONTENT_TYPE, content_type_for(fallback_name));
        }
        builder = builder
            .header(header::ACCEPT_RANGES, "bytes")
            .header(header::CACHE_CONTROL, self.cache_control.clone());

        let redacted = url.to_string();
        let stream = upstream.bytes_stream().map_err(move |e| {
            let e = e.without_url();
            tracing::warn!(url = %redacted, "Origin stream interrupted: {}", e);
            std::io::Error::other(e)
        });

        builder
            .body(Body::from_stream(stream))
            .map_err(|e| Error::internal(format!("Failed to build relay response: {e}")))
    }
}

/// Copy the conditional and range headers a viewer sent.
pub fn forward_headers(request: &HeaderMap) -> HeaderMap {
    let mut forwarded = HeaderMap::new();
    for name in FORWARDED_REQUEST_HEADERS.iter() {
        if let Some(value) = request.get(name) {
            forwarded.insert(name.clone(), value.clone());
        }
    }
    forwarded
}
