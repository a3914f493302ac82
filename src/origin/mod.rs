//! Origin media servers.
//!
//! [`MediaBackendClient`] knows how to address both backends, sends the
//! request and folds every non-relayable outcome into
//! [`Error::Origin`](sharegate_common::Error::Origin).

mod library;
mod urls;

pub use library::{LibraryItem, PlaylistEntry};
pub use urls::{OriginResource, OriginUrl};

use futures::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::{Client, Response, StatusCode};
use sharegate_common::{BackendKind, Error, OriginRef, Result};

use crate::config::{Config, LibraryServerConfig, SceneServerConfig};

/// How much of an origin error body is read for the log snippet.
const ERROR_BODY_LIMIT: usize = 4 * 1024;

/// Largest playlist accepted from an origin.
pub const MAX_PLAYLIST_BYTES: usize = 4 * 1024 * 1024;

/// Largest JSON document accepted from the library server.
const MAX_JSON_BYTES: usize = 1024 * 1024;

/// HTTP client for the scene server and the library server.
pub struct MediaBackendClient {
    client: Client,
    scene: Option<SceneServerConfig>,
    library: Option<LibraryServerConfig>,
}

impl MediaBackendClient {
    pub fn new(config: &Config) -> Self {
        let client = Client::builder()
            .connect_timeout(config.proxy.connect_timeout())
            .read_timeout(config.proxy.read_timeout())
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeouts: {}", e);
                Client::new()
            });

        Self {
            client,
            scene: config.scene_server.clone(),
            library: config.library_server.clone(),
        }
    }

    /// Whether the backend has a configured origin.
    pub fn is_configured(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::SceneServer => self.scene.is_some(),
            BackendKind::LibraryServer => self.library.is_some(),
        }
    }

    fn scene(&self) -> Result<&SceneServerConfig> {
        self.scene
            .as_ref()
            .ok_or_else(|| Error::validation("No scene server is configured"))
    }

    fn library(&self) -> Result<&LibraryServerConfig> {
        self.library
            .as_ref()
            .ok_or_else(|| Error::validation("No library server is configured"))
    }

    /// Build the origin URL for `resource` of a share.
    pub fn url_for(&self, origin: &OriginRef, resource: OriginResource<'_>) -> Result<OriginUrl> {
        match origin {
            OriginRef::SceneServer {
                scene_id,
                resolution,
            } => {
                let scene = self.scene()?;
                urls::scene_url(&scene.url, &scene.api_key, scene_id, *resolution, resource)
            }
            OriginRef::LibraryServer {
                item_id,
                media_source_id,
            } => {
                let library = self.library()?;
                urls::library_url(
                    &library.url,
                    &library.api_key,
                    item_id,
                    media_source_id,
                    resource,
                )
            }
        }
    }

    /// GET `url` with the given request headers.
    ///
    /// 2xx, 304 and 416 responses are returned for relaying with the body
    /// still unread. Any other status, and any transport failure, becomes
    /// an origin error. Nothing is retried.
    pub async fn get(&self, url: &OriginUrl, headers: HeaderMap) -> Result<Response> {
        let response = self
            .client
            .get(url.as_str())
            .headers(headers)
            .send()
            .await
            .map_err(|e| transport_error(url, e))?;

        let status = response.status();
        if is_relayable(status) {
            tracing::debug!(status = status.as_u16(), url = %url, "Origin responded");
            return Ok(response);
        }

        let body = match read_prefix(response, ERROR_BODY_LIMIT).await {
            Ok((bytes, _)) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(e) => {
                tracing::warn!(url = %url, "Failed to read origin error body: {}", e.without_url());
                String::new()
            }
        };
        let err = Error::origin(Some(status.as_u16()), &body);
        if let Error::Origin { snippet, .. } = &err {
            tracing::error!(
                status = status.as_u16(),
                url = %url,
                snippet = %snippet,
                "Origin returned an error"
            );
        }
        Err(err)
    }

    /// GET a full body of at most `limit` bytes. Only 2xx is accepted.
    ///
    /// Returns `None` when the origin sends more than `limit` bytes.
    async fn get_capped(&self, url: &OriginUrl, limit: usize) -> Result<Option<Vec<u8>>> {
        let response = self.get(url, HeaderMap::new()).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::origin(
                Some(status.as_u16()),
                "unexpected status for a full-body request",
            ));
        }
        match read_prefix(response, limit).await {
            Ok((_, true)) => Ok(None),
            Ok((bytes, false)) => Ok(Some(bytes)),
            Err(e) => Err(transport_error(url, e)),
        }
    }

    /// GET an HLS playlist as text.
    pub async fn get_playlist(&self, url: &OriginUrl) -> Result<String> {
        let bytes = self.get_capped(url, MAX_PLAYLIST_BYTES).await?.ok_or_else(|| {
            tracing::error!(url = %url, "Origin playlist exceeds {} bytes", MAX_PLAYLIST_BYTES);
            Error::invalid_playlist(format!("playlist exceeds {MAX_PLAYLIST_BYTES} bytes"))
        })?;
        String::from_utf8(bytes).map_err(|_| Error::invalid_playlist("playlist is not valid UTF-8"))
    }

    /// GET `url` and decode a JSON body.
    pub(crate) async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &OriginUrl,
    ) -> Result<T> {
        let bytes = self
            .get_capped(url, MAX_JSON_BYTES)
            .await?
            .ok_or_else(|| Error::origin(None, "JSON response from origin is too large"))?;
        serde_json::from_slice(&bytes).map_err(|e| {
            tracing::error!(url = %url, "Origin returned malformed JSON: {}", e);
            Error::origin(None, &format!("malformed JSON from origin: {e}"))
        })
    }
}

/// Read at most `limit` bytes of a response body.
///
/// The flag is set when the body was longer and the rest was left unread.
async fn read_prefix(
    response: Response,
    limit: usize,
) -> std::result::Result<(Vec<u8>, bool), reqwest::Error> {
    let mut stream = response.bytes_stream();
    let mut buf = Vec::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let room = limit - buf.len();
        if chunk.len() > room {
            buf.extend_from_slice(&chunk[..room]);
            return Ok((buf, true));
        }
        buf.extend_from_slice(&chunk);
    }
    Ok((buf, false))
}

/// Statuses passed through to the viewer unchanged.
pub fn is_relayable(status: StatusCode) -> bool {
    status.is_success()
        || status == StatusCode::NOT_MODIFIED
        || status == StatusCode::RANGE_NOT_SATISFIABLE
}

fn transport_error(url: &OriginUrl, e: reqwest::Error) -> Error {
    // reqwest errors embed the request URL, which carries the API key.
    let e = e.without_url();
    tracing::error!(url = %url, "Origin unreachable: {}", e);
    Error::origin(None, &e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use sharegate_common::StreamResolution;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(scene_url: &str) -> MediaBackendClient {
        let mut config = Config::default();
        config.scene_server = Some(SceneServerConfig {
            url: scene_url.to_string(),
            api_key: "key".into(),
        });
        MediaBackendClient::new(&config)
    }

    fn scene() -> OriginRef {
        OriginRef::SceneServer {
            scene_id: "5".into(),
            resolution: StreamResolution::Original,
        }
    }

    #[test]
    fn test_relayable_statuses() {
        assert!(is_relayable(StatusCode::OK));
        assert!(is_relayable(StatusCode::PARTIAL_CONTENT));
        assert!(is_relayable(StatusCode::NOT_MODIFIED));
        assert!(is_relayable(StatusCode::RANGE_NOT_SATISFIABLE));
        assert!(!is_relayable(StatusCode::NOT_FOUND));
        assert!(!is_relayable(StatusCode::FOUND));
        assert!(!is_relayable(StatusCode::BAD_GATEWAY));
    }

    #[test]
    fn test_unconfigured_backend() {
        let client = MediaBackendClient::new(&Config::default());
        assert!(!client.is_configured(BackendKind::SceneServer));
        assert_matches!(
            client.url_for(&scene(), OriginResource::File),
            Err(Error::Validation(_))
        );
    }

    #[tokio::test]
    async fn test_error_status_becomes_origin_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/scene/5/stream"))
            .and(query_param("apikey", "key"))
            .respond_with(ResponseTemplate::new(500).set_body_string("  database\n  locked  "))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let url = client.url_for(&scene(), OriginResource::File).unwrap();
        let err = client.get(&url, HeaderMap::new()).await.unwrap_err();
        assert_matches!(err, Error::Origin { status: Some(500), ref snippet } if snippet == "database locked");
        assert_eq!(err.http_status(), 502);
    }

    #[tokio::test]
    async fn test_large_error_body_is_cut_short() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/scene/5/stream"))
            .respond_with(ResponseTemplate::new(503).set_body_string("x".repeat(8 * 1024 * 1024)))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let url = client.url_for(&scene(), OriginResource::File).unwrap();
        let err = client.get(&url, HeaderMap::new()).await.unwrap_err();
        assert_matches!(
            err,
            Error::Origin { status: Some(503), ref snippet } if snippet.len() <= ERROR_BODY_LIMIT
        );
    }

    #[tokio::test]
    async fn test_oversized_playlist_is_rejected() {
        let server = MockServer::start().await;
        let mut body = String::from("#EXTM3U\n");
        body.push_str(&"#EXT-X-DISCONTINUITY\n".repeat(MAX_PLAYLIST_BYTES / 16));
        Mock::given(method("GET"))
            .and(path("/scene/5/stream.m3u8"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let url = client.url_for(&scene(), OriginResource::MasterPlaylist).unwrap();
        assert_matches!(client.get_playlist(&url).await, Err(Error::InvalidPlaylist(_)));
    }

    #[tokio::test]
    async fn test_playlist_within_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/scene/5/stream.m3u8"))
            .respond_with(ResponseTemplate::new(200).set_body_string("#EXTM3U\nseg0.ts\n"))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let url = client.url_for(&scene(), OriginResource::MasterPlaylist).unwrap();
        assert_eq!(client.get_playlist(&url).await.unwrap(), "#EXTM3U\nseg0.ts\n");
    }

    #[tokio::test]
    async fn test_partial_content_is_relayed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/scene/5/stream"))
            .respond_with(ResponseTemplate::new(206).set_body_bytes(vec![1u8, 2, 3]))
            .mount(&server)
            .await;

        let client = client_for(&server.uri());
        let url = client.url_for(&scene(), OriginResource::File).unwrap();
        let response = client.get(&url, HeaderMap::new()).await.unwrap();
        assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    }

    #[tokio::test]
    async fn test_unreachable_origin() {
        // Port 9 (discard) on localhost is closed in test environments.
        let client = client_for("http://127.0.0.1:9");
        let url = client.url_for(&scene(), OriginResource::File).unwrap();
        let err = client.get(&url, HeaderMap::new()).await.unwrap_err();
        assert_matches!(err, Error::Origin { status: None, ref snippet } if !snippet.contains("key"));
    }
}
