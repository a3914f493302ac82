//! Library server metadata lookups used when creating shares.

use serde::Deserialize;
use sharegate_common::{Error, Result};

use super::{urls, MediaBackendClient};

/// What a share needs to know about a library item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryItem {
    pub item_id: String,
    pub name: String,
    /// First media source of the item.
    pub media_source_id: String,
}

/// One entry of a library playlist.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistEntry {
    pub item_id: String,
    pub name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemDto {
    id: String,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    media_sources: Vec<MediaSourceDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct MediaSourceDto {
    id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ItemsPage {
    #[serde(default)]
    items: Vec<ItemDto>,
}

impl MediaBackendClient {
    /// Look up an item's name and first media source.
    pub async fn lookup_item(&self, item_id: &str) -> Result<LibraryItem> {
        let library = self.library()?;
        let url = urls::library_item_url(&library.url, &library.api_key, item_id)?;
        let item: ItemDto = self.get_json(&url).await?;

        let media_source_id = item
            .media_sources
            .into_iter()
            .next()
            .map(|source| source.id)
            .ok_or_else(|| {
                Error::validation(format!("Library item {item_id} has no media sources"))
            })?;

        Ok(LibraryItem {
            item_id: item.id,
            name: item.name.unwrap_or_else(|| item_id.to_string()),
            media_source_id,
        })
    }

    /// List the items of a playlist owned by the configured user.
    pub async fn playlist_items(&self, playlist_id: &str) -> Result<Vec<PlaylistEntry>> {
        let library = self.library()?;
        let user_id = library.user_id.as_deref().ok_or_else(|| {
            Error::validation("library_server.user_id must be set to import playlists")
        })?;
        let url =
            urls::library_playlist_url(&library.url, &library.api_key, user_id, playlist_id)?;
        let page: ItemsPage = self.get_json(&url).await?;

        Ok(page
            .items
            .into_iter()
            .map(|item| PlaylistEntry {
                name: item.name.unwrap_or_else(|| item.id.clone()),
                item_id: item.id,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, LibraryServerConfig};
    use assert_matches::assert_matches;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(url: &str, user_id: Option<&str>) -> MediaBackendClient {
        let mut config = Config::default();
        config.library_server = Some(LibraryServerConfig {
            url: url.to_string(),
            api_key: "jf".into(),
            user_id: user_id.map(str::to_string),
        });
        MediaBackendClient::new(&config)
    }

    #[tokio::test]
    async fn test_lookup_item() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Items/abc"))
            .and(query_param("api_key", "jf"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Id": "abc",
                "Name": "Holiday 2023",
                "MediaSources": [{ "Id": "src1" }, { "Id": "src2" }]
            })))
            .mount(&server)
            .await;

        let item = client_for(&server.uri(), None)
            .lookup_item("abc")
            .await
            .unwrap();
        assert_eq!(item.name, "Holiday 2023");
        assert_eq!(item.media_source_id, "src1");
    }

    #[tokio::test]
    async fn test_lookup_item_without_sources() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Items/abc"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "Id": "abc", "MediaSources": [] })),
            )
            .mount(&server)
            .await;

        let err = client_for(&server.uri(), None)
            .lookup_item("abc")
            .await
            .unwrap_err();
        assert_matches!(err, Error::Validation(_));
    }

    #[tokio::test]
    async fn test_lookup_missing_item_is_origin_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Items/nope"))
            .respond_with(ResponseTemplate::new(404).set_body_string("Not Found"))
            .mount(&server)
            .await;

        let err = client_for(&server.uri(), None)
            .lookup_item("nope")
            .await
            .unwrap_err();
        assert_matches!(err, Error::Origin { status: Some(404), .. });
    }

    #[tokio::test]
    async fn test_playlist_items() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/Users/u1/Items"))
            .and(query_param("PlaylistId", "pl"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "Items": [
                    { "Id": "a", "Name": "First" },
                    { "Id": "b" }
                ],
                "TotalRecordCount": 2
            })))
            .mount(&server)
            .await;

        let items = client_for(&server.uri(), Some("u1"))
            .playlist_items("pl")
            .await
            .unwrap();
        assert_eq!(
            items,
            vec![
                PlaylistEntry {
                    item_id: "a".into(),
                    name: "First".into()
                },
                PlaylistEntry {
                    item_id: "b".into(),
                    name: "b".into()
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_playlist_requires_user() {
        let err = client_for("http://127.0.0.1:9", None)
            .playlist_items("pl")
            .await
            .unwrap_err();
        assert_matches!(err, Error::Validation(_));
    }
}
