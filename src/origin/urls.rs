//! Origin request URLs.
//!
//! Every URL handed to the HTTP client carries an origin API key, so the
//! [`fmt::Display`] impl of [`OriginUrl`] masks credentials. Log the URL,
//! never [`OriginUrl::as_str`].

use std::fmt;

use reqwest::Url;
use sharegate_common::{Error, Result, StreamResolution};
use sharegate_media::hls::is_credential_param;

const REDACTED: &str = "REDACTED";

/// What part of a share's media is being requested from the origin.
#[derive(Debug, Clone, Copy)]
pub enum OriginResource<'a> {
    /// The whole media file (scene server only).
    File,
    /// The top-level HLS playlist.
    MasterPlaylist,
    /// A segment or sub-playlist below the share's playlist prefix, plus
    /// the query parameters the viewer sent along.
    Nested {
        path: &'a str,
        query: &'a [(String, String)],
    },
}

/// A fully built origin URL.
#[derive(Clone, PartialEq, Eq)]
pub struct OriginUrl(Url);

impl OriginUrl {
    /// The real URL, credentials included.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn url(&self) -> &Url {
        &self.0
    }

    /// The URL with credential query parameters masked.
    pub fn redacted(&self) -> String {
        if self.0.query().is_none() {
            return self.0.to_string();
        }
        let mut masked = self.0.clone();
        let pairs: Vec<(String, String)> = self
            .0
            .query_pairs()
            .map(|(k, v)| {
                let v = if is_credential_param(&k) {
                    REDACTED.to_string()
                } else {
                    v.into_owned()
                };
                (k.into_owned(), v)
            })
            .collect();
        masked.query_pairs_mut().clear().extend_pairs(pairs);
        masked.to_string()
    }
}

impl fmt::Display for OriginUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl fmt::Debug for OriginUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OriginUrl").field(&self.redacted()).finish()
    }
}

/// Append path segments to `base`, percent-encoding each one.
fn join(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url =
        Url::parse(base).map_err(|e| Error::internal(format!("Invalid origin URL: {e}")))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| Error::internal("Origin URL cannot carry a path"))?;
        path.pop_if_empty();
        for segment in segments {
            path.extend(segment.split('/').filter(|part| !part.is_empty()));
        }
    }
    Ok(url)
}

/// Scene server URLs:
///
/// - file: `/scene/{id}/stream?apikey=`
/// - master: `/scene/{id}/stream.m3u8?apikey=&resolution=`
/// - nested: `/scene/{id}/stream.m3u8/{path}?apikey=&resolution=`
///
/// Viewer query parameters are not forwarded to the scene server; the
/// share's resolution is authoritative.
pub fn scene_url(
    base: &str,
    api_key: &str,
    scene_id: &str,
    resolution: StreamResolution,
    resource: OriginResource<'_>,
) -> Result<OriginUrl> {
    let mut url = match resource {
        OriginResource::File => join(base, &["scene", scene_id, "stream"])?,
        OriginResource::MasterPlaylist => join(base, &["scene", scene_id, "stream.m3u8"])?,
        OriginResource::Nested { path, .. } => {
            join(base, &["scene", scene_id, "stream.m3u8", path])?
        }
    };
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("apikey", api_key);
        if !matches!(resource, OriginResource::File) {
            query.append_pair("resolution", resolution.as_str());
        }
    }
    Ok(OriginUrl(url))
}

/// Library server URLs:
///
/// - master: `/Videos/{item}/master.m3u8?api_key=&MediaSourceId=`
/// - nested: `/Videos/{item}/{path}?api_key=&MediaSourceId=&{viewer query}`
///
/// Viewer parameters that name credentials or the media source are
/// dropped. The library server has no direct-file resource.
pub fn library_url(
    base: &str,
    api_key: &str,
    item_id: &str,
    media_source_id: &str,
    resource: OriginResource<'_>,
) -> Result<OriginUrl> {
    let (mut url, carried) = match resource {
        OriginResource::File => {
            return Err(Error::validation(
                "Direct streaming is only available for scene server shares",
            ))
        }
        OriginResource::MasterPlaylist => (join(base, &["Videos", item_id, "master.m3u8"])?, &[][..]),
        OriginResource::Nested { path, query } => (join(base, &["Videos", item_id, path])?, query),
    };
    {
        let mut query = url.query_pairs_mut();
        query.append_pair("api_key", api_key);
        query.append_pair("MediaSourceId", media_source_id);
        for (key, value) in carried {
            if is_credential_param(key) || key.eq_ignore_ascii_case("MediaSourceId") {
                continue;
            }
            query.append_pair(key, value);
        }
    }
    Ok(OriginUrl(url))
}

/// `/Items/{item}?api_key=`
pub fn library_item_url(base: &str, api_key: &str, item_id: &str) -> Result<OriginUrl> {
    let mut url = join(base, &["Items", item_id])?;
    url.query_pairs_mut().append_pair("api_key", api_key);
    Ok(OriginUrl(url))
}

/// `/Users/{user}/Items?PlaylistId=&api_key=`
pub fn library_playlist_url(
    base: &str,
    api_key: &str,
    user_id: &str,
    playlist_id: &str,
) -> Result<OriginUrl> {
    let mut url = join(base, &["Users", user_id, "Items"])?;
    url.query_pairs_mut()
        .append_pair("PlaylistId", playlist_id)
        .append_pair("api_key", api_key);
    Ok(OriginUrl(url))
}
