//! Playlist line classification.
//!
//! HLS does not mark which URI lines point at sub-playlists and which at
//! media, so the decision is a string heuristic on the URI path:
//!
//! | Line                                 | Kind                |
//! |--------------------------------------|---------------------|
//! | empty or whitespace only             | [`LineKind::Blank`] |
//! | starts with `#`                      | [`LineKind::Tag`]   |
//! | path ends in `.m3u8` or `.m3u`       | [`LineKind::SubPlaylist`] |
//! | anything else                        | [`LineKind::Segment`] |
//!
//! Matching is case-insensitive and looks at the path only, never at the
//! query string, so `0.ts?x=.m3u8` is still a segment. Segment extensions
//! in [`SEGMENT_EXTENSIONS`] are the ones the origins are known to emit;
//! a URI with any other extension is still treated as a segment so no
//! origin URL is ever passed through.

/// Extensions recognised as sub-playlists.
pub const PLAYLIST_EXTENSIONS: &[&str] = &["m3u8", "m3u"];

/// Media segment extensions emitted by the supported origins.
pub const SEGMENT_EXTENSIONS: &[&str] = &[
    "ts", "m4s", "mp4", "m4v", "m4a", "aac", "mp3", "ac3", "ec3", "vtt", "webvtt", "cmfv", "cmfa",
];

/// Query parameters that carry origin credentials. They are stripped from
/// anything a viewer can see and ignored when a viewer sends them back.
pub const CREDENTIAL_PARAMS: &[&str] = &[
    "api_key",
    "apikey",
    "x-emby-token",
    "x-mediabrowser-token",
];

/// One playlist line after classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind<'a> {
    Blank,
    Tag,
    SubPlaylist(UriRef<'a>),
    Segment(UriRef<'a>),
}

/// A URI line split into its parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UriRef<'a> {
    /// Path without scheme, authority, query or fragment.
    pub path: &'a str,
    /// Raw query string without the leading `?`.
    pub query: Option<&'a str>,
    /// Whether the URI had a scheme, a network path (`//host`) or a
    /// leading `/`.
    pub absolute: bool,
}

impl<'a> UriRef<'a> {
    /// Split a URI line.
    pub fn parse(uri: &'a str) -> Self {
        let uri = uri.trim();
        let without_fragment = uri.split_once('#').map_or(uri, |(head, _)| head);
        let (head, query) = match without_fragment.split_once('?') {
            Some((head, query)) => (head, Some(query)),
            None => (without_fragment, None),
        };

        if let Some(rest) = strip_scheme(head) {
            // `scheme://authority/path`
            let path = rest.find('/').map_or("", |idx| &rest[idx..]);
            return Self {
                path,
                query,
                absolute: true,
            };
        }
        if let Some(rest) = head.strip_prefix("//") {
            let path = rest.find('/').map_or("", |idx| &rest[idx..]);
            return Self {
                path,
                query,
                absolute: true,
            };
        }

        Self {
            path: head,
            query,
            absolute: head.starts_with('/'),
        }
    }

    /// Final path component.
    pub fn basename(&self) -> &'a str {
        self.path.rsplit('/').next().unwrap_or("")
    }

    /// Lower-cased extension of the final path component.
    pub fn extension(&self) -> Option<String> {
        extension_of(self.basename())
    }
}

/// Returns the remainder after `scheme://` when `s` starts with a URI scheme.
fn strip_scheme(s: &str) -> Option<&str> {
    let (scheme, rest) = s.split_once("://")?;
    let mut chars = scheme.chars();
    let valid = chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
    valid.then_some(rest)
}

fn extension_of(name: &str) -> Option<String> {
    let (stem, ext) = name.rsplit_once('.')?;
    if stem.is_empty() || ext.is_empty() {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

/// Classify a single playlist line (without its terminator).
pub fn classify(line: &str) -> LineKind<'_> {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return LineKind::Blank;
    }
    if trimmed.starts_with('#') {
        return LineKind::Tag;
    }
    let uri = UriRef::parse(trimmed);
    if is_playlist_path(uri.path) {
        LineKind::SubPlaylist(uri)
    } else {
        LineKind::Segment(uri)
    }
}

/// Whether a path names a playlist rather than media.
pub fn is_playlist_path(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or("");
    extension_of(name).is_some_and(|ext| PLAYLIST_EXTENSIONS.contains(&ext.as_str()))
}

/// Whether a path carries one of the documented segment extensions.
pub fn is_known_segment_path(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or("");
    extension_of(name).is_some_and(|ext| SEGMENT_EXTENSIONS.contains(&ext.as_str()))
}

/// Whether a query parameter name carries origin credentials.
pub fn is_credential_param(name: &str) -> bool {
    CREDENTIAL_PARAMS
        .iter()
        .any(|p| p.eq_ignore_ascii_case(name))
}

/// Remove credential parameters from a raw query string.
///
/// Returns `None` when nothing is left.
pub fn strip_credentials(query: &str) -> Option<String> {
    let kept: Vec<&str> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| {
            let name = pair.split_once('=').map_or(*pair, |(name, _)| name);
            !is_credential_param(name)
        })
        .collect();
    if kept.is_empty() {
        None
    } else {
        Some(kept.join("&"))
    }
}

/// Content type to fall back on when the origin does not send one.
pub fn content_type_for(path: &str) -> &'static str {
    let name = path.rsplit('/').next().unwrap_or("");
    match extension_of(name).as_deref() {
        Some("m3u8") | Some("m3u") => "application/vnd.apple.mpegurl",
        Some("ts") => "video/mp2t",
        Some("m4s") | Some("cmfv") => "video/iso.segment",
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("m4a") | Some("cmfa") => "audio/mp4",
        Some("aac") => "audio/aac",
        Some("mp3") => "audio/mpeg",
        Some("ac3") => "audio/ac3",
        Some("ec3") => "audio/eac3",
        Some("vtt") | Some("webvtt") => "text/vtt",
        _ => "application/octet-stream",
    }
}
