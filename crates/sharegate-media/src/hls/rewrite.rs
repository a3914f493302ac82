//! Rewriting origin playlists into proxy playlists.

use sharegate_common::ShareToken;

use super::classify::{classify, strip_credentials, LineKind, UriRef};
use crate::error::{Error, Result};

/// The mandatory first tag of every HLS playlist.
pub const PLAYLIST_HEADER: &str = "#EXTM3U";

const BOM: char = '\u{feff}';

/// Path prefix every rewritten URI starts with.
pub fn proxy_prefix(token: &ShareToken) -> String {
    format!("/playlist/{token}/")
}

/// Rewrite an origin playlist for `token`.
///
/// Tag and blank lines are copied verbatim. Each URI line becomes
/// `/playlist/{token}/{path}`:
///
/// - absolute origin URIs keep only their final path component, placed in
///   the directory of the playlist being rewritten
/// - relative URIs keep their directory, with `.`, `..` and empty parts
///   resolved
/// - segment URIs lose their query string
/// - sub-playlist URIs keep their query string minus origin credentials
///
/// Line order and line terminators are preserved and lines already under
/// this token's prefix are left alone, so rewriting is deterministic and
/// rewriting a rewritten playlist is a no-op.
///
/// # Example
///
/// ```
/// use sharegate_common::ShareToken;
/// use sharegate_media::hls::rewrite_playlist;
///
/// let token: ShareToken = "abcdefghijklmnopqrstuvwxyz012345".parse().unwrap();
/// let out = rewrite_playlist("#EXTM3U\nhttp://origin/a/0.ts?apikey=X\n", &token).unwrap();
/// assert_eq!(out, format!("#EXTM3U\n/playlist/{token}/0.ts\n"));
/// ```
pub fn rewrite_playlist(body: &str, token: &ShareToken) -> Result<String> {
    rewrite_playlist_in(body, token, "")
}

/// Rewrite a playlist that was itself served from `base_dir` below the share
/// prefix (e.g. `hls1` for `hls1/main.m3u8`).
///
/// Relative URIs resolve against `base_dir` the way a player would resolve
/// them against the playlist URL; `..` never climbs above the share prefix.
/// Absolute URIs keep their final path component and land in `base_dir`
/// too, so a segment named by a full origin URL in `hls1/main.m3u8` is
/// fetched as `hls1/{name}`.
pub fn rewrite_playlist_in(body: &str, token: &ShareToken, base_dir: &str) -> Result<String> {
    let (bom, content) = match body.strip_prefix(BOM) {
        Some(rest) => (true, rest),
        None => (false, body),
    };
    if !content.starts_with(PLAYLIST_HEADER) {
        return Err(Error::invalid_playlist(format!(
            "missing {PLAYLIST_HEADER} header"
        )));
    }

    let prefix = proxy_prefix(token);
    let mut out = String::with_capacity(body.len() + body.len() / 2);
    if bom {
        out.push(BOM);
    }

    for chunk in content.split_inclusive('\n') {
        let (line, terminator) = split_terminator(chunk);
        match classify(line) {
            LineKind::Blank | LineKind::Tag => out.push_str(line),
            _ if line.trim().starts_with(&prefix) => out.push_str(line.trim()),
            LineKind::SubPlaylist(uri) => {
                out.push_str(&prefix);
                out.push_str(&proxy_relative_path(&uri, base_dir)?);
                if let Some(query) = uri.query.and_then(strip_credentials) {
                    out.push('?');
                    out.push_str(&query);
                }
            }
            LineKind::Segment(uri) => {
                out.push_str(&prefix);
                out.push_str(&proxy_relative_path(&uri, base_dir)?);
            }
        }
        out.push_str(terminator);
    }

    Ok(out)
}

fn split_terminator(chunk: &str) -> (&str, &str) {
    if let Some(line) = chunk.strip_suffix("\r\n") {
        (line, "\r\n")
    } else if let Some(line) = chunk.strip_suffix('\n') {
        (line, "\n")
    } else {
        (chunk, "")
    }
}

/// Path of a URI below the share prefix.
fn proxy_relative_path(uri: &UriRef<'_>, base_dir: &str) -> Result<String> {
    let path = if uri.absolute {
        match uri.basename() {
            "" | "." | ".." => return Err(Error::invalid_playlist("URI line without a file name")),
            name => resolve_relative(base_dir, name),
        }
    } else {
        resolve_relative(base_dir, uri.path)
    };
    if path.is_empty() || path == "." || path == ".." {
        return Err(Error::invalid_playlist("URI line without a file name"));
    }
    Ok(path)
}

/// Join `path` onto `base_dir`, applying `.` and `..` without leaving the
/// root.
fn resolve_relative(base_dir: &str, path: &str) -> String {
    let mut parts: Vec<&str> = base_dir
        .split('/')
        .filter(|part| !part.is_empty() && *part != "." && *part != "..")
        .collect();
    for part in path.split('/') {
        match part {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Directory part of a path below the share prefix (`""` at the root).
pub fn parent_dir(path: &str) -> &str {
    path.rsplit_once('/').map_or("", |(dir, _)| dir)
}

/// Normalize a relative path: drop empty, `.` and `..` components.
///
/// Applied to rewritten URIs and to the path a viewer requests, so a
/// request can never climb out of the share's origin directory. Returns
/// `None` when nothing is left.
pub fn normalize_path(path: &str) -> Option<String> {
    let parts: Vec<&str> = path
        .split('/')
        .filter(|part| !part.is_empty() && *part != "." && *part != "..")
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}
