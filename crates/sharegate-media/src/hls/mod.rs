//! HLS playlist handling.
//!
//! [`classify`] decides what each playlist line is; [`rewrite_playlist`]
//! turns an origin playlist into one that only references the proxy.

mod classify;
mod rewrite;

pub use classify::{
    classify, content_type_for, is_credential_param, is_known_segment_path, is_playlist_path,
    strip_credentials, LineKind, UriRef, CREDENTIAL_PARAMS, PLAYLIST_EXTENSIONS,
    SEGMENT_EXTENSIONS,
};
pub use rewrite::{
    normalize_path, parent_dir, proxy_prefix, rewrite_playlist, rewrite_playlist_in,
    PLAYLIST_HEADER,
};
