//! Sharegate-Media: HLS playlist handling
//!
//! Origin playlists carry origin hostnames and API keys. Before a playlist
//! reaches a viewer every URI line is rewritten to a path under the share's
//! proxy prefix, so the viewer only ever talks to the proxy.
//!
//! # Modules
//!
//! - `hls` - line classification and playlist rewriting
//! - `error` - error type for this crate

pub mod error;
pub mod hls;

pub use error::{Error, Result};
pub use hls::{rewrite_playlist, rewrite_playlist_in, LineKind};
