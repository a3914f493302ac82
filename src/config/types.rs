use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    /// Scene/file server origin. Shares of that kind are refused without it.
    #[serde(default)]
    pub scene_server: Option<SceneServerConfig>,

    /// Library server origin. Shares of that kind are refused without it.
    #[serde(default)]
    pub library_server: Option<LibraryServerConfig>,

    #[serde(default)]
    pub proxy: ProxyConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Externally visible base URL used when building share links.
    /// Empty means share links are returned as relative paths.
    #[serde(default)]
    pub public_url: String,

    /// SQLite database file holding the shares.
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Take the client address from the first `X-Forwarded-For` entry.
    /// Only enable behind a reverse proxy that sets the header.
    #[serde(default)]
    pub trust_forwarded_for: bool,

    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AuthConfig {
    /// Require the admin API key on share management routes
    #[serde(default)]
    pub enabled: bool,

    /// API key for the admin API (used with Authorization: Bearer header)
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_port() -> u16 {
    8080
}
fn default_db_path() -> String {
    "sharegate.db".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: String::new(),
            db_path: default_db_path(),
            trust_forwarded_for: false,
            auth: AuthConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SceneServerConfig {
    pub url: String,

    pub api_key: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LibraryServerConfig {
    pub url: String,

    pub api_key: String,

    /// User whose playlists can be imported as shares.
    #[serde(default)]
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProxyConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Maximum idle time between two reads from the origin.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,

    /// Share lifetime when a create request does not specify one.
    #[serde(default = "default_expiry_days")]
    pub default_expiry_days: u32,

    /// `Cache-Control` value set on playlist, segment and direct responses.
    #[serde(default = "default_cache_control")]
    pub cache_control: String,

    /// Seconds between background purges of dead shares (0 disables).
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,

    /// Seconds a rewritten playlist is reused before the origin is asked
    /// again (0 disables caching).
    #[serde(default = "default_playlist_cache")]
    pub playlist_cache_secs: u64,
}

fn default_connect_timeout() -> u64 {
    10
}
fn default_read_timeout() -> u64 {
    60
}
fn default_expiry_days() -> u32 {
    7
}
fn default_cache_control() -> String {
    "public, max-age=0, s-maxage=86400".to_string()
}
fn default_purge_interval() -> u64 {
    300
}
fn default_playlist_cache() -> u64 {
    30
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            default_expiry_days: default_expiry_days(),
            cache_control: default_cache_control(),
            purge_interval_secs: default_purge_interval(),
            playlist_cache_secs: default_playlist_cache(),
        }
    }
}

impl ProxyConfig {
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn playlist_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.playlist_cache_secs)
    }
}
