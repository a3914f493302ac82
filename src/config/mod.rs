mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config = parse_config(&content)
        .with_context(|| format!("Failed to load config file: {:?}", path))?;

    Ok(config)
}

/// Parse and validate configuration from TOML text
pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).context("Invalid TOML")?;
    validate_config(&config)?;
    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./config.toml",
        "./sharegate.toml",
        "~/.config/sharegate/config.toml",
        "/etc/sharegate/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            tracing::debug!("Using config file {:?}", path);
            return load_config(path);
        }
    }

    Ok(Config::default())
}

/// Validate configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if config.server.port == 0 {
        anyhow::bail!("Server port cannot be 0");
    }

    let auth = &config.server.auth;
    if auth.enabled && auth.api_key.as_deref().map_or(true, |k| k.trim().is_empty()) {
        anyhow::bail!("Admin auth is enabled but server.auth.api_key is not set");
    }

    if let Some(scene) = &config.scene_server {
        check_origin("scene_server", &scene.url, &scene.api_key)?;
    }
    if let Some(library) = &config.library_server {
        check_origin("library_server", &library.url, &library.api_key)?;
    }

    let public_url = config.server.public_url.trim();
    if !public_url.is_empty()
        && !(public_url.starts_with("http://") || public_url.starts_with("https://"))
    {
        anyhow::bail!("server.public_url must start with http:// or https://");
    }

    if config.proxy.default_expiry_days == 0 {
        anyhow::bail!("proxy.default_expiry_days must be at least 1");
    }
    if config.proxy.default_expiry_days > sharegate_common::MAX_EXPIRY_DAYS {
        anyhow::bail!(
            "proxy.default_expiry_days may be at most {}",
            sharegate_common::MAX_EXPIRY_DAYS
        );
    }
    if config.proxy.connect_timeout_secs == 0 || config.proxy.read_timeout_secs == 0 {
        anyhow::bail!("proxy timeouts must be at least 1 second");
    }
    if axum::http::HeaderValue::from_str(&config.proxy.cache_control).is_err() {
        anyhow::bail!("proxy.cache_control is not a valid header value");
    }

    Ok(())
}

fn check_origin(name: &str, url: &str, api_key: &str) -> Result<()> {
    if url.trim().is_empty() {
        anyhow::bail!("{name}.url is empty");
    }
    reqwest::Url::parse(url).with_context(|| format!("{name}.url is not a valid URL"))?;
    if api_key.trim().is_empty() {
        anyhow::bail!("{name}.api_key is empty");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.db_path, "sharegate.db");
        assert!(!config.server.trust_forwarded_for);
        assert!(!config.server.auth.enabled);
        assert!(config.scene_server.is_none());
        assert!(config.library_server.is_none());
        assert_eq!(config.proxy.connect_timeout_secs, 10);
        assert_eq!(config.proxy.read_timeout_secs, 60);
        assert_eq!(config.proxy.default_expiry_days, 7);
        assert_eq!(config.proxy.purge_interval_secs, 300);
    }

    #[test]
    fn test_full_config() {
        let config = parse_config(
            r#"
            [server]
            port = 9000
            public_url = "https://share.example.com"
            db_path = "/var/lib/sharegate/shares.db"
            trust_forwarded_for = true

            [server.auth]
            enabled = true
            api_key = "secret"

            [scene_server]
            url = "http://stash:9999"
            api_key = "stash-key"

            [library_server]
            url = "http://jellyfin:8096"
            api_key = "jf-key"
            user_id = "0123abcd"

            [proxy]
            read_timeout_secs = 120
            cache_control = "no-store"
            "#,
        )
        .unwrap();

        assert_eq!(config.server.port, 9000);
        assert!(config.server.trust_forwarded_for);
        assert_eq!(config.server.auth.api_key.as_deref(), Some("secret"));
        assert_eq!(config.scene_server.unwrap().url, "http://stash:9999");
        let library = config.library_server.unwrap();
        assert_eq!(library.user_id.as_deref(), Some("0123abcd"));
        assert_eq!(config.proxy.read_timeout_secs, 120);
        assert_eq!(config.proxy.cache_control, "no-store");
        assert_eq!(config.proxy.connect_timeout_secs, 10);
    }

    #[test]
    fn test_rejects_port_zero() {
        assert!(parse_config("[server]\nport = 0\n").is_err());
    }

    #[test]
    fn test_rejects_auth_without_key() {
        assert!(parse_config("[server.auth]\nenabled = true\n").is_err());
        assert!(parse_config("[server.auth]\nenabled = true\napi_key = \" \"\n").is_err());
    }

    #[test]
    fn test_rejects_incomplete_origin() {
        assert!(parse_config("[scene_server]\nurl = \"\"\napi_key = \"k\"\n").is_err());
        assert!(parse_config("[scene_server]\nurl = \"http://x\"\napi_key = \"\"\n").is_err());
        assert!(parse_config("[library_server]\nurl = \"not a url\"\napi_key = \"k\"\n").is_err());
    }

    #[test]
    fn test_rejects_unbounded_default_expiry() {
        assert!(parse_config("[proxy]\ndefault_expiry_days = 0\n").is_err());
        assert!(parse_config("[proxy]\ndefault_expiry_days = 4000000000\n").is_err());
        assert!(parse_config("[proxy]\ndefault_expiry_days = 3650\n").is_ok());
    }

    #[test]
    fn test_rejects_relative_public_url() {
        assert!(parse_config("[server]\npublic_url = \"share.example.com\"\n").is_err());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[server]\nport = 8181\n").unwrap();

        let config = load_config_or_default(Some(&path)).unwrap();
        assert_eq!(config.server.port, 8181);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_config(&dir.path().join("missing.toml")).is_err());
    }
}
