//! Share records and origin references.
//!
//! The two origin backends are modelled as a tagged enum so a share always
//! carries exactly the identifiers its backend needs.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::net::IpAddr;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::ids::ShareToken;

/// Which origin backend a share points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// Scene/file server: direct file streaming plus HLS.
    SceneServer,
    /// Library server: HLS only, addressed by item and media source.
    LibraryServer,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SceneServer => write!(f, "scene_server"),
            Self::LibraryServer => write!(f, "library_server"),
        }
    }
}

impl FromStr for BackendKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "scene_server" => Ok(Self::SceneServer),
            "library_server" => Ok(Self::LibraryServer),
            other => Err(Error::validation(format!("unknown backend: {other}"))),
        }
    }
}

/// Transcode resolution selector understood by the scene server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamResolution {
    Low,
    Standard,
    StandardHd,
    FullHd,
    FourK,
    #[default]
    Original,
}

impl StreamResolution {
    /// Query-string value sent to the scene server.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Standard => "STANDARD",
            Self::StandardHd => "STANDARD_HD",
            Self::FullHd => "FULL_HD",
            Self::FourK => "FOUR_K",
            Self::Original => "ORIGINAL",
        }
    }
}

impl fmt::Display for StreamResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StreamResolution {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "LOW" => Ok(Self::Low),
            "STANDARD" => Ok(Self::Standard),
            "STANDARD_HD" => Ok(Self::StandardHd),
            "FULL_HD" => Ok(Self::FullHd),
            "FOUR_K" => Ok(Self::FourK),
            "ORIGINAL" => Ok(Self::Original),
            other => Err(Error::validation(format!("unknown resolution: {other}"))),
        }
    }
}

/// Backend-specific locator of the shared media.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum OriginRef {
    SceneServer {
        scene_id: String,
        #[serde(default)]
        resolution: StreamResolution,
    },
    LibraryServer {
        item_id: String,
        /// Resolved once at creation time and cached here.
        media_source_id: String,
    },
}

impl OriginRef {
    pub fn kind(&self) -> BackendKind {
        match self {
            Self::SceneServer { .. } => BackendKind::SceneServer,
            Self::LibraryServer { .. } => BackendKind::LibraryServer,
        }
    }

    /// Reject empty identifiers and identifiers that would escape a URL path
    /// segment on the origin.
    pub fn validate(&self) -> Result<()> {
        let ids: Vec<(&str, &str)> = match self {
            Self::SceneServer { scene_id, .. } => vec![("scene_id", scene_id.as_str())],
            Self::LibraryServer {
                item_id,
                media_source_id,
            } => vec![
                ("item_id", item_id.as_str()),
                ("media_source_id", media_source_id.as_str()),
            ],
        };
        for (field, value) in ids {
            validate_origin_id(field, value)?;
        }
        Ok(())
    }
}

/// Check a single origin identifier.
pub fn validate_origin_id(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{field} is required")));
    }
    if !value
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
    {
        return Err(Error::validation(format!(
            "{field} may only contain letters, digits, '-' and '_'"
        )));
    }
    Ok(())
}

/// The unit of sharing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareRecord {
    pub token: ShareToken,
    pub origin: OriginRef,
    pub display_name: String,
    pub expires_at: DateTime<Utc>,
    pub max_views: Option<u32>,
    pub views: u32,
    pub allowed_ips: BTreeSet<IpAddr>,
    pub created_at: DateTime<Utc>,
}

impl ShareRecord {
    /// Build a fresh record with a newly generated token and zero views.
    pub fn new(
        origin: OriginRef,
        display_name: impl Into<String>,
        expires_at: DateTime<Utc>,
        max_views: Option<u32>,
        allowed_ips: BTreeSet<IpAddr>,
    ) -> Self {
        Self {
            token: ShareToken::generate(),
            origin,
            display_name: display_name.into(),
            expires_at,
            max_views,
            views: 0,
            allowed_ips,
            created_at: Utc::now(),
        }
    }

    pub fn backend(&self) -> BackendKind {
        self.origin.kind()
    }

    /// Whether the share can no longer be played at `now`.
    pub fn is_dead(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at || self.quota_reached()
    }

    pub fn quota_reached(&self) -> bool {
        self.max_views.is_some_and(|max| self.views >= max)
    }

    /// Path of the link handed out to viewers, relative to the proxy root.
    pub fn share_path(&self) -> String {
        match self.origin {
            OriginRef::SceneServer { .. } => format!("/stream/{}", self.token),
            OriginRef::LibraryServer { .. } => format!("/playlist/{}/master.m3u8", self.token),
        }
    }

    /// MIME type of the link returned by [`ShareRecord::share_path`].
    pub fn share_mime_type(&self) -> &'static str {
        match self.origin {
            OriginRef::SceneServer { .. } => "video/mp4",
            OriginRef::LibraryServer { .. } => "application/x-mpegURL",
        }
    }
}

/// Parse a list of IP literals into a set, rejecting anything malformed.
pub fn parse_ip_allowlist<I, S>(ips: I) -> Result<BTreeSet<IpAddr>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    ips.into_iter()
        .map(|raw| raw.as_ref().trim().to_string())
        .filter(|raw| !raw.is_empty())
        .map(|raw| {
            raw.parse::<IpAddr>()
                .map_err(|_| Error::validation(format!("invalid IP address: {raw}")))
        })
        .collect()
}

/// Validate a requested view quota. Zero is not a quota.
pub fn validate_max_views(max_views: Option<u32>) -> Result<Option<u32>> {
    match max_views {
        Some(0) => Err(Error::validation("max_views must be a positive integer")),
        other => Ok(other),
    }
}

/// Longest lifetime a share can be given, in days.
pub const MAX_EXPIRY_DAYS: u32 = 3650;

/// Expiry instant `days` after `now`.
pub fn expiry_after_days(now: DateTime<Utc>, days: u32) -> Result<DateTime<Utc>> {
    if days == 0 {
        return Err(Error::validation("expires_in_days must be at least 1"));
    }
    if days > MAX_EXPIRY_DAYS {
        return Err(Error::validation(format!(
            "expires_in_days may be at most {MAX_EXPIRY_DAYS}"
        )));
    }
    now.checked_add_signed(Duration::days(i64::from(days)))
        .ok_or_else(|| Error::validation("expires_in_days is out of range"))
}

/// Reject an expiry more than [`MAX_EXPIRY_DAYS`] after `now`.
pub fn check_expiry_bound(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> Result<()> {
    let limit = now
        .checked_add_signed(Duration::days(i64::from(MAX_EXPIRY_DAYS)))
        .unwrap_or(DateTime::<Utc>::MAX_UTC);
    if expires_at > limit {
        return Err(Error::validation(format!(
            "expires_at may be at most {MAX_EXPIRY_DAYS} days ahead"
        )));
    }
    Ok(())
}
