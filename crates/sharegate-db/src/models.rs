//! Row mapping between the `shares` table and [`ShareRecord`].

use std::collections::BTreeSet;
use std::net::IpAddr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use sharegate_common::{BackendKind, OriginRef, ShareRecord, ShareToken, StreamResolution};

/// Column list matching [`share_from_row`].
pub const SHARE_COLS: &str = "token, backend, scene_id, resolution, item_id, media_source_id, \
                              display_name, expires_at, max_views, views, allowed_ips, created_at";

/// Fixed-width UTC timestamp so that text comparison in SQL is chronological.
pub fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn conversion_err<E>(idx: usize, e: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e))
}

fn parse_ts(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let s: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_err(idx, e))
}

fn parse_text<T>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let s: String = row.get(idx)?;
    s.parse().map_err(|e| conversion_err(idx, e))
}

/// Build a [`ShareRecord`] from a row selected with [`SHARE_COLS`].
pub fn share_from_row(row: &rusqlite::Row) -> rusqlite::Result<ShareRecord> {
    let token: ShareToken = parse_text(row, 0)?;
    let backend: BackendKind = parse_text(row, 1)?;

    let origin = match backend {
        BackendKind::SceneServer => OriginRef::SceneServer {
            scene_id: row.get(2)?,
            resolution: parse_text::<StreamResolution>(row, 3)?,
        },
        BackendKind::LibraryServer => OriginRef::LibraryServer {
            item_id: row.get(4)?,
            media_source_id: row.get(5)?,
        },
    };

    let ips_json: String = row.get(10)?;
    let allowed_ips: BTreeSet<IpAddr> =
        serde_json::from_str(&ips_json).map_err(|e| conversion_err(10, e))?;

    Ok(ShareRecord {
        token,
        origin,
        display_name: row.get(6)?,
        expires_at: parse_ts(row, 7)?,
        max_views: row.get(8)?,
        views: row.get(9)?,
        allowed_ips,
        created_at: parse_ts(row, 11)?,
    })
}

/// Flattened origin columns: (scene_id, resolution, item_id, media_source_id).
pub fn origin_columns(
    origin: &OriginRef,
) -> (Option<&str>, Option<&'static str>, Option<&str>, Option<&str>) {
    match origin {
        OriginRef::SceneServer {
            scene_id,
            resolution,
        } => (Some(scene_id.as_str()), Some(resolution.as_str()), None, None),
        OriginRef::LibraryServer {
            item_id,
            media_source_id,
        } => (None, None, Some(item_id.as_str()), Some(media_source_id.as_str())),
    }
}

/// Serialize an allowlist for the `allowed_ips` column.
pub fn ips_to_json(ips: &BTreeSet<IpAddr>) -> String {
    // A set of IpAddr always serializes.
    serde_json::to_string(ips).unwrap_or_else(|_| "[]".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_ts_is_fixed_width() {
        let a = Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap();
        let b = a + chrono::Duration::microseconds(1);
        assert_eq!(format_ts(a), "2026-01-02T03:04:05.000000Z");
        assert_eq!(format_ts(a).len(), format_ts(b).len());
        assert!(format_ts(a) < format_ts(b));
    }

    #[test]
    fn test_ips_json() {
        let ips: BTreeSet<IpAddr> = ["10.0.0.5".parse().unwrap(), "::1".parse().unwrap()]
            .into_iter()
            .collect();
        let json = ips_to_json(&ips);
        let back: BTreeSet<IpAddr> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, ips);
    }
}
