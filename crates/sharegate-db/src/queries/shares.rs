//! Share record operations.
//!
//! All functions take a plain `&Connection`. Read-modify-write operations
//! open an immediate transaction so the write lock is taken before the read,
//! which serializes concurrent writers on the same database file.

use chrono::{DateTime, Datelike, Utc};
use rusqlite::{named_params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use sharegate_common::guard::{self, Verdict};
use sharegate_common::{Error, Result, ShareRecord, ShareToken};

use crate::models::{format_ts, ips_to_json, origin_columns, share_from_row, SHARE_COLS};

/// Predicate selecting dead rows; expects a `:now` parameter.
const DEAD_PREDICATE: &str =
    "(expires_at <= :now OR (max_views IS NOT NULL AND views >= max_views))";

fn begin_immediate(conn: &Connection) -> Result<Transaction<'_>> {
    Transaction::new_unchecked(conn, TransactionBehavior::Immediate)
        .map_err(|e| Error::database(e.to_string()))
}

fn select_share(conn: &Connection, token: &ShareToken) -> Result<Option<ShareRecord>> {
    let q = format!("SELECT {SHARE_COLS} FROM shares WHERE token = ?1");
    conn.query_row(&q, [token.as_str()], share_from_row)
        .optional()
        .map_err(|e| Error::database(e.to_string()))
}

/// Timestamps are stored as fixed-width RFC 3339 text, which only holds
/// four-digit years.
fn check_storable(record: &ShareRecord) -> Result<()> {
    for (field, ts) in [("expires_at", record.expires_at), ("created_at", record.created_at)] {
        if !(0..=9999).contains(&ts.year()) {
            return Err(Error::validation(format!("{field} is outside the supported range")));
        }
    }
    Ok(())
}

/// Insert a new share record.
pub fn insert_share(conn: &Connection, record: &ShareRecord) -> Result<()> {
    check_storable(record)?;
    let (scene_id, resolution, item_id, media_source_id) = origin_columns(&record.origin);

    conn.execute(
        "INSERT INTO shares (token, backend, scene_id, resolution, item_id, media_source_id,
                             display_name, expires_at, max_views, views, allowed_ips, created_at)
         VALUES (:token, :backend, :scene_id, :resolution, :item_id, :media_source_id,
                 :display_name, :expires_at, :max_views, :views, :allowed_ips, :created_at)",
        named_params! {
            ":token": record.token.as_str(),
            ":backend": record.backend().to_string(),
            ":scene_id": scene_id,
            ":resolution": resolution,
            ":item_id": item_id,
            ":media_source_id": media_source_id,
            ":display_name": record.display_name,
            ":expires_at": format_ts(record.expires_at),
            ":max_views": record.max_views,
            ":views": record.views,
            ":allowed_ips": ips_to_json(&record.allowed_ips),
            ":created_at": format_ts(record.created_at),
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

/// Get a share by token.
pub fn get_share(conn: &Connection, token: &ShareToken) -> Result<Option<ShareRecord>> {
    select_share(conn, token)
}

/// List all shares, oldest first.
pub fn list_shares(conn: &Connection) -> Result<Vec<ShareRecord>> {
    let q = format!("SELECT {SHARE_COLS} FROM shares ORDER BY created_at ASC, token ASC");
    let mut stmt = conn.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map([], share_from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

/// Apply `mutator` to a share and write back its editable fields.
///
/// The token, backend kind, view count and creation time are fixed; a
/// mutator that changes them is rejected. If the mutator returns an error
/// nothing is written.
pub fn update_share<F>(conn: &Connection, token: &ShareToken, mutator: F) -> Result<ShareRecord>
where
    F: FnOnce(&mut ShareRecord) -> Result<()>,
{
    let tx = begin_immediate(conn)?;

    let original = select_share(&tx, token)?.ok_or_else(|| Error::not_found(token.as_str()))?;
    let mut record = original.clone();
    mutator(&mut record)?;

    if record.token != original.token
        || record.backend() != original.backend()
        || record.views != original.views
        || record.created_at != original.created_at
    {
        return Err(Error::validation(
            "token, backend, views and created_at cannot be edited",
        ));
    }
    record.origin.validate()?;
    check_storable(&record)?;
    if let Some(max) = record.max_views {
        if max == 0 {
            return Err(Error::validation("max_views must be a positive integer"));
        }
        if max < record.views {
            return Err(Error::validation(format!(
                "max_views ({max}) is below the views already used ({})",
                record.views
            )));
        }
    }

    let (scene_id, resolution, item_id, media_source_id) = origin_columns(&record.origin);
    tx.execute(
        "UPDATE shares SET
            scene_id = :scene_id,
            resolution = :resolution,
            item_id = :item_id,
            media_source_id = :media_source_id,
            display_name = :display_name,
            expires_at = :expires_at,
            max_views = :max_views,
            allowed_ips = :allowed_ips
         WHERE token = :token",
        named_params! {
            ":token": token.as_str(),
            ":scene_id": scene_id,
            ":resolution": resolution,
            ":item_id": item_id,
            ":media_source_id": media_source_id,
            ":display_name": record.display_name,
            ":expires_at": format_ts(record.expires_at),
            ":max_views": record.max_views,
            ":allowed_ips": ips_to_json(&record.allowed_ips),
        },
    )
    .map_err(|e| Error::database(e.to_string()))?;

    tx.commit().map_err(|e| Error::database(e.to_string()))?;
    Ok(record)
}

/// Delete a share. Returns `true` if a row was removed.
pub fn delete_share(conn: &Connection, token: &ShareToken) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM shares WHERE token = ?1", [token.as_str()])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Delete a share only if it is still dead at `now`.
///
/// Used for lazy purging on contact: an admin edit that revived the share
/// between the check and the delete wins.
pub fn delete_if_dead(conn: &Connection, token: &ShareToken, now: DateTime<Utc>) -> Result<bool> {
    let q = format!("DELETE FROM shares WHERE token = :token AND {DEAD_PREDICATE}");
    let n = conn
        .execute(
            &q,
            named_params! { ":token": token.as_str(), ":now": format_ts(now) },
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Atomically check expiry and quota and count one view if admissible.
///
/// Returns the verdict together with the record as it stands after the
/// call (post-increment when admitted). The address allowlist is not
/// checked here.
pub fn consume_view(
    conn: &Connection,
    token: &ShareToken,
    now: DateTime<Utc>,
) -> Result<(Verdict, ShareRecord)> {
    let tx = begin_immediate(conn)?;

    let mut record = select_share(&tx, token)?.ok_or_else(|| Error::not_found(token.as_str()))?;

    if let Some(reason) = guard::lifetime_check(&record, now) {
        // Nothing written; dropping the transaction rolls back.
        return Ok((Verdict::Deny(reason), record));
    }

    tx.execute(
        "UPDATE shares SET views = views + 1 WHERE token = ?1",
        [token.as_str()],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    tx.commit().map_err(|e| Error::database(e.to_string()))?;

    record.views += 1;
    Ok((Verdict::Admit, record))
}

/// Delete every dead share and return the removed tokens.
pub fn purge_dead(conn: &Connection, now: DateTime<Utc>) -> Result<Vec<ShareToken>> {
    let tx = begin_immediate(conn)?;
    let now = format_ts(now);

    let tokens = {
        let q = format!("SELECT token FROM shares WHERE {DEAD_PREDICATE} ORDER BY token");
        let mut stmt = tx.prepare(&q).map_err(|e| Error::database(e.to_string()))?;
        let rows = stmt
            .query_map(named_params! { ":now": now }, |row| row.get::<_, String>(0))
            .map_err(|e| Error::database(e.to_string()))?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::database(e.to_string()))?;
        rows.into_iter()
            .filter_map(|t| t.parse::<ShareToken>().ok())
            .collect::<Vec<_>>()
    };

    let q = format!("DELETE FROM shares WHERE {DEAD_PREDICATE}");
    tx.execute(&q, named_params! { ":now": now })
        .map_err(|e| Error::database(e.to_string()))?;
    tx.commit().map_err(|e| Error::database(e.to_string()))?;

    Ok(tokens)
}
