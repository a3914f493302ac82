//! Access decisions for share requests.
//!
//! [`evaluate`] is a pure function of the record, the clock and the caller's
//! address. It never mutates anything; callers decide whether an admitted
//! request goes on to consume a view.
//!
//! Deny reasons are checked in a fixed order, first match wins:
//!
//! 1. `Expired`: `now >= expires_at`
//! 2. `QuotaExhausted`: `max_views` set and `views >= max_views`
//! 3. `IpNotAllowed`: allowlist non-empty and the caller is not on it

use chrono::{DateTime, Utc};
use std::net::IpAddr;

use crate::types::ShareRecord;

/// Why a request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    Expired,
    QuotaExhausted,
    IpNotAllowed,
}

impl DenyReason {
    /// Whether the share itself is dead (as opposed to this caller being
    /// refused). Dead shares get purged on detection.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Expired | Self::QuotaExhausted)
    }
}

/// Outcome of an access check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Admit,
    Deny(DenyReason),
}

impl Verdict {
    pub fn is_admit(&self) -> bool {
        matches!(self, Self::Admit)
    }
}

/// Evaluate a request that starts a new view (master playlist, direct
/// stream).
pub fn evaluate(record: &ShareRecord, now: DateTime<Utc>, request_ip: Option<IpAddr>) -> Verdict {
    if let Some(reason) = lifetime_check(record, now) {
        return Verdict::Deny(reason);
    }
    ip_check(record, request_ip)
}

/// Evaluate a request that continues a view already counted (segments and
/// sub-playlists). Same as [`evaluate`] without the quota check.
pub fn evaluate_continuation(
    record: &ShareRecord,
    now: DateTime<Utc>,
    request_ip: Option<IpAddr>,
) -> Verdict {
    if now >= record.expires_at {
        return Verdict::Deny(DenyReason::Expired);
    }
    ip_check(record, request_ip)
}

/// Expiry and quota checks only. Used by the store's atomic consume, where
/// the caller's address has already been checked.
pub fn lifetime_check(record: &ShareRecord, now: DateTime<Utc>) -> Option<DenyReason> {
    if now >= record.expires_at {
        Some(DenyReason::Expired)
    } else if record.quota_reached() {
        Some(DenyReason::QuotaExhausted)
    } else {
        None
    }
}

fn ip_check(record: &ShareRecord, request_ip: Option<IpAddr>) -> Verdict {
    if record.allowed_ips.is_empty() {
        return Verdict::Admit;
    }
    match request_ip {
        Some(ip) if record.allowed_ips.contains(&canonical(ip)) => Verdict::Admit,
        _ => Verdict::Deny(DenyReason::IpNotAllowed),
    }
}

/// IPv4 clients reaching a dual-stack listener show up as `::ffff:a.b.c.d`.
fn canonical(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6
            .to_ipv4_mapped()
            .map(IpAddr::V4)
            .unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    }
}
