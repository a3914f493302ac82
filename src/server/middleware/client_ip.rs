//! Requester address extraction for IP allowlists.

use std::convert::Infallible;
use std::net::{IpAddr, SocketAddr};

use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use axum::http::HeaderMap;

use crate::server::context::AppContext;

/// Address the request is attributed to.
///
/// The peer address of the TCP connection, or the first `X-Forwarded-For`
/// entry when `server.trust_forwarded_for` is set. `None` when neither is
/// available, which fails any non-empty allowlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientIp(pub Option<IpAddr>);

impl FromRequestParts<AppContext> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &AppContext,
    ) -> Result<Self, Self::Rejection> {
        Ok(Self(resolve(
            &parts.headers,
            parts
                .extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip()),
            ctx.config.server.trust_forwarded_for,
        )))
    }
}

fn resolve(headers: &HeaderMap, peer: Option<IpAddr>, trust_forwarded_for: bool) -> Option<IpAddr> {
    if trust_forwarded_for {
        if let Some(ip) = forwarded_for(headers) {
            return Some(ip);
        }
    }
    peer
}

/// First address of the `X-Forwarded-For` chain.
fn forwarded_for(headers: &HeaderMap) -> Option<IpAddr> {
    let first = headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim();
    first
        .parse::<IpAddr>()
        .ok()
        .or_else(|| first.parse::<SocketAddr>().ok().map(|addr| addr.ip()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(xff: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_str(xff).unwrap());
        headers
    }

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_peer_address_by_default() {
        let resolved = resolve(&headers("10.0.0.5"), Some(ip("192.168.1.2")), false);
        assert_eq!(resolved, Some(ip("192.168.1.2")));
    }

    #[test]
    fn test_trusted_forwarded_for() {
        let resolved = resolve(
            &headers("10.0.0.5, 172.16.0.1"),
            Some(ip("127.0.0.1")),
            true,
        );
        assert_eq!(resolved, Some(ip("10.0.0.5")));
    }

    #[test]
    fn test_forwarded_for_with_port() {
        assert_eq!(forwarded_for(&headers("10.0.0.5:4431")), Some(ip("10.0.0.5")));
        assert_eq!(forwarded_for(&headers("[::1]:80")), Some(ip("::1")));
    }

    #[test]
    fn test_garbage_forwarded_for_falls_back_to_peer() {
        let resolved = resolve(&headers("unknown"), Some(ip("127.0.0.1")), true);
        assert_eq!(resolved, Some(ip("127.0.0.1")));
        assert_eq!(resolve(&HeaderMap::new(), None, true), None);
    }
}
