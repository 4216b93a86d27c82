use std::net::{IpAddr, SocketAddr};

use axum::http::HeaderMap;

/// Resolve the IP a connection is rate limited under.
///
/// Without a trusted proxy in front the TCP peer is the client. Behind one,
/// the first `X-Forwarded-For` entry is used, falling back to the peer when
/// the header is missing or malformed.
pub fn client_ip(peer: SocketAddr, headers: &HeaderMap, trust_proxy: bool) -> IpAddr {
    if trust_proxy {
        if let Some(ip) = forwarded_ip(headers) {
            return ip.to_canonical();
        }
    }
    peer.ip().to_canonical()
}

fn forwarded_ip(headers: &HeaderMap) -> Option<IpAddr> {
    headers
        .get("x-forwarded-for")?
        .to_str()
        .ok()?
        .split(',')
        .next()?
        .trim()
        .parse()
        .ok()
}
