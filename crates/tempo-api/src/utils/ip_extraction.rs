//! Client IP extraction
//!
//! Extracts the client address from X-Forwarded-For chains behind a known
//! number of trusted proxies, with validation so spoofed header values never
//! end up in audit logs.

use axum::http::HeaderMap;
use std::net::IpAddr;

/// Extract the client IP for a request.
///
/// Order of precedence: X-Forwarded-For (validated against the trusted proxy
/// count), then X-Real-IP, then the direct socket address. Returns `None`
/// when nothing yields a parseable address.
pub fn extract_client_ip(
    headers: &HeaderMap,
    socket_addr: Option<&std::net::SocketAddr>,
    trusted_proxy_count: usize,
) -> Option<String> {
    if let Some(value) = headers.get("x-forwarded-for").and_then(|h| h.to_str().ok()) {
        if let Some(ip) = client_ip_from_chain(value, trusted_proxy_count) {
            return Some(ip);
        }
    }

    if let Some(value) = headers.get("x-real-ip").and_then(|h| h.to_str().ok()) {
        let trimmed = value.trim();
        if is_valid_ip(trimmed) {
            return Some(trimmed.to_string());
        }
    }

    socket_addr.map(|addr| addr.ip().to_string())
}

/// Pick the client entry out of an X-Forwarded-For chain.
///
/// The chain reads `client, proxy1, proxy2, ...`. With N trusted proxies the
/// client sits N+1 entries from the end. With zero trusted proxies the header
/// cannot be trusted at all, so only the last entry (the peer that actually
/// connected) is usable.
fn client_ip_from_chain(header_value: &str, trusted_proxy_count: usize) -> Option<String> {
    let ips: Vec<&str> = header_value
        .split(',')
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect();

    let candidate = if trusted_proxy_count == 0 || ips.len() <= trusted_proxy_count {
        ips.last()?
    } else {
        ips.get(ips.len() - trusted_proxy_count - 1)?
    };

    if is_valid_ip(candidate) {
        Some(candidate.to_string())
    } else {
        None
    }
}

fn is_valid_ip(ip_str: &str) -> bool {
    ip_str.parse::<IpAddr>().is_ok()
}
