//! Client identification utilities
//!
//! Resolves the client host recorded on new sessions.

use axum::http::HeaderMap;
use std::net::IpAddr;

/// Proxy header carrying the original client address chain
const FORWARDED_FOR: &str = "x-forwarded-for";

/// Extract client IP address from headers
///
/// Checks X-Forwarded-For header first (for reverse proxy setups),
/// then falls back to direct connection IP.
///
/// ## Arguments
/// * `headers` - HTTP request headers
/// * `direct_ip` - Direct connection IP address
///
/// ## Returns
/// The client IP address, or None if not determinable
pub fn extract_client_ip(headers: &HeaderMap, direct_ip: Option<IpAddr>) -> Option<IpAddr> {
    headers
        .get(FORWARDED_FOR)
        .and_then(|v| v.to_str().ok())
        .and_then(|xff| xff.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok())
        .or(direct_ip)
}

/// Client host as stored on a session (`None` when unknown)
pub fn client_host(headers: &HeaderMap, direct_ip: Option<IpAddr>) -> Option<String> {
    extract_client_ip(headers, direct_ip).map(|ip| ip.to_string())
}
