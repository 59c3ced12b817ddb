//! Client address and agent extraction from proxy headers.

use axum::http::{HeaderMap, header};

pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";
pub const REAL_IP_HEADER: &str = "x-real-ip";
pub const UNKNOWN: &str = "unknown";

/// First `x-forwarded-for` segment, else `x-real-ip`.
pub fn forwarded_client_ip(headers: &HeaderMap) -> Option<String> {
    let forwarded = headers
        .get(FORWARDED_FOR_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let real_ip = || {
        headers
            .get(REAL_IP_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|s| !s.is_empty())
    };

    forwarded.or_else(real_ip).map(str::to_string)
}

/// Client IP for audit records, `"unknown"` when no proxy header is present.
pub fn client_ip_or_unknown(headers: &HeaderMap) -> String {
    forwarded_client_ip(headers).unwrap_or_else(|| UNKNOWN.to_string())
}

/// `User-Agent` header, `"unknown"` when absent or not valid UTF-8.
pub fn user_agent_or_unknown(headers: &HeaderMap) -> String {
    headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| UNKNOWN.to_string())
}
