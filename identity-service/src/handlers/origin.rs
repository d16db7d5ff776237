use axum::{
    extract::ConnectInfo,
    http::{header, HeaderMap},
};
use std::net::SocketAddr;

/// Placeholder stored when neither a proxy header nor the socket peer is known.
pub const UNKNOWN_ORIGIN: &str = "unknown";

/// Network address of the caller: first `x-forwarded-for` hop, then
/// `x-real-ip`, then the socket peer.
pub fn origin_address(headers: &HeaderMap, connect_info: Option<&ConnectInfo<SocketAddr>>) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .or_else(|| {
            headers
                .get("x-real-ip")
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|s| !s.is_empty())
        })
        .map(str::to_string)
        .or_else(|| connect_info.map(|ConnectInfo(addr)| addr.ip().to_string()))
        .unwrap_or_else(|| UNKNOWN_ORIGIN.to_string())
}

/// Device label from the request body, falling back to the User-Agent.
pub fn device_info(explicit: Option<String>, headers: &HeaderMap) -> String {
    explicit
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .or_else(|| {
            headers
                .get(header::USER_AGENT)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        })
        .unwrap_or_default()
}
