//! Client IP extraction utilities.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, Request};

/// Header a reverse proxy puts the client address in.
#[derive(clap::ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientIpHeader {
    /// `X-Forwarded-For`, first entry
    XForwardedFor,
    /// `X-Real-IP`
    XRealIp,
}

impl ClientIpHeader {
    fn header_name(&self) -> &'static str {
        match self {
            ClientIpHeader::XForwardedFor => "x-forwarded-for",
            ClientIpHeader::XRealIp => "x-real-ip",
        }
    }
}

/// Extract client IP address based on configuration.
///
/// If `ip_header` is set, reads the configured header and returns an error
/// if it is missing or invalid (does NOT fall back to the socket address).
///
/// If `ip_header` is None, uses the SocketAddr from ConnectInfo.
pub fn extract_client_ip(
    request: &Request,
    ip_header: Option<ClientIpHeader>,
) -> Result<String, &'static str> {
    match ip_header {
        Some(header) => {
            let value = request
                .headers()
                .get(header.header_name())
                .ok_or("IP header not present")?
                .to_str()
                .map_err(|_| "IP header contains invalid characters")?;
            let ip = value.split(',').next().unwrap_or("").trim();
            if ip.is_empty() {
                return Err("IP header is empty");
            }
            Ok(ip.to_string())
        }
        None => request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ci| ci.0.ip().to_string())
            .ok_or("No client IP available"),
    }
}
