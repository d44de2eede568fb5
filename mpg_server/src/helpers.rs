use std::{net::IpAddr, str::FromStr};

use actix_web::HttpRequest;
use log::{debug, trace, warn};
use regex::Regex;

/// Get the remote IP address from the request. It uses 3 sources to determine the IP address, in decreasing order
/// of preference:
/// 1. The `X-Forwarded-For` header, iif `use_x_forwarded_for` is set to true in the configuration.
/// 2. The `Forwarded` header, iif `use_forwarded` is set to true in the configuration.
/// 3. The peer address from the connection info.
pub fn get_remote_ip(req: &HttpRequest, use_x_forwarded_for: bool, use_forwarded: bool) -> Option<IpAddr> {
    let x_forwarded_for = req.headers().get("X-Forwarded-For").and_then(|v| v.to_str().ok());
    let forwarded = req.headers().get("Forwarded").and_then(|v| v.to_str().ok());
    let peer_addr = req.connection_info().peer_addr().map(|a| a.to_string());
    resolve_remote_ip(
        use_x_forwarded_for.then_some(x_forwarded_for).flatten(),
        use_forwarded.then_some(forwarded).flatten(),
        peer_addr.as_deref(),
    )
}

fn resolve_remote_ip(x_forwarded_for: Option<&str>, forwarded: Option<&str>, peer_addr: Option<&str>) -> Option<IpAddr> {
    let mut result = None;
    if let Some(header) = x_forwarded_for {
        trace!("Checking X-Forwarded-For header");
        // The left-most entry is the originating client
        result = header.split(',').next().and_then(parse_ip);
        if let Some(ip) = result {
            debug!("Using X-Forwarded-For header for remote address: {ip}");
        }
    }
    if let (Some(header), None) = (forwarded, result) {
        trace!("Checking Forwarded header");
        result = Regex::new(r#"(?i)for="?\[?(?P<ip>[^;,"\]]+)"#)
            .ok()
            .and_then(|re| re.captures(header).and_then(|caps| caps.name("ip").map(|m| m.as_str().to_string())))
            .and_then(|s| parse_ip(&s));
        if let Some(ip) = result {
            debug!("Using Forwarded header for remote address: {ip}");
        }
    }
    result.or_else(|| {
        trace!("Using Peer address for remote address: {peer_addr:?}");
        peer_addr.and_then(parse_ip)
    })
}

/// Accepts bare addresses as well as `ip:port` socket addresses.
fn parse_ip(s: &str) -> Option<IpAddr> {
    let s = s.trim();
    IpAddr::from_str(s).ok().or_else(|| std::net::SocketAddr::from_str(s).ok().map(|a| a.ip()))
}

/// With no whitelist configured, every peer is allowed. With one, the peer address must be known and listed.
pub fn is_whitelisted(peer_ip: Option<IpAddr>, whitelist: Option<&[IpAddr]>) -> bool {
    match (peer_ip, whitelist) {
        (_, None) => true,
        (Some(ip), Some(whitelist)) => {
            let allowed = whitelist.contains(&ip);
            if !allowed {
                warn!("🔐️ Callback from {ip}, which is not on the whitelist. Denying access.");
            }
            allowed
        },
        (None, Some(_)) => {
            warn!("🔐️ No IP address found for the remote peer of a callback. Denying access.");
            false
        },
    }
}
