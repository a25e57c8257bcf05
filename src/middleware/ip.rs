//! Client key extraction for admission control.
//!
//! # Header Priority
//!
//! 1. `X-Real-IP`
//! 2. First entry of `X-Forwarded-For`
//! 3. The connection's peer address (from `ConnectInfo`)
//!
//! When none of these identifies the client there is no key, and the
//! admission layer rejects the request outright.
//!
//! # IP Spoofing
//!
//! Forwarding headers are client-controlled. When [`TrustedProxies`] is
//! configured, they are only honored if the peer address belongs to one of
//! the trusted networks; requests arriving from anywhere else are keyed by
//! their peer address. Without trusted proxies every header is believed, so
//! the service must then sit behind a proxy that overwrites them:
//!
//! ```nginx
//! proxy_set_header X-Real-IP $remote_addr;
//! proxy_set_header X-Forwarded-For $remote_addr;
//! ```

use std::net::{IpAddr, SocketAddr};

use axum::extract::ConnectInfo;
use axum::http::Request;
use ipnet::IpNet;
use tracing::{debug, warn};

/// Networks whose forwarding headers are trusted.
#[derive(Debug, Clone, Default)]
pub struct TrustedProxies {
    networks: Vec<IpNet>,
}

impl TrustedProxies {
    /// Parse CIDR strings. A bare address is treated as a single-host network.
    ///
    /// Invalid entries are logged as warnings and skipped.
    pub fn new(cidrs: &[String]) -> Self {
        let networks: Vec<IpNet> = cidrs
            .iter()
            .filter_map(|cidr| {
                let cidr = cidr.trim();
                let parsed = cidr
                    .parse::<IpNet>()
                    .ok()
                    .or_else(|| cidr.parse::<IpAddr>().ok().and_then(single_host));
                if parsed.is_none() {
                    warn!(cidr = %cidr, "Invalid CIDR range in TRUSTED_PROXIES, skipping");
                }
                parsed
            })
            .collect();

        if !networks.is_empty() {
            debug!(count = networks.len(), "Trusted proxy validation enabled");
        }

        Self { networks }
    }

    /// Whether any trusted network is configured.
    pub fn is_enabled(&self) -> bool {
        !self.networks.is_empty()
    }

    /// Whether `addr` lies inside a trusted network.
    pub fn trusts(&self, addr: IpAddr) -> bool {
        self.networks.iter().any(|net| net.contains(&addr))
    }

    /// Whether forwarding headers may be believed for a connection from `peer`.
    ///
    /// Always true when validation is disabled. With validation enabled, a
    /// request without a known peer (e.g. an in-process call) is not trusted.
    fn honors_headers_from(&self, peer: Option<IpAddr>) -> bool {
        if !self.is_enabled() {
            return true;
        }
        peer.is_some_and(|addr| self.trusts(addr))
    }
}

fn single_host(addr: IpAddr) -> Option<IpNet> {
    let prefix = match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    };
    IpNet::new(addr, prefix).ok()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ForwardedFor<'a> {
    RealIp(&'a str),
    Xff(&'a str),
    NotFound,
}

#[inline]
fn forwarded_for<B>(req: &Request<B>) -> ForwardedFor<'_> {
    if let Some(real_ip) = req.headers().get("x-real-ip")
        && let Ok(value) = real_ip.to_str()
        && !value.trim().is_empty()
    {
        return ForwardedFor::RealIp(value.trim());
    }

    // "client, proxy1, proxy2": the first entry is the originating client
    if let Some(forwarded) = req.headers().get("x-forwarded-for")
        && let Ok(value) = forwarded.to_str()
        && let Some(first) = value.split(',').next()
        && !first.trim().is_empty()
    {
        return ForwardedFor::Xff(first.trim());
    }

    ForwardedFor::NotFound
}

fn peer_addr<B>(req: &Request<B>) -> Option<SocketAddr> {
    req.extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Determine the admission key for `req`, or `None` when nothing identifies
/// the client.
pub fn client_key<B>(req: &Request<B>, trusted: &TrustedProxies) -> Option<String> {
    let peer = peer_addr(req).map(|addr| addr.ip());

    if trusted.honors_headers_from(peer) {
        match forwarded_for(req) {
            ForwardedFor::RealIp(ip) | ForwardedFor::Xff(ip) => return Some(ip.to_string()),
            ForwardedFor::NotFound => {}
        }
    } else if !matches!(forwarded_for(req), ForwardedFor::NotFound) {
        debug!(
            peer = ?peer,
            "Ignoring forwarding headers from untrusted peer"
        );
    }

    peer.map(|ip| ip.to_string())
}
