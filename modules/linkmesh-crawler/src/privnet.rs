use std::net::{IpAddr, Ipv6Addr};

use anyhow::{Context, Result};
use async_trait::async_trait;

/// Decides whether a host lives on a private network. The crawler refuses
/// to fetch private hosts and drops most anchors pointing at them.
#[async_trait]
pub trait PrivateNetworkDetector: Send + Sync {
    async fn is_private(&self, host: &str) -> Result<bool>;
}

/// Production detector: IP literals are classified directly, hostnames are
/// resolved first. A host is private if any of its addresses is.
pub struct DnsDetector;

#[async_trait]
impl PrivateNetworkDetector for DnsDetector {
    async fn is_private(&self, host: &str) -> Result<bool> {
        if let Ok(ip) = host.parse::<IpAddr>() {
            return Ok(is_private_address(ip));
        }

        let addrs = tokio::net::lookup_host((host, 80))
            .await
            .with_context(|| format!("failed to resolve host {host}"))?;
        Ok(addrs.map(|addr| addr.ip()).any(is_private_address))
    }
}

fn is_private_address(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => {
            v4.is_private() || v4.is_loopback() || v4.is_link_local() || v4.is_unspecified()
        }
        IpAddr::V6(v6) => {
            v6.is_loopback() || v6.is_unspecified() || is_unique_local(&v6) || is_link_local(&v6)
        }
    }
}

/// fc00::/7
fn is_unique_local(v6: &Ipv6Addr) -> bool {
    (v6.segments()[0] & 0xfe00) == 0xfc00
}

/// fe80::/10
fn is_link_local(v6: &Ipv6Addr) -> bool {
    (v6.segments()[0] & 0xffc0) == 0xfe80
}
