use async_trait::async_trait;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tokio::time;

/// Answers whether a single host is reachable. One probe, no retries.
#[async_trait]
pub trait Prober: Send + Sync {
    async fn probe(&self, addr: Ipv4Addr) -> bool;
}

/// ICMP echo prober with a fixed per-probe timeout.
pub struct IcmpProber {
    timeout: Duration,
}

impl IcmpProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl Prober for IcmpProber {
    async fn probe(&self, addr: Ipv4Addr) -> bool {
        let payload = [0u8; 56];
        // Any send/receive error counts the same as a timeout: not alive.
        match time::timeout(self.timeout, surge_ping::ping(IpAddr::V4(addr), &payload)).await {
            Ok(Ok((_packet, _rtt))) => true,
            _ => false,
        }
    }
}
