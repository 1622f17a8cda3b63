use anyhow::{Context, Result};
use if_addrs::{get_if_addrs, IfAddr};
use ipnet::Ipv4Net;
use std::collections::HashSet;
use std::net::Ipv4Addr;

/// Parse a subnet given in CIDR form, e.g. `192.168.0.0/24`.
///
/// Host bits in the base address are masked off, so `10.0.0.5/30` denotes the
/// same block as `10.0.0.4/30`.
pub fn parse_subnet(spec: &str) -> Result<Ipv4Net> {
    let net: Ipv4Net = spec
        .trim()
        .parse()
        .with_context(|| format!("not a valid IPv4 CIDR: {spec}"))?;
    Ok(net.trunc())
}

/// Detect local non-loopback IPv4 addresses and convert each to a default /24 CIDR network.
///
/// For example, an interface IP `192.168.1.42` becomes `192.168.1.0/24`.
/// Duplicates are removed.
pub fn detect_local_cidrs() -> Result<Vec<Ipv4Net>> {
    let mut set = HashSet::<Ipv4Net>::new();
    for iface in get_if_addrs()? {
        if let IfAddr::V4(v4) = iface.addr {
            let ip = v4.ip;
            if ip.is_loopback() {
                continue;
            }
            set.insert(ipv4_to_default_cidr(ip));
        }
    }
    let mut cidrs: Vec<Ipv4Net> = set.into_iter().collect();
    // Sort for stable output
    cidrs.sort_by_key(|n| (u32::from(n.network()), n.prefix_len()));
    Ok(cidrs)
}

/// Helper: convert an IPv4 address into its default /24 network.
pub fn ipv4_to_default_cidr(ip: Ipv4Addr) -> Ipv4Net {
    let o = ip.octets();
    let net = Ipv4Addr::new(o[0], o[1], o[2], 0);
    Ipv4Net::new(net, 24).expect("/24 is always valid")
}

/// Lazily yield every scannable host address in the block, ascending.
///
/// The network and broadcast addresses are excluded, so /31 and /32 blocks
/// yield nothing. Each call produces a fresh, forward-only iterator.
pub fn host_addresses(net: Ipv4Net) -> impl Iterator<Item = Ipv4Addr> {
    let start = u32::from(net.network());
    let end = u32::from(net.broadcast());
    let (lo, hi) = if end.saturating_sub(start) <= 1 {
        // Too small to have host addresses
        (1u32, 0u32)
    } else {
        (start + 1, end - 1)
    };
    (lo..=hi).map(Ipv4Addr::from)
}

/// Number of scannable host addresses in the block.
pub fn host_count(net: Ipv4Net) -> u64 {
    let start = u32::from(net.network()) as u64;
    let end = u32::from(net.broadcast()) as u64;
    (end - start + 1).saturating_sub(2)
}
