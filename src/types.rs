use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;

/// One live host: its address and the best display name found for it.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    pub addr: Ipv4Addr,
    pub name: String,
}

/// Aggregate scan outcome: the sorted live hosts plus progress counters.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct ScanReport {
    pub candidates_total: u64,
    pub probed_done: u64,
    pub alive_count: u64,
    /// Sorted ascending by the 32-bit numeric value of the address.
    pub hosts: Vec<HostEntry>,
    pub timestamp: String,
}
