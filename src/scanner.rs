use crate::probe::Prober;
use crate::resolve::NameResolver;
use crate::subnet::{host_addresses, host_count};
use crate::types::{HostEntry, ScanReport};
use ::time::{format_description::well_known, OffsetDateTime};
use anyhow::Result;
use ipnet::Ipv4Net;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;

/// How many addresses the generator may run ahead of the workers.
const QUEUE_DEPTH: usize = 256;

/// Scan every host address in `net` with `concurrency` parallel workers.
///
/// One generator task feeds a shared queue; each worker pulls an address,
/// probes it, and for live hosts resolves a display name exactly once before
/// inserting into the shared result map. The call returns only after every
/// worker has drained the queue and exited, so the returned report is frozen.
///
/// Per-host probe and resolution failures are absorbed here: a dead or
/// erroring host is simply absent from the report, and a live host with no
/// resolvable name is recorded under its own address text.
pub async fn scan_subnet(
    net: Ipv4Net,
    concurrency: usize,
    prober: Arc<dyn Prober>,
    resolver: Arc<dyn NameResolver>,
) -> Result<ScanReport> {
    let concurrency = concurrency.clamp(1, 5_000);
    let candidates_total = host_count(net);

    let alive = Arc::new(Mutex::new(HashMap::<Ipv4Addr, String>::new()));
    let probed_done = Arc::new(AtomicU64::new(0));

    // Single producer; dropping the sender on exhaustion is the close signal
    // every worker observes as `None`.
    let (tx, rx) = mpsc::channel::<Ipv4Addr>(QUEUE_DEPTH);
    let generator = tokio::spawn(async move {
        for addr in host_addresses(net) {
            if tx.send(addr).await.is_err() {
                break; // no workers left to feed
            }
        }
    });

    let rx = Arc::new(Mutex::new(rx));
    let mut workers = JoinSet::new();
    for _ in 0..concurrency {
        let rx = rx.clone();
        let alive = alive.clone();
        let probed_done = probed_done.clone();
        let prober = prober.clone();
        let resolver = resolver.clone();

        workers.spawn(async move {
            loop {
                // Hold the receiver lock only for the handoff, never across
                // a probe, so other workers keep pulling at their own pace.
                let next = { rx.lock().await.recv().await };
                let Some(addr) = next else { break };

                if prober.probe(addr).await {
                    let name = resolver
                        .resolve(addr)
                        .await
                        .filter(|n| !n.is_empty())
                        .unwrap_or_else(|| addr.to_string());
                    let mut guard = alive.lock().await;
                    guard.insert(addr, name);
                }
                probed_done.fetch_add(1, Ordering::Relaxed);
            }
        });
    }

    // Join barrier: results may only be read once every worker has returned.
    while let Some(res) = workers.join_next().await {
        res?;
    }
    generator.await?;

    let alive_map = match Arc::try_unwrap(alive) {
        Ok(m) => m.into_inner(),
        // Unreachable after the join above, but cloning keeps this total.
        Err(arc) => arc.lock().await.clone(),
    };

    let hosts = sort_hosts(&alive_map);
    Ok(ScanReport {
        candidates_total,
        probed_done: probed_done.load(Ordering::Relaxed),
        alive_count: hosts.len() as u64,
        hosts,
        timestamp: now_rfc3339(),
    })
}

/// Order the frozen result by the 32-bit numeric value of the address.
///
/// This is numeric, not lexicographic: 10.0.0.2 sorts before 10.0.0.10.
pub fn sort_hosts(map: &HashMap<Ipv4Addr, String>) -> Vec<HostEntry> {
    let mut hosts: Vec<HostEntry> = map
        .iter()
        .map(|(addr, name)| HostEntry {
            addr: *addr,
            name: name.clone(),
        })
        .collect();
    hosts.sort_by_key(|h| u32::from(h.addr));
    hosts
}

fn now_rfc3339() -> String {
    let now = OffsetDateTime::now_utc();
    now.format(&well_known::Rfc3339)
        .unwrap_or_else(|_| String::from("1970-01-01T00:00:00Z"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_is_numeric_not_lexicographic() {
        let mut map = HashMap::new();
        map.insert(Ipv4Addr::new(10, 0, 0, 10), "b".to_string());
        map.insert(Ipv4Addr::new(10, 0, 0, 2), "a".to_string());
        map.insert(Ipv4Addr::new(10, 0, 1, 1), "c".to_string());
        let hosts = sort_hosts(&map);
        let addrs: Vec<Ipv4Addr> = hosts.iter().map(|h| h.addr).collect();
        assert_eq!(
            addrs,
            vec![
                Ipv4Addr::new(10, 0, 0, 2),
                Ipv4Addr::new(10, 0, 0, 10),
                Ipv4Addr::new(10, 0, 1, 1),
            ]
        );
    }

    #[test]
    fn sort_of_empty_map_is_empty() {
        assert!(sort_hosts(&HashMap::new()).is_empty());
    }
}
