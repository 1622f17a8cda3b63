use async_trait::async_trait;
use netmap_rs::probe::Prober;
use netmap_rs::render::render_hosts;
use netmap_rs::resolve::NameResolver;
use netmap_rs::scanner::scan_subnet;
use netmap_rs::subnet::parse_subnet;
use netmap_rs::types::HostEntry;
use std::collections::{HashMap, HashSet};
use std::net::Ipv4Addr;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Deterministic prober: alive exactly for the configured addresses.
struct FixedProber {
    alive: HashSet<Ipv4Addr>,
}

#[async_trait]
impl Prober for FixedProber {
    async fn probe(&self, addr: Ipv4Addr) -> bool {
        self.alive.contains(&addr)
    }
}

/// Records how often each address is probed; odd last bits answer alive.
struct CountingProber {
    counts: Mutex<HashMap<Ipv4Addr, u32>>,
}

#[async_trait]
impl Prober for CountingProber {
    async fn probe(&self, addr: Ipv4Addr) -> bool {
        let mut counts = self.counts.lock().await;
        *counts.entry(addr).or_insert(0) += 1;
        u32::from(addr) % 2 == 1
    }
}

/// Resolver that never finds a name.
struct NoNames;

#[async_trait]
impl NameResolver for NoNames {
    async fn resolve(&self, _addr: Ipv4Addr) -> Option<String> {
        None
    }
}

/// Resolver backed by a fixed lookup table.
struct TableResolver {
    names: HashMap<Ipv4Addr, String>,
}

#[async_trait]
impl NameResolver for TableResolver {
    async fn resolve(&self, addr: Ipv4Addr) -> Option<String> {
        self.names.get(&addr).cloned()
    }
}

fn addr(a: u8, b: u8, c: u8, d: u8) -> Ipv4Addr {
    Ipv4Addr::new(a, b, c, d)
}

#[tokio::test]
async fn slash30_scenario_single_unnamed_host() {
    let net = parse_subnet("10.0.0.0/30").unwrap();
    let prober = Arc::new(FixedProber {
        alive: HashSet::from([addr(10, 0, 0, 2)]),
    });

    let report = scan_subnet(net, 4, prober, Arc::new(NoNames)).await.unwrap();

    assert_eq!(report.candidates_total, 2);
    assert_eq!(report.probed_done, 2);
    assert_eq!(report.alive_count, 1);
    assert_eq!(
        report.hosts,
        vec![HostEntry {
            addr: addr(10, 0, 0, 2),
            name: "10.0.0.2".to_string(),
        }]
    );
    assert_eq!(
        render_hosts(&report.hosts),
        "10.0.0.2[address = \"10.0.0.2\"];\n"
    );
}

#[tokio::test]
async fn concurrency_never_changes_content() {
    let net = parse_subnet("192.168.5.64/26").unwrap();
    let alive: HashSet<Ipv4Addr> = (65u8..=126)
        .filter(|d| d % 3 == 0)
        .map(|d| addr(192, 168, 5, d))
        .collect();

    let mut runs = Vec::new();
    for conc in [1usize, 2, 8, 64] {
        let prober = Arc::new(FixedProber {
            alive: alive.clone(),
        });
        let report = scan_subnet(net, conc, prober, Arc::new(NoNames))
            .await
            .unwrap();
        assert_eq!(report.probed_done, 62);
        runs.push(report.hosts);
    }
    for hosts in &runs[1..] {
        assert_eq!(hosts, &runs[0]);
    }
}

#[tokio::test]
async fn slash24_with_five_workers_probes_each_address_exactly_once() {
    let net = parse_subnet("10.0.0.0/24").unwrap();
    let prober = Arc::new(CountingProber {
        counts: Mutex::new(HashMap::new()),
    });

    let report = scan_subnet(net, 5, prober.clone(), Arc::new(NoNames))
        .await
        .unwrap();

    assert_eq!(report.candidates_total, 254);
    assert_eq!(report.probed_done, 254);

    let counts = prober.counts.lock().await;
    assert_eq!(counts.len(), 254);
    assert!(counts.values().all(|&n| n == 1));
}

#[tokio::test]
async fn ordered_result_is_strictly_ascending_by_numeric_value() {
    let net = parse_subnet("10.0.1.0/26").unwrap();
    let alive: HashSet<Ipv4Addr> = (1u8..=62).map(|d| addr(10, 0, 1, d)).collect();
    let prober = Arc::new(FixedProber { alive });

    let report = scan_subnet(net, 7, prober, Arc::new(NoNames)).await.unwrap();

    assert_eq!(report.hosts.len(), 62);
    assert!(report
        .hosts
        .windows(2)
        .all(|w| u32::from(w[0].addr) < u32::from(w[1].addr)));
}

#[tokio::test]
async fn resolved_names_are_used_and_empty_names_fall_back_to_address_text() {
    let net = parse_subnet("10.0.0.0/29").unwrap();
    let prober = Arc::new(FixedProber {
        alive: HashSet::from([addr(10, 0, 0, 1), addr(10, 0, 0, 2)]),
    });
    let resolver = Arc::new(TableResolver {
        names: HashMap::from([
            (addr(10, 0, 0, 1), String::new()),
            (addr(10, 0, 0, 2), "printer".to_string()),
        ]),
    });

    let report = scan_subnet(net, 3, prober, resolver).await.unwrap();

    assert_eq!(
        report.hosts,
        vec![
            HostEntry {
                addr: addr(10, 0, 0, 1),
                name: "10.0.0.1".to_string(),
            },
            HostEntry {
                addr: addr(10, 0, 0, 2),
                name: "printer".to_string(),
            },
        ]
    );
}

#[tokio::test]
async fn every_aggregated_host_renders_exactly_once() {
    let net = parse_subnet("172.16.0.0/28").unwrap();
    let alive: HashSet<Ipv4Addr> = [3u8, 7, 11]
        .into_iter()
        .map(|d| addr(172, 16, 0, d))
        .collect();
    let prober = Arc::new(FixedProber {
        alive: alive.clone(),
    });

    let report = scan_subnet(net, 4, prober, Arc::new(NoNames)).await.unwrap();
    let text = render_hosts(&report.hosts);

    assert_eq!(text.lines().count(), alive.len());
    for ip in &alive {
        let line = format!("{ip}[address = \"{ip}\"];");
        assert_eq!(text.lines().filter(|l| *l == line).count(), 1);
    }
}
