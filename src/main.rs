use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use netmap_rs::probe::IcmpProber;
use netmap_rs::render;
use netmap_rs::resolve::FallbackResolver;
use netmap_rs::{scanner, subnet};

use anyhow::{bail, Context, Result};
use clap::Parser;

/// netmap-rs — Concurrent IPv4 subnet liveness scanner emitting a sorted PlantUML host map.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "netmap-rs",
    version,
    about = "Concurrent IPv4 subnet liveness scanner emitting a sorted PlantUML host map.",
    long_about = None
)]
struct Cli {
    /// Subnet to scan in CIDR form (e.g., 192.168.0.0/24). If omitted, auto-detect a local /24.
    #[arg(long)]
    range: Option<String>,

    /// Number of concurrent scan workers.
    #[arg(long, default_value_t = 10)]
    conc: usize,

    /// ICMP response timeout in seconds, applied per probe.
    #[arg(long = "time", default_value_t = 2)]
    time_secs: u64,

    /// PlantUML output file with the list of hosts.
    #[arg(long = "out-file", default_value = "netmap.puml")]
    out_file: PathBuf,

    /// SNMP community string used for name lookups.
    #[arg(long, default_value = "public")]
    community: String,

    /// Write the full scan report as pretty JSON to this path (optional).
    #[arg(long)]
    json: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.conc == 0 {
        bail!("--conc must be at least 1");
    }

    let net = match cli.range.as_deref() {
        Some(spec) => subnet::parse_subnet(spec)
            .with_context(|| format!("invalid subnet specification: {spec}"))?,
        None => {
            let cidrs = subnet::detect_local_cidrs()
                .context("failed to detect local networks; pass --range explicitly")?;
            match cidrs.first() {
                Some(first) => {
                    println!("No --range given; scanning detected local network {first}");
                    *first
                }
                None => bail!("no local IPv4 network detected; pass --range explicitly"),
            }
        }
    };

    println!("netmap-rs configuration:");
    println!("  range        : {net}");
    println!("  concurrency  : {}", cli.conc);
    println!("  timeout_s    : {}", cli.time_secs);
    println!("  out_file     : {}", cli.out_file.display());

    let timeout = Duration::from_secs(cli.time_secs);
    let prober = Arc::new(IcmpProber::new(timeout));
    let resolver = Arc::new(FallbackResolver::new(cli.community.clone(), timeout));

    let report = scanner::scan_subnet(net, cli.conc, prober, resolver).await?;

    println!(
        "\nActive hosts: {} (probed: {} of {})",
        report.alive_count, report.probed_done, report.candidates_total
    );
    print!("{}", render::render_hosts(&report.hosts));

    // The console listing above stands even if the file sink fails.
    if let Err(e) = render::write_hosts_file(&cli.out_file, &report.hosts) {
        eprintln!("Failed to write {}: {e:#}", cli.out_file.display());
    } else {
        println!("Wrote host map to {}", cli.out_file.display());
    }

    if let Some(path) = cli.json.as_deref() {
        if let Err(e) = render::write_report_json(path, &report) {
            eprintln!("Failed to write JSON to {}: {e:#}", path.display());
        } else {
            println!("Wrote JSON report to {}", path.display());
        }
    }

    Ok(())
}
