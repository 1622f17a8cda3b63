use crate::types::{HostEntry, ScanReport};
use anyhow::{Context, Result};
use std::fmt::Write as _;
use std::fs::File;
use std::path::Path;

/// One PlantUML host declaration: `<identifier>[address = "<address>"];`
pub fn render_line(entry: &HostEntry) -> String {
    format!("{}[address = \"{}\"];", entry.name, entry.addr)
}

/// Render all entries, one line each, in the order given.
///
/// Both the console and the file sink go through this single function, so
/// the two renderings are byte-identical by construction.
pub fn render_hosts(hosts: &[HostEntry]) -> String {
    let mut out = String::new();
    for entry in hosts {
        let _ = writeln!(out, "{}", render_line(entry));
    }
    out
}

/// Write the host declarations to the persisted sink.
pub fn write_hosts_file(path: &Path, hosts: &[HostEntry]) -> Result<()> {
    std::fs::write(path, render_hosts(hosts))
        .with_context(|| format!("failed to write host map: {}", path.display()))
}

/// Write the full report as pretty JSON.
pub fn write_report_json(path: &Path, report: &ScanReport) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create JSON report: {}", path.display()))?;
    serde_json::to_writer_pretty(file, report)?;
    Ok(())
}
