//! Host status collection
//!
//! Synchronous reads of CPU, load, memory, network, OS identity and uptime.
//! This branch never fails: anything the platform cannot answer is omitted
//! from the report instead of aborting it, in contrast to the fail-fast
//! disk branch.

use serde::Serialize;
use std::collections::BTreeMap;
use std::net::IpAddr;
use sysinfo::System;
use tracing::{debug, warn};

/// OS-level status of the local host. Optional fields are dropped from the
/// JSON payload when the platform cannot provide them, never zero-filled.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostStatus {
    /// Distinct CPU model strings, joined with ", ".
    pub cpu: String,
    pub cores: usize,
    pub load1: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load5: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub load15: Option<f64>,
    /// Interface name to "address (family)" summary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network: Option<BTreeMap<String, String>>,
    /// The same summaries as a flat list.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ips: Option<Vec<String>>,
    pub platform: String,
    pub arch: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_type: Option<String>,
    pub hostname: String,
    pub mem_free: u64,
    pub mem_total: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mem_in_use: Option<f64>,
    pub uptime: u64,
}

/// Read the full host status. Blocking; run on a blocking task.
pub fn collect() -> HostStatus {
    let mut sys = System::new_all();
    sys.refresh_all();

    let cpu = dedup_models(sys.cpus().iter().map(|c| c.brand()));
    let cores = sys.cpus().len();
    let (load1, load5, load15) = load_values(&mut sys);

    let (network, ips) = match if_addrs::get_if_addrs() {
        Ok(addrs) => {
            let summaries = interface_summaries(
                addrs.into_iter().map(|ifa| (ifa.name.clone(), ifa.ip())),
            );
            let ips: Vec<String> = summaries.values().cloned().collect();
            (Some(summaries), Some(ips))
        }
        Err(e) => {
            warn!("Could not enumerate network interfaces: {e}");
            (None, None)
        }
    };

    let mem_free = sys.free_memory();
    let mem_total = sys.total_memory();
    let mem_in_use = if mem_total > 0 {
        Some(100.0 - (mem_free as f64 / mem_total as f64 * 100.0))
    } else {
        None
    };

    let status = HostStatus {
        cpu,
        cores,
        load1,
        load5,
        load15,
        network,
        ips,
        platform: std::env::consts::OS.to_string(),
        arch: std::env::consts::ARCH.to_string(),
        release: System::kernel_version(),
        os_type: System::name(),
        hostname: gethostname::gethostname().to_string_lossy().to_string(),
        mem_free,
        mem_total,
        mem_in_use,
        uptime: System::uptime(),
    };

    debug!(
        "Host status collected: {} core(s), {} interface(s)",
        status.cores,
        status.network.as_ref().map(|n| n.len()).unwrap_or(0)
    );

    status
}

/// 1/5/15-minute load averages where the platform has them.
#[cfg(not(windows))]
fn load_values(_sys: &mut System) -> (f64, Option<f64>, Option<f64>) {
    let load = System::load_average();
    (load.one, Some(load.five), Some(load.fifteen))
}

/// Windows has no native load averages: substitute a single synthetic
/// `load1` from mean per-core usage and omit `load5`/`load15` entirely.
#[cfg(windows)]
fn load_values(sys: &mut System) -> (f64, Option<f64>, Option<f64>) {
    sys.refresh_cpu_usage();
    std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
    sys.refresh_cpu_usage();

    let cpus = sys.cpus();
    let load1 = if cpus.is_empty() {
        0.0
    } else {
        cpus.iter().map(|c| c.cpu_usage() as f64).sum::<f64>() / cpus.len() as f64
    };
    (load1, None, None)
}

/// Distinct model strings in first-seen order, joined with ", ".
fn dedup_models<'a>(brands: impl Iterator<Item = &'a str>) -> String {
    let mut seen: Vec<&str> = Vec::new();
    for brand in brands {
        if !seen.contains(&brand) {
            seen.push(brand);
        }
    }
    seen.join(", ")
}

/// "10.0.0.1 (IPv4)" style label for one bound address.
fn address_label(ip: &IpAddr) -> String {
    let family = match ip {
        IpAddr::V4(_) => "IPv4",
        IpAddr::V6(_) => "IPv6",
    };
    format!("{ip} ({family})")
}

/// Per-interface summary strings from (interface, address) pairs. Address
/// order within an interface follows the input order.
fn interface_summaries(
    entries: impl IntoIterator<Item = (String, IpAddr)>,
) -> BTreeMap<String, String> {
    let mut grouped: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (name, ip) in entries {
        grouped.entry(name).or_default().push(address_label(&ip));
    }
    grouped
        .into_iter()
        .map(|(name, labels)| (name, labels.join(", ")))
        .collect()
}
