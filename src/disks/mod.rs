//! Storage volume enumeration and space resolution
//!
//! This is the fail-fast branch of the report: volumes are enumerated once,
//! every volume's free/total space is resolved concurrently, and a single
//! failed lookup aborts the whole disk report. A report with silently
//! missing disks is worse than no report.

use anyhow::Result;
use futures::future;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use sysinfo::Disks;
use tracing::debug;

use crate::error::ReportError;

const BYTES_PER_MEGABYTE: u64 = 1024 * 1024;

/// A storage device as seen by the OS, with zero or more mount points.
#[derive(Debug, Clone)]
pub struct Volume {
    pub device: String,
    pub mountpoints: Vec<PathBuf>,
}

/// Raw space counters returned by a probe, in bytes.
#[derive(Debug, Clone, Copy)]
pub struct SpaceCounts {
    pub free_bytes: u64,
    pub total_bytes: u64,
}

/// Derived space figures for one volume, in whole megabytes.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceInfo {
    pub free_mega_bytes: u64,
    pub total_mega_bytes: u64,
    /// `100 - (free/total*100)`, percent of the volume in use.
    pub in_use: f64,
}

impl SpaceInfo {
    /// Derive megabyte figures and the usage percentage. A zero total
    /// (including filesystems under one megabyte) is rejected rather than
    /// divided by.
    pub fn try_from_counts(counts: SpaceCounts) -> Result<Self> {
        let free_mega_bytes = counts.free_bytes / BYTES_PER_MEGABYTE;
        let total_mega_bytes = counts.total_bytes / BYTES_PER_MEGABYTE;
        if total_mega_bytes == 0 {
            anyhow::bail!("volume reports zero total space");
        }
        let in_use = 100.0 - (free_mega_bytes as f64 / total_mega_bytes as f64 * 100.0);
        Ok(SpaceInfo {
            free_mega_bytes,
            total_mega_bytes,
            in_use,
        })
    }
}

/// Wire record for one resolved volume. Mount points are flattened to a
/// comma-joined string in the payload.
#[derive(Debug, Clone, Serialize)]
pub struct DiskRecord {
    pub device: String,
    pub mountpoints: String,
    #[serde(flatten)]
    pub space: SpaceInfo,
}

/// All volumes, resolved. `count` always equals `disks.len()`; order is
/// enumeration order.
#[derive(Debug, Clone)]
pub struct DiskReport {
    pub count: usize,
    pub disks: Vec<DiskRecord>,
}

/// Lists the storage volumes currently attached to the host.
pub trait VolumeSource: Send + Sync {
    fn volumes(&self) -> Result<Vec<Volume>>;
}

/// Resolves free/total space for one filesystem path.
pub trait SpaceProbe: Send + Sync {
    fn space_for(&self, path: &Path) -> Result<SpaceCounts>;
}

/// Production `VolumeSource` backed by sysinfo's mounted-filesystem list.
/// Entries sharing a device are grouped into one volume, preserving
/// discovery order.
pub struct SysinfoVolumes;

impl VolumeSource for SysinfoVolumes {
    fn volumes(&self) -> Result<Vec<Volume>> {
        let disks = Disks::new_with_refreshed_list();
        let entries = disks
            .iter()
            .map(|d| {
                (
                    d.name().to_string_lossy().to_string(),
                    d.mount_point().to_path_buf(),
                )
            })
            .collect::<Vec<_>>();
        Ok(group_volumes(entries))
    }
}

/// Group (device, mount point) pairs into volumes, first-seen device order.
fn group_volumes(entries: Vec<(String, PathBuf)>) -> Vec<Volume> {
    let mut volumes: Vec<Volume> = Vec::new();
    for (device, mountpoint) in entries {
        match volumes.iter_mut().find(|v| v.device == device) {
            Some(volume) => volume.mountpoints.push(mountpoint),
            None => volumes.push(Volume {
                device,
                mountpoints: vec![mountpoint],
            }),
        }
    }
    volumes
}

/// Production `SpaceProbe`: statvfs on Unix, a refreshed sysinfo disk list
/// elsewhere.
pub struct PlatformSpaceProbe;

impl SpaceProbe for PlatformSpaceProbe {
    #[cfg(unix)]
    fn space_for(&self, path: &Path) -> Result<SpaceCounts> {
        let stat = nix::sys::statvfs::statvfs(path)?;
        Ok(SpaceCounts {
            free_bytes: stat.blocks_available() as u64 * stat.fragment_size() as u64,
            total_bytes: stat.blocks() as u64 * stat.fragment_size() as u64,
        })
    }

    #[cfg(not(unix))]
    fn space_for(&self, path: &Path) -> Result<SpaceCounts> {
        let disks = Disks::new_with_refreshed_list();
        let disk = disks
            .iter()
            .find(|d| d.mount_point() == path)
            .ok_or_else(|| anyhow::anyhow!("no volume mounted at {}", path.display()))?;
        Ok(SpaceCounts {
            free_bytes: disk.available_space(),
            total_bytes: disk.total_space(),
        })
    }
}

/// Resolve space for one volume: probe its first mount point, or the raw
/// device identifier when no mount point exists. Any failure names the
/// offending device and aborts the disk branch.
pub fn resolve_volume(volume: &Volume, probe: &dyn SpaceProbe) -> Result<DiskRecord, ReportError> {
    let target = volume
        .mountpoints
        .first()
        .cloned()
        .unwrap_or_else(|| PathBuf::from(&volume.device));

    let space_error = |reason: String| ReportError::SpaceResolution {
        device: volume.device.clone(),
        reason,
    };

    let counts = probe
        .space_for(&target)
        .map_err(|e| space_error(e.to_string()))?;
    let space = SpaceInfo::try_from_counts(counts).map_err(|e| space_error(e.to_string()))?;

    debug!(
        "Resolved {}: {}/{} MB ({:.1}% in use)",
        volume.device, space.free_mega_bytes, space.total_mega_bytes, space.in_use
    );

    Ok(DiskRecord {
        device: volume.device.clone(),
        mountpoints: volume
            .mountpoints
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join(","),
        space,
    })
}

/// Fan the space resolver out over every enumerated volume.
///
/// Each lookup runs as its own blocking task; the join preserves
/// enumeration order regardless of completion order and short-circuits on
/// the first error. In-flight sibling lookups are left to drain and their
/// results are discarded.
pub async fn aggregate(
    source: Arc<dyn VolumeSource>,
    probe: Arc<dyn SpaceProbe>,
) -> Result<DiskReport, ReportError> {
    let volumes = tokio::task::spawn_blocking(move || source.volumes())
        .await?
        .map_err(|e| ReportError::Enumeration(e.to_string()))?;

    debug!("Enumerated {} volume(s)", volumes.len());

    let lookups = volumes.into_iter().map(|volume| {
        let probe = Arc::clone(&probe);
        async move {
            tokio::task::spawn_blocking(move || resolve_volume(&volume, probe.as_ref()))
                .await
                .map_err(ReportError::Join)?
        }
    });

    let disks = future::try_join_all(lookups).await?;

    Ok(DiskReport {
        count: disks.len(),
        disks,
    })
}
