//! Report assembly and the produce-and-submit pipeline
//!
//! The disk branch and the host status branch run concurrently and meet at
//! a strict join barrier; the merge only happens when both are in. The disk
//! branch failing (or the status task dying) means no report is ever
//! handed to a transport.

use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::config::ReportConfig;
use crate::disks::{self, DiskRecord, SpaceProbe, VolumeSource};
use crate::error::ReportError;
use crate::status::{self, HostStatus};
use crate::submit::{self, DeliveryOutcome, Transport};

/// The exact wire payload: host status fields first, then the disk report
/// and the build version (last-write-wins merge order).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    #[serde(flatten)]
    pub host: HostStatus,
    pub disk_count: usize,
    pub disks: Vec<DiskRecord>,
    pub version: String,
}

/// Run both collection branches concurrently and merge their outputs.
pub async fn build_report(
    config: &ReportConfig,
    source: Arc<dyn VolumeSource>,
    probe: Arc<dyn SpaceProbe>,
) -> Result<Report, ReportError> {
    let disk_branch = disks::aggregate(source, probe);
    let status_branch = tokio::task::spawn_blocking(status::collect);

    // Join barrier: nothing is merged until both branches are in.
    let (disk_result, status_result) = tokio::join!(disk_branch, status_branch);
    let disk_report = disk_result?;
    let host = status_result?;

    Ok(Report {
        host,
        disk_count: disk_report.count,
        disks: disk_report.disks,
        version: config.version.clone(),
    })
}

/// Produce one report and hand it to the transport. Report generation
/// failures propagate; submission failures are surfaced to the log only —
/// the invocation is over either way and nothing is retried.
pub async fn produce_and_submit<T: Transport>(
    config: &ReportConfig,
    source: Arc<dyn VolumeSource>,
    probe: Arc<dyn SpaceProbe>,
    transport: &T,
) -> Result<()> {
    let report = build_report(config, source, probe)
        .await
        .context("Report generation failed")?;

    let payload = serde_json::to_string(&report).context("Failed to serialize report")?;
    let request = submit::build_request(config, payload);

    match transport.deliver(&request).await {
        Ok(DeliveryOutcome::Sent { status, .. }) => {
            info!("Report delivered ({} disk(s), HTTP {status})", report.disk_count);
        }
        Ok(DeliveryOutcome::Suppressed) => {
            info!("Debug mode: report inspected, not sent");
        }
        Err(e) => error!("Report submission failed: {e}"),
    }

    Ok(())
}
