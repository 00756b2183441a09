//! sysreport - one-shot host telemetry reporter
//!
//! Gathers per-disk storage utilization and OS-level host status
//! concurrently, merges both into a single JSON report and POSTs it once
//! over HTTPS. Meant to be driven by an external scheduler; each
//! invocation produces exactly one report.

mod config;
mod disks;
mod error;
mod report;
mod status;
mod submit;

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};

use config::ReportConfig;
use disks::{PlatformSpaceProbe, SpaceProbe, SysinfoVolumes, VolumeSource};
use submit::{HttpsTransport, InspectTransport};

#[derive(Debug, Default)]
struct CliArgs {
    debug: bool,
    config: Option<PathBuf>,
}

impl CliArgs {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self> {
        let mut parsed = CliArgs::default();
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--debug" => parsed.debug = true,
                "--config" => {
                    let path = args
                        .next()
                        .ok_or_else(|| anyhow::anyhow!("--config requires a path"))?;
                    parsed.config = Some(PathBuf::from(path));
                }
                other => anyhow::bail!("Unknown argument: {other}"),
            }
        }
        Ok(parsed)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();

    let args = CliArgs::parse(std::env::args().skip(1))?;
    let mut config = ReportConfig::load(args.config.as_deref())
        .await
        .context("Failed to load configuration")?;
    if args.debug {
        config.debug = true;
    }

    info!(
        "sysreport v{} reporting to https://{}:{}{}",
        config.version, config.hostname, config.port, config.path
    );

    let source: Arc<dyn VolumeSource> = Arc::new(SysinfoVolumes);
    let probe: Arc<dyn SpaceProbe> = Arc::new(PlatformSpaceProbe);

    let outcome = if config.debug {
        let transport = InspectTransport::default();
        report::produce_and_submit(&config, source, probe, &transport).await
    } else {
        let timeout = config.timeout_secs.map(Duration::from_secs);
        let transport =
            HttpsTransport::new(timeout).context("Failed to build HTTPS client")?;
        report::produce_and_submit(&config, source, probe, &transport).await
    };

    // Background batch process: failures end up in the operational log,
    // not in the exit code.
    if let Err(e) = outcome {
        error!("ERROR {e:#}");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args<'a>(list: &'a [&'a str]) -> impl Iterator<Item = String> + 'a {
        list.iter().map(|s| s.to_string())
    }

    #[test]
    fn test_parse_debug_and_config() {
        let parsed = CliArgs::parse(args(&["--debug", "--config", "/etc/sysreport.toml"]))
            .unwrap();
        assert!(parsed.debug);
        assert_eq!(parsed.config.unwrap(), PathBuf::from("/etc/sysreport.toml"));
    }

    #[test]
    fn test_parse_rejects_unknown_flags() {
        assert!(CliArgs::parse(args(&["--frobnicate"])).is_err());
        assert!(CliArgs::parse(args(&["--config"])).is_err());
    }
}
