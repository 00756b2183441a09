//! Reporter configuration
//!
//! Handles:
//! - Destination endpoint (host, port, URL path)
//! - Extra HTTP headers merged over the computed defaults
//! - Debug mode (inspect instead of send)
//! - TOML file storage in the OS config directory

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Destination host for the HTTPS POST.
    pub hostname: String,
    pub port: u16,
    /// URL path on the destination host.
    pub path: String,
    /// Extra headers, merged over the computed `Content-Type` and
    /// `Content-Length` defaults. An entry with the same name wins.
    pub headers: BTreeMap<String, String>,
    /// When true, the report is logged instead of sent.
    pub debug: bool,
    /// Client-level timeout for the submission request.
    pub timeout_secs: Option<u64>,
    /// Build identifier stamped into every report.
    pub version: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            hostname: "127.0.0.1".to_string(),
            port: 443,
            path: "/".to_string(),
            headers: BTreeMap::new(),
            debug: false,
            timeout_secs: None,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ReportConfig {
    /// Load config from an explicit path, the `SYSREPORT_CONFIG` env var,
    /// or the OS-specific default location. Missing file means defaults.
    pub async fn load(explicit: Option<&Path>) -> Result<Self> {
        let config_path = match explicit {
            Some(p) => p.to_path_buf(),
            None => match std::env::var("SYSREPORT_CONFIG") {
                Ok(p) => PathBuf::from(p),
                Err(_) => Self::config_file_path()?,
            },
        };

        if config_path.exists() {
            let content = tokio::fs::read_to_string(&config_path)
                .await
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            let config: ReportConfig = toml::from_str(&content)
                .with_context(|| format!("Invalid config in {}", config_path.display()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// OS-specific default config file path.
    pub fn config_file_path() -> Result<PathBuf> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        path.push("sysreport");
        path.push("config.toml");
        Ok(path)
    }
}
