use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::models::SiteConfig;

pub const DEFAULT_CONFIG: &str = "sites.json";
pub const DEFAULT_OUTPUT: &str = "analytics_report.csv";
pub const DEFAULT_LOG_FILE: &str = "analytics_digest.log";

#[derive(Debug, Deserialize)]
struct ConfigFile {
    output: Option<PathBuf>,
    log_file: Option<PathBuf>,
    #[serde(default)]
    sites: Vec<SiteConfig>,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub sites: Vec<SiteConfig>,
    pub output: PathBuf,
    pub log_file: PathBuf,
}

impl RunConfig {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let file: ConfigFile = serde_json::from_str(raw)?;

        for site in &file.sites {
            if site.name.trim().is_empty() {
                anyhow::bail!("site with property {} has an empty name", site.property_id);
            }
            if site.property_id.is_empty() || !site.property_id.chars().all(|c| c.is_ascii_digit()) {
                anyhow::bail!(
                    "site {} has a non-numeric property id {:?}",
                    site.name,
                    site.property_id
                );
            }
        }

        Ok(Self {
            sites: file.sites,
            output: file.output.unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
            log_file: file
                .log_file
                .unwrap_or_else(|| PathBuf::from(DEFAULT_LOG_FILE)),
        })
    }
}
