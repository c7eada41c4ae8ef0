//! Dashboard configuration

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;

/// Dashboard configuration, read from `DASHBOARD_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// Name reported in structured logs
    #[serde(default = "default_node_name")]
    pub node_name: String,

    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Root of the versioned artifact store
    #[serde(default = "default_artifact_dir")]
    pub artifact_dir: PathBuf,

    /// Cleaned telemetry CSV used for training and replay
    #[serde(default = "default_telemetry_path")]
    pub telemetry_path: PathBuf,

    #[serde(default = "default_generations_to_keep")]
    pub generations_to_keep: usize,

    /// Seed for the split, clustering and isolation forests
    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default = "default_idle_contamination")]
    pub idle_contamination: f64,

    #[serde(default = "default_live_contamination")]
    pub live_contamination: f64,

    /// Resources per synthetic live batch
    #[serde(default = "default_live_batch_size")]
    pub live_batch_size: usize,
}

fn default_node_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "unknown".to_string())
}

fn default_api_port() -> u16 {
    8000
}

fn default_artifact_dir() -> PathBuf {
    PathBuf::from("artifacts")
}

fn default_telemetry_path() -> PathBuf {
    PathBuf::from("cleaned_vm_data.csv")
}

fn default_generations_to_keep() -> usize {
    3
}

fn default_seed() -> u64 {
    42
}

fn default_idle_contamination() -> f64 {
    0.15
}

fn default_live_contamination() -> f64 {
    0.10
}

fn default_live_batch_size() -> usize {
    10
}

impl DashboardConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let source = config::Config::builder()
            .add_source(config::Environment::with_prefix("DASHBOARD").try_parsing(true))
            .build()
            .context("failed to read DASHBOARD_* environment")?;
        Self::from_config(source)
    }

    pub fn from_config(source: config::Config) -> Result<Self> {
        let config: DashboardConfig = source
            .try_deserialize()
            .context("invalid dashboard configuration")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("idle_contamination", self.idle_contamination),
            ("live_contamination", self.live_contamination),
        ] {
            if !(value > 0.0 && value <= 0.5) {
                anyhow::bail!("{} must be in (0, 0.5], got {}", name, value);
            }
        }
        if self.generations_to_keep == 0 {
            anyhow::bail!("generations_to_keep must be at least 1");
        }
        Ok(())
    }
}
