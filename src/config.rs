//! Node-level ambient configuration.
//!
//! This is deliberately narrow: storage location, how often the Mempool
//! Janitor sweeps, and the log level. Protocol constants (`constants.rs`)
//! are never exposed here — they are fixed for wire/consensus
//! compatibility, not something an operator should be able to tune.

use std::path::PathBuf;

use config::{Config as ConfigSource, Environment, File};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeConfig {
    pub data_dir: PathBuf,
    pub janitor_interval_secs: u64,
    pub log_level: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            data_dir: dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("./data"))
                .join("denarite"),
            janitor_interval_secs: 30,
            log_level: "info".to_string(),
        }
    }
}

impl NodeConfig {
    /// Layered load: built-in defaults, then an optional
    /// `~/.config/denarite/config.toml`, then `DENARITE_*` environment
    /// variables, each overriding the last.
    pub fn load() -> anyhow::Result<Self> {
        let defaults = NodeConfig::default();

        let mut builder = ConfigSource::builder()
            .set_default("data_dir", defaults.data_dir.to_string_lossy().to_string())?
            .set_default("janitor_interval_secs", defaults.janitor_interval_secs)?
            .set_default("log_level", defaults.log_level.clone())?;

        if let Some(config_path) = dirs::config_dir().map(|d| d.join("denarite").join("config.toml")) {
            if config_path.exists() {
                builder = builder.add_source(File::from(config_path));
            }
        }

        builder = builder.add_source(Environment::with_prefix("DENARITE"));

        let built = builder.build()?;
        Ok(Self {
            data_dir: PathBuf::from(built.get::<String>("data_dir")?),
            janitor_interval_secs: built.get("janitor_interval_secs")?,
            log_level: built.get("log_level")?,
        })
    }
}
