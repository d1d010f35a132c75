use anyhow::{Context, Result};
use freightflow_core::{ResolvePolicy, TowerConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_settlement_delay_ms")]
    pub settlement_delay_ms: u64,
    #[serde(default)]
    pub policy: ResolvePolicy,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

fn default_settlement_delay_ms() -> u64 {
    2500
}

fn default_log_filter() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settlement_delay_ms: default_settlement_delay_ms(),
            policy: ResolvePolicy::default(),
            log_filter: default_log_filter(),
        }
    }
}

impl Config {
    /// Get (~/.freightflow)
    pub fn default_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".freightflow"))
    }

    pub fn workflows_dir(root: &Path) -> PathBuf {
        root.join("workflows")
    }

    pub fn config_file(root: &Path) -> PathBuf {
        root.join("config.json")
    }

    pub fn load_or_default(root: &Path) -> Result<Self> {
        let config_path = Self::config_file(root);

        if config_path.exists() {
            let content =
                std::fs::read_to_string(&config_path).context("Failed to read config file")?;
            let config: Config =
                serde_json::from_str(&content).context("Failed to parse config file")?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self, root: &Path) -> Result<()> {
        let config_path = Self::config_file(root);

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(&config_path, content).context("Failed to write config file")?;

        Ok(())
    }

    pub fn tower_config(&self) -> TowerConfig {
        TowerConfig {
            settlement_delay: Duration::from_millis(self.settlement_delay_ms),
            policy: self.policy,
        }
    }
}
