//! TOML configuration for the alder daemon.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration, parsed from TOML.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Node identity and addresses.
    pub node: NodeSection,
    /// Storage backend selection.
    pub storage: StorageSection,
    /// Sequencer tuning.
    pub sequencer: SequencerSection,
    /// CT front-end settings.
    pub ct: CtSection,
    /// Logging configuration.
    pub log: LogSection,
}

/// `[node]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    /// Directory for persistent data (storage keyspaces, signing key).
    pub data_dir: PathBuf,
    /// Address for the CT HTTP API.
    pub listen_addr: String,
}

impl Default for NodeSection {
    fn default() -> Self {
        let data_dir = dirs::home_dir()
            .map(|h| h.join(".alder"))
            .unwrap_or_else(|| PathBuf::from(".alder"));
        Self {
            data_dir,
            listen_addr: "0.0.0.0:6962".to_string(),
        }
    }
}

/// `[storage]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Backend type: `"file"` (default) or `"memory"`.
    pub backend: String,
    /// Log identifier recorded in every signed root.
    pub log_id: Option<i64>,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            backend: "file".to_string(),
            log_id: None,
        }
    }
}

/// `[sequencer]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct SequencerSection {
    /// Maximum leaves integrated per tick.
    pub batch_limit: Option<usize>,
    /// Milliseconds between sequencing passes.
    pub tick_millis: Option<u64>,
    /// Re-sign the tree head when it gets older than this.
    pub max_root_age_millis: Option<u64>,
}

/// `[ct]` section.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CtSection {
    /// Deadline for each backend call, in milliseconds.
    pub rpc_timeout_millis: Option<u64>,
    /// Maximum entries one get-entries request may ask for.
    pub max_get_entries: Option<u64>,
    /// PEM bundle of trusted root certificates.
    pub roots_pem_file: Option<PathBuf>,
}

/// `[log]` section.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LogSection {
    /// Log level filter (e.g. `"info"`, `"debug"`, `"warn"`).
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

impl CliConfig {
    /// Load config from a TOML file, or use defaults if no path given.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(p) => {
                let content = std::fs::read_to_string(p)?;
                let config: CliConfig = toml::from_str(&content)?;
                Ok(config)
            }
            None => Ok(Self::default()),
        }
    }

    /// Parse config from a TOML string (used in tests).
    #[cfg(test)]
    pub fn from_toml(s: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(s)?)
    }

    /// Effective log identifier.
    pub fn log_id(&self) -> i64 {
        self.storage.log_id.unwrap_or(1)
    }

    /// Effective per-tick batch limit.
    pub fn batch_limit(&self) -> usize {
        self.sequencer.batch_limit.unwrap_or(50)
    }

    /// Effective sequencer tick interval.
    pub fn tick(&self) -> Duration {
        Duration::from_millis(self.sequencer.tick_millis.unwrap_or(1_000))
    }

    /// Effective maximum tree head age before a forced re-sign.
    pub fn max_root_age(&self) -> Duration {
        Duration::from_millis(self.sequencer.max_root_age_millis.unwrap_or(300_000))
    }

    /// Effective backend RPC deadline.
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_millis(self.ct.rpc_timeout_millis.unwrap_or(500))
    }

    /// Effective get-entries range cap.
    pub fn max_get_entries(&self) -> u64 {
        self.ct.max_get_entries.unwrap_or(1_000)
    }
}
