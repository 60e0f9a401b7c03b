//! TOML-backed node configuration, wrapping `headerstore::StoreConfig` with
//! the node-level fields SPEC_FULL §B.3 calls for (log level, flush
//! interval), the same shape as the teacher's `btclib::config::Config`.

use headerstore::{Network, StoreConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub network: Network,
    pub data_dir: PathBuf,
    pub headers_path_override: Option<PathBuf>,
    pub log_level: String,
    pub flush_interval_secs: u64,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            network: Network::Main,
            data_dir: default_data_dir(),
            headers_path_override: None,
            log_level: "info".to_string(),
            flush_interval_secs: 30,
        }
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("headerstore")
}

impl NodeConfig {
    pub fn load_from_file(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: NodeConfig = toml::from_str(&text)?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let text = toml::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }

    pub fn to_store_config(&self) -> StoreConfig {
        let mut config = StoreConfig::new(self.network, self.data_dir.clone());
        if let Some(path) = &self.headers_path_override {
            config = config.with_headers_path(path.clone());
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let config = NodeConfig {
            network: Network::Test,
            data_dir: PathBuf::from("/tmp/chain-test"),
            headers_path_override: Some(PathBuf::from("/tmp/chain-test/custom.dat")),
            log_level: "debug".to_string(),
            flush_interval_secs: 5,
        };
        config.save_to_file(&path).unwrap();
        let loaded = NodeConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.network, Network::Test);
        assert_eq!(loaded.flush_interval_secs, 5);
        assert_eq!(
            loaded.headers_path_override,
            Some(PathBuf::from("/tmp/chain-test/custom.dat"))
        );
    }
}
