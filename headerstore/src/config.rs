//! The two scalars §6 says are read at init: network selector, and an
//! optional override of the headers file path. Everything else (data
//! directory resolution, TOML loading) is the caller's concern — folded
//! into `headerstore-node::config` for the CLI binary.

use crate::checkpoints::Network;
use std::path::PathBuf;

pub const DEFAULT_HEADERS_FILENAME: &str = "headers.dat";

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub network: Network,
    /// Directory the headers file lives under, unless overridden.
    pub data_dir: PathBuf,
    /// Explicit override of the headers file path (§6).
    pub headers_path_override: Option<PathBuf>,
}

impl StoreConfig {
    pub fn new(network: Network, data_dir: impl Into<PathBuf>) -> Self {
        Self {
            network,
            data_dir: data_dir.into(),
            headers_path_override: None,
        }
    }

    pub fn with_headers_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.headers_path_override = Some(path.into());
        self
    }

    pub fn headers_path(&self) -> PathBuf {
        match &self.headers_path_override {
            Some(p) => p.clone(),
            None => self.data_dir.join(DEFAULT_HEADERS_FILENAME),
        }
    }
}

/// Delete the headers file so the next `init` starts from an empty log
/// (§6 `zap`).
pub fn zap(config: &StoreConfig) -> std::io::Result<()> {
    let path = config.headers_path();
    match std::fs::remove_file(&path) {
        Ok(()) => {
            tracing::warn!(path = %path.display(), "removed headers file");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
