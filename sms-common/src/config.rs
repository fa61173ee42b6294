//! Configuration loading and root folder resolution

use crate::db::DEFAULT_CAPACITY_BYTES;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming the data root folder
pub const ROOT_FOLDER_ENV: &str = "SMS_ROOT_FOLDER";

/// Default fetch cycle period (5 minutes)
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 300;

/// Default address for the local HTTP API
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5780";

/// Sync service settings from the `[sync]` table of config.toml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Base URL of the hosted table store (e.g. `https://xyz.supabase.co`)
    pub remote_url: Option<String>,
    /// Anonymous/service API key for the hosted table store
    pub remote_api_key: Option<String>,
    /// Seconds between timer-triggered fetch cycles
    pub interval_secs: u64,
    /// Byte budget for the local key-value store
    pub local_capacity_bytes: usize,
    /// Listen address for the HTTP API
    pub bind: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_url: None,
            remote_api_key: None,
            interval_secs: DEFAULT_SYNC_INTERVAL_SECS,
            local_capacity_bytes: DEFAULT_CAPACITY_BYTES,
            bind: DEFAULT_BIND_ADDR.to_string(),
        }
    }
}

/// Layout of config.toml
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ConfigFile {
    pub root_folder: Option<String>,
    pub sync: SyncConfig,
}

/// Parse a config.toml document
pub fn parse_config(toml_content: &str) -> Result<ConfigFile> {
    toml::from_str(toml_content).map_err(|e| Error::Config(e.to_string()))
}

/// Load the config file
///
/// An explicit path must exist and parse. Without one, the platform config
/// file is used when present; otherwise compiled defaults apply.
pub fn load_config(explicit: Option<&Path>) -> Result<ConfigFile> {
    if let Some(path) = explicit {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Cannot read {}: {}", path.display(), e)))?;
        return parse_config(&content);
    }

    match locate_config_file() {
        Ok(path) => {
            debug!("Using config file {}", path.display());
            let content = std::fs::read_to_string(&path)?;
            parse_config(&content)
        }
        Err(e) => {
            debug!("No config file: {}", e);
            Ok(ConfigFile::default())
        }
    }
}

/// Root folder resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent compiled default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&str>, config: &ConfigFile) -> PathBuf {
    if let Some(path) = cli_arg {
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(root_folder) = &config.root_folder {
        return PathBuf::from(root_folder);
    }

    default_root_folder()
}

/// Path of the local key-value database inside the root folder
pub fn local_store_path(root_folder: &Path) -> PathBuf {
    root_folder.join("sms-local.db")
}

/// Get default configuration file path for the platform
fn locate_config_file() -> Result<PathBuf> {
    let user_config = dirs::config_dir().map(|d| d.join("sms").join("config.toml"));

    if let Some(path) = user_config {
        if path.exists() {
            return Ok(path);
        }
    }

    if cfg!(target_os = "linux") {
        let system_config = PathBuf::from("/etc/sms/config.toml");
        if system_config.exists() {
            return Ok(system_config);
        }
    }

    Err(Error::Config("No config file found".to_string()))
}

/// Get OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    match dirs::data_local_dir() {
        Some(dir) => dir.join("sms"),
        None => {
            warn!("Could not determine local data directory, using ./sms_data");
            PathBuf::from("./sms_data")
        }
    }
}
