//! Configuration loading and root folder resolution
//!
//! Each setting resolves in priority order:
//! 1. Command-line argument or environment variable (highest priority)
//! 2. TOML config file
//! 3. Compiled default (fallback)
//!
//! A missing config file is not an error: the service logs a warning and starts on
//! defaults. A config file that exists but does not parse is an error.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "SITESYNC_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "sitesync.db";

/// Compiled defaults for the current platform
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub bind_addr: String,
    pub port: u16,
    pub persistence_timeout_ms: u64,
    pub outbound_capacity: usize,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            root_folder: default_root_folder(),
            bind_addr: "127.0.0.1".to_string(),
            port: 5000,
            persistence_timeout_ms: 5000,
            outbound_capacity: 256,
        }
    }
}

/// Contents of `config.toml`; every key optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub root_folder: Option<PathBuf>,
    pub bind_addr: Option<String>,
    pub port: Option<u16>,
    pub shared_secret: Option<i64>,
    pub persistence_timeout_ms: Option<u64>,
    pub outbound_capacity: Option<usize>,
}

impl TomlConfig {
    /// Load from an explicit path, or from the platform default location
    ///
    /// Missing files yield an empty config with a warning.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => match default_config_path() {
                Some(path) => path,
                None => {
                    warn!("Could not determine config directory, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        if !path.exists() {
            warn!("Config file not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(&path)?;
        let config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub root_folder: Option<PathBuf>,
    pub bind_addr: Option<String>,
    pub port: Option<u16>,
    pub shared_secret: Option<i64>,
    pub persistence_timeout_ms: Option<u64>,
    pub outbound_capacity: Option<usize>,
}

/// Fully resolved hub configuration
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub root_folder: PathBuf,
    pub bind_addr: String,
    pub port: u16,
    /// `None` means "load or initialize from the database settings table"
    pub shared_secret: Option<i64>,
    pub persistence_timeout: Duration,
    pub outbound_capacity: usize,
}

impl HubConfig {
    /// Merge overrides, file and compiled defaults
    pub fn resolve(overrides: &ConfigOverrides, file: &TomlConfig) -> Result<Self> {
        let defaults = CompiledDefaults::for_current_platform();

        let root_folder = overrides
            .root_folder
            .clone()
            .or_else(|| std::env::var(ROOT_FOLDER_ENV).ok().map(PathBuf::from))
            .or_else(|| file.root_folder.clone())
            .unwrap_or(defaults.root_folder);

        let outbound_capacity = overrides
            .outbound_capacity
            .or(file.outbound_capacity)
            .unwrap_or(defaults.outbound_capacity);
        if outbound_capacity == 0 {
            return Err(Error::Config("outbound_capacity must be at least 1".to_string()));
        }

        let timeout_ms = overrides
            .persistence_timeout_ms
            .or(file.persistence_timeout_ms)
            .unwrap_or(defaults.persistence_timeout_ms);
        if timeout_ms == 0 {
            return Err(Error::Config("persistence_timeout_ms must be at least 1".to_string()));
        }

        Ok(Self {
            root_folder,
            bind_addr: overrides
                .bind_addr
                .clone()
                .or_else(|| file.bind_addr.clone())
                .unwrap_or(defaults.bind_addr),
            port: overrides.port.or(file.port).unwrap_or(defaults.port),
            shared_secret: overrides.shared_secret.or(file.shared_secret),
            persistence_timeout: Duration::from_millis(timeout_ms),
            outbound_capacity,
        })
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    pub fn listen_addr(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

/// Platform config file location (`<config dir>/sitesync/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("sitesync").join("config.toml"))
}

/// Get OS-dependent default root folder path
fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("sitesync"))
        .unwrap_or_else(|| PathBuf::from("./sitesync_data"))
}
