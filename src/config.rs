//! Hydrolink configuration.
//!
//! Loaded from `~/.hydrolink/config.toml`. Every key is optional; a missing
//! file means defaults throughout.
//!
//! ```toml
//! database = "/var/lib/hydrolink/catalog.sqlite"
//!
//! [sensor]
//! bridge-url = "http://192.168.1.20:5000/api/nfc"
//! poll-interval-ms = 1000
//! request-timeout-ms = 10000
//!
//! [[sensor.tags]]
//! id = "SUPPLY_LEFT"
//! position = "Supply hose left"
//! ```
//!
//! The sensor bridge URL is resolved through a chain:
//!
//! 1. `--bridge-url <url>`
//! 2. `HYDROLINK_BRIDGE_URL` env var
//! 3. `sensor.bridge-url` in the config file
//! 4. [`DEFAULT_BRIDGE_URL`]

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs, io};

use serde::{Deserialize, Serialize};

use crate::model::TagInfo;
use crate::sensor::{PollerConfig, TagCatalog};
use crate::storage::Storage;

/// Where the bridge listens when nothing else is configured.
pub const DEFAULT_BRIDGE_URL: &str = "http://127.0.0.1:5000/api/nfc";

/// Environment variable overriding the configured bridge URL.
pub const BRIDGE_URL_VAR: &str = "HYDROLINK_BRIDGE_URL";

/// Hydrolink configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// Catalog database path. Defaults to `~/.hydrolink/catalog.sqlite`.
    pub database: Option<PathBuf>,

    pub sensor: SensorConfig,
}

/// The `[sensor]` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct SensorConfig {
    pub bridge_url: Option<String>,
    pub poll_interval_ms: u64,
    pub request_timeout_ms: u64,

    /// Tags the reader may report. Replaces the built-in set when given.
    pub tags: Vec<TagInfo>,
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            bridge_url: None,
            poll_interval_ms: 1000,
            request_timeout_ms: 10_000,
            tags: TagInfo::defaults(),
        }
    }
}

impl Config {
    /// Load config from `~/.hydrolink/config.toml`, or defaults if it doesn't exist.
    pub fn load() -> Result<Self, String> {
        match Self::path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load config from `path`, or defaults if it doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let contents = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(format!("failed to read {}: {e}", path.display())),
        };

        let config: Self = toml::from_str(&contents)
            .map_err(|e| format!("invalid config at {}: {e}", path.display()))?;

        if config.sensor.poll_interval_ms == 0 {
            return Err(format!(
                "sensor.poll-interval-ms must be positive in {}",
                path.display()
            ));
        }
        if let Some(tag) = config.sensor.tags.iter().find(|t| t.id.trim().is_empty()) {
            return Err(format!(
                "sensor tag with position '{}' has an empty id in {}",
                tag.position,
                path.display()
            ));
        }

        Ok(config)
    }

    /// The config file path: `~/.hydrolink/config.toml`.
    pub fn path() -> Option<PathBuf> {
        dirs::home_dir().map(|h| h.join(".hydrolink").join("config.toml"))
    }

    /// The catalog database path, falling back to the default location.
    pub fn database_path(&self) -> Option<PathBuf> {
        self.database.clone().or_else(Storage::default_path)
    }

    /// Resolve the sensor bridge URL from the resolution chain.
    pub fn bridge_url(&self, explicit: Option<&str>) -> String {
        self.bridge_url_with(explicit, env::var(BRIDGE_URL_VAR).ok())
    }

    fn bridge_url_with(&self, explicit: Option<&str>, from_env: Option<String>) -> String {
        // 1. Explicit --bridge-url flag.
        if let Some(url) = explicit {
            return url.to_string();
        }

        // 2. HYDROLINK_BRIDGE_URL environment variable.
        if let Some(url) = from_env
            && !url.is_empty()
        {
            return url;
        }

        // 3. Config file, then the built-in default.
        self.sensor
            .bridge_url
            .clone()
            .filter(|url| !url.is_empty())
            .unwrap_or_else(|| DEFAULT_BRIDGE_URL.to_string())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.sensor.request_timeout_ms)
    }

    pub fn poller_config(&self) -> PollerConfig {
        PollerConfig {
            interval: Duration::from_millis(self.sensor.poll_interval_ms),
            catalog: TagCatalog::new(self.sensor.tags.clone()),
        }
    }
}
