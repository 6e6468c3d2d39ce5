//! Application-level configuration loading: listing limits, channel sizing, gate timeout and CORS.

use std::{env, fs, io::ErrorKind, path::PathBuf, time::Duration};

use serde::Deserialize;
use tracing::{info, warn};

/// Default location on disk where the server looks for the JSON configuration.
const DEFAULT_CONFIG_PATH: &str = "config/app.json";
/// Environment variable that overrides [`DEFAULT_CONFIG_PATH`].
const CONFIG_PATH_ENV: &str = "PLANNING_POKER_CONFIG_PATH";
/// Environment variable selecting the storage backend.
const STORAGE_BACKEND_ENV: &str = "STORAGE_BACKEND";
/// Comma-separated origins overriding `cors_origins` from the file.
const CORS_ORIGINS_ENV: &str = "CORS_ORIGINS";

const DEFAULT_LISTING_LIMIT: usize = 100;
const DEFAULT_CHANNEL_CAPACITY: usize = 32;
const DEFAULT_GATE_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone)]
/// Immutable runtime configuration shared across the application.
pub struct AppConfig {
    listing_limit: usize,
    channel_capacity: usize,
    gate_timeout: Duration,
    cors_origins: Vec<String>,
}

impl AppConfig {
    /// Load the application configuration from disk, falling back to built-in defaults.
    ///
    /// `CORS_ORIGINS` takes precedence over the file when set.
    pub fn load() -> Self {
        let mut config = Self::load_file();
        if let Ok(raw) = env::var(CORS_ORIGINS_ENV) {
            config.cors_origins = parse_origins(&raw);
        }
        config
    }

    fn load_file() -> Self {
        let path = resolve_config_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawConfig>(&contents) {
                Ok(raw) => {
                    let app_config: Self = raw.into();
                    info!(
                        path = %path.display(),
                        listing_limit = app_config.listing_limit,
                        channel_capacity = app_config.channel_capacity,
                        "loaded application config"
                    );
                    app_config
                }
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse config; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "config file not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read config; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Upper bound applied to every store scan.
    pub fn listing_limit(&self) -> usize {
        self.listing_limit
    }

    /// Buffer size of each per-room broadcast channel.
    pub fn channel_capacity(&self) -> usize {
        self.channel_capacity
    }

    /// How long an action waits for its room gate before giving up.
    pub fn gate_timeout(&self) -> Duration {
        self.gate_timeout
    }

    /// Allowed CORS origins. Empty means any origin.
    pub fn cors_origins(&self) -> &[String] {
        &self.cors_origins
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listing_limit: DEFAULT_LISTING_LIMIT,
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
            gate_timeout: Duration::from_millis(DEFAULT_GATE_TIMEOUT_MS),
            cors_origins: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the configuration file located at [`DEFAULT_CONFIG_PATH`].
struct RawConfig {
    #[serde(default = "default_listing_limit")]
    listing_limit: usize,
    #[serde(default = "default_channel_capacity")]
    channel_capacity: usize,
    #[serde(default = "default_gate_timeout_ms")]
    gate_timeout_ms: u64,
    #[serde(default)]
    cors_origins: Vec<String>,
}

impl From<RawConfig> for AppConfig {
    fn from(value: RawConfig) -> Self {
        // A zero capacity would make `broadcast::channel` panic.
        Self {
            listing_limit: value.listing_limit.max(1),
            channel_capacity: value.channel_capacity.max(1),
            gate_timeout: Duration::from_millis(value.gate_timeout_ms),
            cors_origins: value.cors_origins,
        }
    }
}

fn default_listing_limit() -> usize {
    DEFAULT_LISTING_LIMIT
}

fn default_channel_capacity() -> usize {
    DEFAULT_CHANNEL_CAPACITY
}

fn default_gate_timeout_ms() -> u64 {
    DEFAULT_GATE_TIMEOUT_MS
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(str::to_owned)
        .collect()
}

/// Resolve the configuration path taking the environment override into account.
fn resolve_config_path() -> PathBuf {
    env::var_os(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .filter(|path| !path.as_os_str().is_empty())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Persistence backend picked at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    /// MongoDB, supervised and reconnected in the background.
    #[cfg(feature = "mongo-store")]
    Mongo,
    /// Process-local maps, lost on restart.
    Memory,
}

impl StorageBackend {
    /// Read `STORAGE_BACKEND`, defaulting to MongoDB when it is compiled in.
    pub fn from_env() -> Self {
        let raw = env::var(STORAGE_BACKEND_ENV).unwrap_or_default();
        Self::parse(&raw)
    }

    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" => StorageBackend::Memory,
            #[cfg(feature = "mongo-store")]
            "" | "mongo" | "mongodb" => StorageBackend::Mongo,
            #[cfg(not(feature = "mongo-store"))]
            "" => StorageBackend::Memory,
            other => {
                warn!(
                    backend = other,
                    "unknown storage backend; using the default one"
                );
                Self::parse("")
            }
        }
    }
}
