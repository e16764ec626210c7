//! Configuration loading for the access engine.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `AI_ACCESS_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{CryptoError, CryptoKey};

const ENV_PREFIX: &str = "AI_ACCESS_";
const REDACTED: &str = "[REDACTED]";

/// Application configuration derived from `AI_ACCESS_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    /// Raw 32-byte key used to seal stored credentials.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crypto_key: Option<Vec<u8>>,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub sync: SyncConfig,
}

/// Capability cache sizing and entry lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct CacheConfig {
    /// Lifetime of a repopulated entry (default: 300)
    #[serde(default = "default_cache_ttl_seconds")]
    pub ttl_seconds: u64,
    /// Maximum number of entries held in memory (default: 1024)
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
}

/// Capability sync scheduling and discovery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct SyncConfig {
    /// Run the background sync loop alongside the HTTP server
    #[serde(default)]
    pub enabled: bool,
    /// Interval between scheduled sync runs in seconds (default: 3600)
    #[serde(default = "default_sync_tick_interval_seconds")]
    pub tick_interval_seconds: u64,
    /// Timeout for one vendor model listing request (default: 20)
    #[serde(default = "default_sync_discovery_timeout_seconds")]
    pub discovery_timeout_seconds: u64,
    /// Providers discovered concurrently (default: 4)
    #[serde(default = "default_sync_concurrency")]
    pub concurrency: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            crypto_key: None,
            cache: CacheConfig::default(),
            sync: SyncConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_cache_ttl_seconds(),
            capacity: default_cache_capacity(),
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            tick_interval_seconds: default_sync_tick_interval_seconds(),
            discovery_timeout_seconds: default_sync_discovery_timeout_seconds(),
            concurrency: default_sync_concurrency(),
        }
    }
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ttl_seconds == 0 || self.ttl_seconds > 86_400 {
            return Err(ConfigError::InvalidCacheTtl {
                value: self.ttl_seconds,
            });
        }
        if self.capacity == 0 {
            return Err(ConfigError::InvalidCacheCapacity);
        }
        Ok(())
    }
}

impl SyncConfig {
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs(self.tick_interval_seconds)
    }

    pub fn discovery_timeout(&self) -> Duration {
        Duration::from_secs(self.discovery_timeout_seconds)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(60..=86_400).contains(&self.tick_interval_seconds) {
            return Err(ConfigError::InvalidSyncTickInterval {
                value: self.tick_interval_seconds,
            });
        }
        if self.discovery_timeout_seconds == 0 {
            return Err(ConfigError::InvalidDiscoveryTimeout);
        }
        if self.concurrency == 0 || self.concurrency > 32 {
            return Err(ConfigError::InvalidSyncConcurrency {
                value: self.concurrency,
            });
        }
        Ok(())
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    /// Builds the credential sealing key.
    pub fn credential_key(&self) -> Result<CryptoKey, ConfigError> {
        let bytes = self.crypto_key.clone().ok_or(ConfigError::MissingCryptoKey)?;
        CryptoKey::new(bytes).map_err(ConfigError::InvalidCryptoKey)
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.crypto_key.is_some() {
            config.crypto_key = Some(REDACTED.as_bytes().to_vec());
        }
        if let Some(at) = config.database_url.find('@') {
            // Credentials live between the scheme and the host.
            let scheme_end = config.database_url.find("://").map_or(0, |i| i + 3);
            if scheme_end < at {
                config
                    .database_url
                    .replace_range(scheme_end..at, REDACTED);
            }
        }
        serde_json::to_string_pretty(&config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match &self.crypto_key {
            Some(key) if key.len() != 32 => {
                return Err(ConfigError::InvalidCryptoKeyLength { length: key.len() });
            }
            Some(_) => {}
            None => return Err(ConfigError::MissingCryptoKey),
        }

        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidLogFormat {
                value: self.log_format.clone(),
            });
        }

        self.cache.validate()?;
        self.sync.validate()?;

        Ok(())
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "postgresql://localhost:5432/ai_access".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5000
}

fn default_cache_ttl_seconds() -> u64 {
    300
}

fn default_cache_capacity() -> usize {
    1024
}

fn default_sync_tick_interval_seconds() -> u64 {
    3600
}

fn default_sync_discovery_timeout_seconds() -> u64 {
    20
}

fn default_sync_concurrency() -> usize {
    4
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("crypto key is missing; set AI_ACCESS_CRYPTO_KEY environment variable")]
    MissingCryptoKey,
    #[error("crypto key is invalid base64: {error}")]
    InvalidCryptoKeyBase64 { error: String },
    #[error("crypto key must decode to exactly 32 bytes, got {length} bytes")]
    InvalidCryptoKeyLength { length: usize },
    #[error("crypto key rejected: {0}")]
    InvalidCryptoKey(#[source] CryptoError),
    #[error("log format must be 'json' or 'pretty', got '{value}'")]
    InvalidLogFormat { value: String },
    #[error("{key} must be a valid number or boolean, got '{value}'")]
    InvalidValue { key: String, value: String },
    #[error("cache ttl must be between 1 and 86400 seconds, got {value}")]
    InvalidCacheTtl { value: u64 },
    #[error("cache capacity must be positive")]
    InvalidCacheCapacity,
    #[error("sync tick interval must be between 60 and 86400 seconds, got {value}")]
    InvalidSyncTickInterval { value: u64 },
    #[error("sync discovery timeout must be positive")]
    InvalidDiscoveryTimeout,
    #[error("sync concurrency must be between 1 and 32, got {value}")]
    InvalidSyncConcurrency { value: usize },
}

/// Loads configuration using layered `.env` files and `AI_ACCESS_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory.
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Process environment wins over every file layer.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = take_string(&mut layered, "PROFILE").unwrap_or(profile_hint);
        let api_bind_addr =
            take_string(&mut layered, "API_BIND_ADDR").unwrap_or_else(default_api_bind_addr);
        let log_level = take_string(&mut layered, "LOG_LEVEL").unwrap_or_else(default_log_level);
        let log_format =
            take_string(&mut layered, "LOG_FORMAT").unwrap_or_else(default_log_format);
        let database_url =
            take_string(&mut layered, "DATABASE_URL").unwrap_or_else(default_database_url);
        let db_max_connections = take_parsed(&mut layered, "DB_MAX_CONNECTIONS")?
            .unwrap_or_else(default_db_max_connections);
        let db_acquire_timeout_ms = take_parsed(&mut layered, "DB_ACQUIRE_TIMEOUT_MS")?
            .unwrap_or_else(default_db_acquire_timeout_ms);

        let crypto_key = match take_string(&mut layered, "CRYPTO_KEY") {
            Some(encoded) => {
                use base64::{Engine as _, engine::general_purpose};
                Some(general_purpose::STANDARD.decode(encoded.trim()).map_err(|e| {
                    ConfigError::InvalidCryptoKeyBase64 {
                        error: e.to_string(),
                    }
                })?)
            }
            None => None,
        };

        let cache = CacheConfig {
            ttl_seconds: take_parsed(&mut layered, "CACHE_TTL_SECONDS")?
                .unwrap_or_else(default_cache_ttl_seconds),
            capacity: take_parsed(&mut layered, "CACHE_CAPACITY")?
                .unwrap_or_else(default_cache_capacity),
        };

        let sync = SyncConfig {
            enabled: take_parsed(&mut layered, "SYNC_ENABLED")?.unwrap_or(false),
            tick_interval_seconds: take_parsed(&mut layered, "SYNC_TICK_INTERVAL_SECONDS")?
                .unwrap_or_else(default_sync_tick_interval_seconds),
            discovery_timeout_seconds: take_parsed(
                &mut layered,
                "SYNC_DISCOVERY_TIMEOUT_SECONDS",
            )?
            .unwrap_or_else(default_sync_discovery_timeout_seconds),
            concurrency: take_parsed(&mut layered, "SYNC_CONCURRENCY")?
                .unwrap_or_else(default_sync_concurrency),
        };

        let config = AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            crypto_key,
            cache,
            sync,
        };

        config.validate()?;

        match config.bind_addr() {
            Ok(_) => Ok(config),
            Err(source) => Err(ConfigError::InvalidBindAddr {
                value: config.api_bind_addr.clone(),
                source,
            }),
        }
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{ENV_PREFIX}PROFILE"))
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(self.base_dir.join(format!(".env.{profile}")), &mut values)?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{profile}.local")),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn take_string(layered: &mut BTreeMap<String, String>, key: &str) -> Option<String> {
    layered.remove(key).filter(|v| !v.trim().is_empty())
}

/// Parses a layered value, rejecting anything present but malformed.
fn take_parsed<T: std::str::FromStr>(
    layered: &mut BTreeMap<String, String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    match take_string(layered, key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: format!("{ENV_PREFIX}{key}"),
                value: raw,
            }),
        None => Ok(None),
    }
}
