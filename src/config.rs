//! Configuration management for asnlist.
//!
//! A [`Config`] is built once per run, from an optional YAML file overlaid
//! with command-line flags, and then passed by reference to the cache,
//! the fetcher and the device connector.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::warn;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::cli::Cli;
use crate::error::SyncError;
use crate::fetcher::{DEFAULT_API_URL, DEFAULT_FETCH_TIMEOUT_SECS};
use crate::validation::{validate_api_url, validate_asn};

/// Default RouterOS API port
pub const DEFAULT_API_PORT: u16 = 8728;

/// Default RouterOS API-SSL port
pub const DEFAULT_API_SSL_PORT: u16 = 8729;

/// Default cache time-to-live (one day)
pub const DEFAULT_CACHE_TTL_SECS: u64 = 86400;

/// Default cache directory
pub const DEFAULT_CACHE_PATH: &str = "./tmp";

/// Secure string type that zeroizes memory on drop
/// Used for the device password
#[derive(Clone, Default, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(transparent)]
pub struct SecureString(String);

impl SecureString {
    pub fn new(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Debug for SecureString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[REDACTED]")
    }
}

impl From<String> for SecureString {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for SecureString {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// IP or DNS name of the RouterOS device
    pub router: String,

    /// API user
    pub user: String,

    /// API password
    /// Memory is securely zeroed when dropped
    pub password: SecureString,

    /// Environment variable name to read the password from (optional)
    pub password_env: Option<String>,

    /// API port; derived from `ssl` when unset
    pub port: Option<u16>,

    /// Use the API-SSL service
    pub ssl: bool,

    /// Skip certificate and hostname verification
    pub tls_insecure: bool,

    /// Address-list to maintain
    pub list: String,

    /// ASNs to sync, in processing order
    pub asns: Vec<String>,

    /// Cache time-to-live in seconds
    pub cache_ttl: u64,

    /// Directory for `{asn}.asn` cache files
    pub cache_path: PathBuf,

    /// Prefix lookup service base URL
    pub api_url: String,

    /// Lookup request timeout in seconds
    pub fetch_timeout: u64,

    /// Device connect/command timeout in seconds; `None` blocks on the transport
    pub device_timeout: Option<u64>,

    /// Log the diff without applying it
    pub dry_run: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            router: String::new(),
            user: String::new(),
            password: SecureString::default(),
            password_env: None,
            port: None,
            ssl: false,
            tls_insecure: false,
            list: String::new(),
            asns: Vec::new(),
            cache_ttl: DEFAULT_CACHE_TTL_SECS,
            cache_path: PathBuf::from(DEFAULT_CACHE_PATH),
            api_url: DEFAULT_API_URL.to_string(),
            fetch_timeout: DEFAULT_FETCH_TIMEOUT_SECS,
            device_timeout: None,
            dry_run: false,
        }
    }
}

impl Config {
    /// Load configuration from YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;
        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path.as_ref()))?;
        Ok(config)
    }

    /// Build the run configuration: config file (if any), then CLI overrides,
    /// then normalization and validation.
    pub fn from_cli(cli: &Cli) -> Result<Self> {
        let mut config = match &cli.config {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };

        config.apply_cli(cli);
        config.normalize();
        config.validate()?;
        Ok(config)
    }

    /// Overlay values given on the command line
    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some(router) = &cli.router {
            self.router = router.clone();
        }
        if let Some(user) = &cli.user {
            self.user = user.clone();
        }
        if let Some(password) = &cli.password {
            self.password = SecureString::from(password.as_str());
        }
        if cli.port.is_some() {
            self.port = cli.port;
        }
        if cli.ssl {
            self.ssl = true;
        }
        if cli.tls_insecure {
            self.tls_insecure = true;
        }
        if let Some(list) = &cli.list {
            self.list = list.clone();
        }
        if !cli.asns.is_empty() {
            self.asns = cli.asns.clone();
        }
        if let Some(ttl) = cli.cache_ttl {
            self.cache_ttl = ttl;
        }
        if let Some(path) = &cli.cache_path {
            self.cache_path = path.clone();
        }
        if let Some(url) = &cli.api_url {
            self.api_url = url.clone();
        }
        if let Some(timeout) = cli.fetch_timeout {
            self.fetch_timeout = timeout;
        }
        if cli.device_timeout.is_some() {
            self.device_timeout = cli.device_timeout;
        }
        if cli.dry_run {
            self.dry_run = true;
        }
    }

    /// Trim ASNs, drop empty ones and repeats (first occurrence wins)
    pub fn normalize(&mut self) {
        let mut seen = Vec::with_capacity(self.asns.len());
        for asn in self.asns.drain(..) {
            let asn = asn.trim().to_string();
            if asn.is_empty() {
                continue;
            }
            if seen.contains(&asn) {
                warn!("ASN {} listed more than once, processing it once", asn);
                continue;
            }
            seen.push(asn);
        }
        self.asns = seen;

        self.api_url = self.api_url.trim_end_matches('/').to_string();
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), SyncError> {
        if self.router.is_empty() {
            return Err(SyncError::Config("router address is required".to_string()));
        }
        if self.user.is_empty() {
            return Err(SyncError::Config("API user is required".to_string()));
        }
        if self.list.is_empty() {
            return Err(SyncError::Config("address-list name is required".to_string()));
        }
        if self.asns.is_empty() {
            return Err(SyncError::Config("at least one ASN is required".to_string()));
        }
        for asn in &self.asns {
            validate_asn(asn)?;
        }
        if self.port == Some(0) {
            return Err(SyncError::Config("port cannot be 0".to_string()));
        }
        if self.fetch_timeout == 0 {
            return Err(SyncError::Config("fetch timeout cannot be 0".to_string()));
        }
        if self.device_timeout == Some(0) {
            return Err(SyncError::Config("device timeout cannot be 0".to_string()));
        }
        validate_api_url(&self.api_url)?;
        Ok(())
    }

    /// Effective API port
    pub fn device_port(&self) -> u16 {
        match self.port {
            Some(port) => port,
            None if self.ssl => DEFAULT_API_SSL_PORT,
            None => DEFAULT_API_PORT,
        }
    }

    /// Get the effective password, checking the configured env var first
    /// Returns a SecureString that will be zeroed when dropped
    pub fn get_password(&self) -> SecureString {
        if let Some(ref env_name) = self.password_env {
            if let Ok(val) = env::var(env_name) {
                return SecureString::new(val);
            }
        }
        self.password.clone()
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout)
    }

    pub fn device_timeout(&self) -> Option<Duration> {
        self.device_timeout.map(Duration::from_secs)
    }
}
