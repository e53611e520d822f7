//! Configuration module for ayon-tools.
//!
//! Handles loading and parsing the `~/.ayonrc` configuration file.
//! Environment variables override values from the file.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::logging::LogConfig;
use crate::repo::{REPO_ROOT_ENV, SettingsStore};
use crate::server::{
    API_KEY_ENV, Credentials, DEFAULT_API_KEY, DEFAULT_SERVER_URL, SERVER_URL_ENV,
};

/// Default .ayonrc file content with all settings documented.
const DEFAULT_AYONRC: &str = r#"# ayon-tools Configuration File
# ==============================
# Lines starting with '#' are comments.
# AYON_SERVER_URL, AYON_API_KEY and AYON_SETTINGS_REPO_ROOT override
# the values below.
#
# Default Server
# --------------
# server_url = http://localhost:5000
# api_key = veryinsecurapikey

# Server Profiles
# ---------------
# Format: server.<alias> = <url>|<api_key>
# Use the alias with --server, --from and --to, or as "server" in studio.json.
#
# Examples:
# server.prod = https://ayon.studio.local|prod-api-key
# server.staging = http://ayon-staging:5000|staging-api-key

# Settings Repository
# -------------------
# Git repository holding studio and project settings.
# settings_repo_root = ~/ayon-settings-root

# Addons never touched by sync commands (comma separated)
# skip_addons = ayon_third_party, ayon_ocio

# Logging Configuration
# ---------------------
# Logs are stored in ~/.ayon-tools/logs/ with automatic cleanup.
#
# log_enabled = true       # Enable/disable file logging (true/false)
# log_level = info         # Log level: trace, debug, info, warn, error, off
# log_retention = 24       # Hours to keep log files (default: 24)
"#;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file could not be read or created.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Server alias is neither a profile nor a URL.
    #[error("Unknown server '{0}': not a profile in .ayonrc and not an http(s) URL")]
    UnknownServer(String),

    /// An API key override was given but empty.
    #[error("API key for server '{0}' must not be empty")]
    EmptyApiKey(String),
}

/// Named server profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerProfile {
    pub url: String,
    pub api_key: String,
}

/// Tool configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Default server URL.
    pub server_url: String,
    /// Default API key.
    pub api_key: String,
    /// Named server profiles.
    pub servers: BTreeMap<String, ServerProfile>,
    /// Root of the settings repository.
    pub settings_repo_root: PathBuf,
    /// Addons skipped by sync commands.
    pub skip_addons: Vec<String>,
    /// Path to config file.
    pub config_path: PathBuf,
    /// Logging configuration.
    pub log_config: LogConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            api_key: DEFAULT_API_KEY.to_string(),
            servers: BTreeMap::new(),
            settings_repo_root: SettingsStore::default_root(),
            skip_addons: Vec::new(),
            config_path: Self::default_config_path(),
            log_config: LogConfig::default(),
        }
    }
}

impl Config {
    /// Returns the default config file path (~/.ayonrc).
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".ayonrc")
    }

    /// Loads configuration from the default path, creating it if it doesn't
    /// exist, then applies environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_config_path();
        let mut config = Self::load_from(&path)?;
        config.apply_env();
        Ok(config)
    }

    /// Loads configuration from a specific path without environment overrides.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            Self::create_default_config(path)?;
        }

        let content = fs::read_to_string(path)?;
        let mut config = Self {
            config_path: path.to_path_buf(),
            ..Self::default()
        };
        config.parse(&content);
        Ok(config)
    }

    /// Creates the default config file.
    fn create_default_config(path: &Path) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_AYONRC.as_bytes())?;
        Ok(())
    }

    /// Parses the config file content.
    fn parse(&mut self, content: &str) {
        for line in content.lines() {
            let line = line.trim();

            // Skip comments and empty lines
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            // Parse key = value
            if let Some((key, value)) = line.split_once('=') {
                let key = key.trim();
                let value = value.trim();

                // Remove inline comments
                let value = value.split(" #").next().unwrap_or(value).trim();

                self.apply_setting(key, value);
            }
        }
    }

    /// Applies a single setting.
    fn apply_setting(&mut self, key: &str, value: &str) {
        match key {
            "server_url" => {
                if !value.is_empty() {
                    self.server_url = value.trim_end_matches('/').to_string();
                }
            }
            "api_key" => {
                if !value.is_empty() {
                    self.api_key = value.to_string();
                }
            }
            "settings_repo_root" => {
                if !value.is_empty() {
                    self.settings_repo_root = expand_home(value);
                }
            }
            "skip_addons" => {
                self.skip_addons = value
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect();
            }
            "log_level" => {
                self.log_config.level = LogConfig::parse_level(value);
            }
            "log_retention" | "log_retention_hours" => {
                self.log_config.retention_hours = LogConfig::parse_retention(value);
            }
            "log_enabled" | "logging" => {
                self.log_config.enabled =
                    matches!(value.to_lowercase().as_str(), "true" | "yes" | "1" | "on");
            }
            _ => {
                // server.<alias> = <url>|<api_key>
                if let Some(alias) = key.strip_prefix("server.") {
                    if let Some((url, api_key)) = value.split_once('|') {
                        let url = url.trim().trim_end_matches('/');
                        let api_key = api_key.trim();
                        if !alias.is_empty() && !url.is_empty() && !api_key.is_empty() {
                            self.servers.insert(
                                alias.to_string(),
                                ServerProfile {
                                    url: url.to_string(),
                                    api_key: api_key.to_string(),
                                },
                            );
                        }
                    }
                }
            }
        }
    }

    /// Applies `AYON_SERVER_URL`, `AYON_API_KEY` and `AYON_SETTINGS_REPO_ROOT`.
    pub fn apply_env(&mut self) {
        self.apply_overrides(
            env::var(SERVER_URL_ENV).ok().as_deref(),
            env::var(API_KEY_ENV).ok().as_deref(),
            env::var(REPO_ROOT_ENV).ok().as_deref(),
        );
    }

    /// Overrides file values; empty or missing values are ignored.
    pub fn apply_overrides(&mut self, server_url: Option<&str>, api_key: Option<&str>, repo_root: Option<&str>) {
        if let Some(url) = server_url.map(str::trim).filter(|v| !v.is_empty()) {
            self.server_url = url.trim_end_matches('/').to_string();
        }
        if let Some(key) = api_key.filter(|v| !v.is_empty()) {
            self.api_key = key.to_string();
        }
        if let Some(root) = repo_root.map(str::trim).filter(|v| !v.is_empty()) {
            self.settings_repo_root = expand_home(root);
        }
    }

    /// Returns credentials of the default server.
    #[must_use]
    pub fn default_credentials(&self) -> Credentials {
        Credentials::new(&self.server_url, &self.api_key)
    }

    /// Resolves a server given as profile alias, `default`, or URL.
    ///
    /// `api_key` overrides the key of the resolved server. A bare URL
    /// without `api_key` uses the default API key.
    pub fn resolve_server(&self, server: Option<&str>, api_key: Option<&str>) -> Result<Credentials, ConfigError> {
        let server = server.map(str::trim).unwrap_or("");
        let (url, key) = if server.is_empty() || server == "default" {
            (self.server_url.as_str(), self.api_key.as_str())
        } else if let Some(profile) = self.servers.get(server) {
            (profile.url.as_str(), profile.api_key.as_str())
        } else if server.starts_with("http://") || server.starts_with("https://") {
            (server, self.api_key.as_str())
        } else {
            return Err(ConfigError::UnknownServer(server.to_string()));
        };

        let key = match api_key {
            Some(k) if k.trim().is_empty() => return Err(ConfigError::EmptyApiKey(url.to_string())),
            Some(k) => k,
            None => key,
        };
        Ok(Credentials::new(url, key))
    }

    /// Returns the settings store for the configured repository root.
    #[must_use]
    pub fn store(&self) -> SettingsStore {
        SettingsStore::new(self.settings_repo_root.clone())
    }
}

/// Expands a leading `~/` to the home directory.
fn expand_home(value: &str) -> PathBuf {
    if let Some(rest) = value.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(value)
}
