//! Local metadata store inside the settings repository.
//!
//! Layout under the repository root:
//!
//! ```text
//! addons.json                                  main addon list
//! studios/<code>/studio.json                   studio metadata
//! studios/<code>/addons/<addon>.json           studio addon settings
//! studios/<code>/projects/<project>.json       project settings
//! studios/<code>/projects/<project>/addons/<addon>.json
//! ```

use crate::settings::ProjectSettings;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::env;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

/// Environment variable overriding the repository root.
pub const REPO_ROOT_ENV: &str = "AYON_SETTINGS_REPO_ROOT";

/// Studio metadata file name.
pub const STUDIO_FILE: &str = "studio.json";

/// Main addon list file name.
pub const ADDON_LIST_FILE: &str = "addons.json";

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// File I/O error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// JSON parse or serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Studio directory already exists.
    #[error("Studio {0} already exists")]
    StudioExists(String),

    /// No stored settings at the expected path.
    #[error("Nothing stored at {0}")]
    NotFound(PathBuf),

    /// A studio code, project or addon name unusable as a file name.
    #[error("Invalid {kind}: {value:?}")]
    InvalidName { kind: &'static str, value: String },
}

/// Contents of `studio.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudioConfig {
    pub name: String,
    pub code: String,
    /// Server profile alias from the tool configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl StudioConfig {
    /// Creates a studio config without a server profile.
    #[must_use]
    pub fn new(name: &str, code: &str) -> Self {
        Self {
            name: name.to_string(),
            code: code.to_string(),
            server: None,
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct AddonList {
    #[serde(default)]
    addons: Vec<String>,
}

/// Settings store rooted at a directory.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    root: PathBuf,
}

impl SettingsStore {
    /// Creates a store at a custom root.
    #[must_use]
    pub fn new(root: PathBuf) -> Self {
        assert!(!root.as_os_str().is_empty(), "Store root must not be empty");
        Self { root }
    }

    /// Returns the default root: `AYON_SETTINGS_REPO_ROOT` or `~/ayon-settings-root`.
    #[must_use]
    pub fn default_root() -> PathBuf {
        if let Ok(root) = env::var(REPO_ROOT_ENV) {
            if !root.trim().is_empty() {
                return PathBuf::from(root);
            }
        }
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ayon-settings-root")
    }

    /// Returns the store root.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the directory of a studio.
    #[must_use]
    pub fn studio_path(&self, studio_code: &str) -> PathBuf {
        self.root.join("studios").join(studio_code)
    }

    /// Reads `studio.json`, `None` if the studio has no config yet.
    pub fn get_studio_config(&self, studio_code: &str) -> Result<Option<StudioConfig>, StoreError> {
        check_name("studio code", studio_code)?;
        let path = self.studio_path(studio_code).join(STUDIO_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Writes `studio.json`, creating the studio directory.
    pub fn set_studio_config(&self, studio_code: &str, config: &StudioConfig) -> Result<PathBuf, StoreError> {
        check_name("studio code", studio_code)?;
        let path = self.studio_path(studio_code).join(STUDIO_FILE);
        write_json(&path, config)?;
        debug!("[STORE] Wrote {}", path.display());
        Ok(path)
    }

    /// Registers a new studio. Fails if the studio directory exists.
    pub fn add_new_studio(&self, studio_name: &str, studio_code: &str) -> Result<StudioConfig, StoreError> {
        check_name("studio code", studio_code)?;
        if studio_name.trim().is_empty() {
            return Err(StoreError::InvalidName {
                kind: "studio name",
                value: studio_name.to_string(),
            });
        }
        if self.studio_path(studio_code).exists() {
            return Err(StoreError::StudioExists(studio_name.to_string()));
        }
        let config = StudioConfig::new(studio_name, studio_code);
        self.set_studio_config(studio_code, &config)?;
        info!("[STORE] Added studio {} ({})", studio_name, studio_code);
        Ok(config)
    }

    /// Lists every studio with a `studio.json`, sorted by code.
    pub fn list_studios(&self) -> Result<Vec<StudioConfig>, StoreError> {
        let dir = self.root.join("studios");
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut codes: Vec<String> = fs::read_dir(&dir)?
            .filter_map(Result::ok)
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().to_str().map(String::from))
            .collect();
        codes.sort();

        let mut studios = Vec::with_capacity(codes.len());
        for code in codes {
            if let Some(config) = self.get_studio_config(&code)? {
                studios.push(config);
            }
        }
        Ok(studios)
    }

    /// Returns the settings file of a stored project.
    #[must_use]
    pub fn project_settings_path(&self, studio_code: &str, project_name: &str) -> PathBuf {
        self.studio_path(studio_code)
            .join("projects")
            .join(format!("{}.json", project_name))
    }

    /// Lists the names of stored projects of a studio.
    pub fn list_projects(&self, studio_code: &str) -> Result<Vec<String>, StoreError> {
        check_name("studio code", studio_code)?;
        let dir = self.studio_path(studio_code).join("projects");
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let mut names: Vec<String> = fs::read_dir(&dir)?
            .filter_map(Result::ok)
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().and_then(|e| e.to_str()) == Some("json"))
            .filter_map(|p| p.file_stem().and_then(|s| s.to_str()).map(String::from))
            .collect();
        names.sort();
        Ok(names)
    }

    /// Loads stored project settings.
    pub fn load_project_settings(
        &self,
        studio_code: &str,
        project_name: &str,
    ) -> Result<ProjectSettings, StoreError> {
        check_name("studio code", studio_code)?;
        check_name("project name", project_name)?;
        let path = self.project_settings_path(studio_code, project_name);
        if !path.exists() {
            return Err(StoreError::NotFound(path));
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Stores project settings, replacing existing ones.
    pub fn save_project_settings(
        &self,
        studio_code: &str,
        project_name: &str,
        settings: &ProjectSettings,
    ) -> Result<PathBuf, StoreError> {
        check_name("studio code", studio_code)?;
        check_name("project name", project_name)?;
        let path = self.project_settings_path(studio_code, project_name);
        write_json(&path, settings)?;
        info!("[STORE] Saved project settings to {}", path.display());
        Ok(path)
    }

    /// Returns the file for studio-level (`project = None`) or project-level
    /// addon settings.
    #[must_use]
    pub fn addon_settings_path(&self, studio_code: &str, addon_name: &str, project_name: Option<&str>) -> PathBuf {
        let base = match project_name {
            Some(project) => self.studio_path(studio_code).join("projects").join(project),
            None => self.studio_path(studio_code),
        };
        base.join("addons").join(format!("{}.json", addon_name))
    }

    /// Stores addon settings, replacing existing ones.
    pub fn save_addon_settings(
        &self,
        studio_code: &str,
        addon_name: &str,
        project_name: Option<&str>,
        settings: &Value,
    ) -> Result<PathBuf, StoreError> {
        check_name("studio code", studio_code)?;
        check_name("addon name", addon_name)?;
        if let Some(project) = project_name {
            check_name("project name", project)?;
        }
        let path = self.addon_settings_path(studio_code, addon_name, project_name);
        write_json(&path, settings)?;
        info!("[STORE] Saved addon settings to {}", path.display());
        Ok(path)
    }

    /// Returns the main addon list.
    pub fn addon_urls(&self) -> Result<Vec<String>, StoreError> {
        let path = self.root.join(ADDON_LIST_FILE);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)?;
        let list: AddonList = serde_json::from_str(&content)?;
        Ok(list.addons)
    }

    /// Appends an addon URL to the main list. Returns false if already listed.
    pub fn add_addon_url(&self, addon_url: &str) -> Result<bool, StoreError> {
        let addon_url = addon_url.trim();
        if addon_url.is_empty() {
            return Err(StoreError::InvalidName {
                kind: "addon URL",
                value: addon_url.to_string(),
            });
        }

        let mut addons = self.addon_urls()?;
        if addons.iter().any(|a| a == addon_url) {
            debug!("[STORE] Addon {} already listed", addon_url);
            return Ok(false);
        }
        addons.push(addon_url.to_string());
        write_json(&self.root.join(ADDON_LIST_FILE), &AddonList { addons })?;
        info!("[STORE] Added addon {}", addon_url);
        Ok(true)
    }
}

impl Default for SettingsStore {
    fn default() -> Self {
        Self::new(Self::default_root())
    }
}

/// Rejects names that are blank or would escape their directory.
fn check_name(kind: &'static str, value: &str) -> Result<(), StoreError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." || value.contains(['/', '\\']) {
        return Err(StoreError::InvalidName {
            kind,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Writes JSON with 4-space indentation, creating parent directories.
fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    value.serialize(&mut ser)?;
    buf.push(b'\n');

    let mut file = fs::File::create(path)?;
    file.write_all(&buf)?;
    file.flush()?;
    Ok(())
}
