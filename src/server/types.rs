//! Server resource types.
//!
//! Only fields the toolkit reads are typed. Everything else is kept in
//! `extra` so a fetched resource can be posted back unchanged.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::io;
use thiserror::Error;

/// Server API errors.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Transport-level failure (connect, timeout, body read).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with a non-success status.
    #[error("Server returned {status} for {url}: {body}")]
    Status {
        status: reqwest::StatusCode,
        url: String,
        body: String,
    },

    /// Response or payload was not the expected JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Reading a local JSON payload failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Payload had the wrong shape.
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// No dependency package to derive an installer version from.
    #[error("No dependency packages available to pick an installer version")]
    NoInstallerVersion,
}

impl ServerError {
    /// Returns the HTTP status if this is a status error.
    #[must_use]
    pub fn status(&self) -> Option<reqwest::StatusCode> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Http(e) => e.status(),
            _ => None,
        }
    }

    /// Returns true for a 404 response.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(reqwest::StatusCode::NOT_FOUND)
    }
}

/// A bundle: pinned addon versions deployed as a unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    /// Bundle name.
    pub name: String,
    /// Addon name to version. `None` means the addon is disabled.
    #[serde(default)]
    pub addons: BTreeMap<String, Option<String>>,
    /// Launcher installer version.
    #[serde(default)]
    pub installer_version: Option<String>,
    /// Platform to dependency package filename.
    #[serde(default)]
    pub dependency_packages: BTreeMap<String, Option<String>>,
    #[serde(default)]
    pub is_production: bool,
    #[serde(default)]
    pub is_staging: bool,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub is_dev: bool,
    /// Remaining fields (createdAt, addonDevelopment, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Bundle {
    /// Iterates addons with a pinned version, in name order.
    pub fn pinned_addons(&self) -> impl Iterator<Item = (&str, &str)> {
        self.addons
            .iter()
            .filter_map(|(name, version)| version.as_deref().map(|v| (name.as_str(), v)))
    }

    /// Returns the pinned version of an addon.
    #[must_use]
    pub fn addon_version(&self, addon: &str) -> Option<&str> {
        self.addons.get(addon).and_then(|v| v.as_deref())
    }
}

/// Response of `GET /api/bundles`.
#[derive(Debug, Clone, Deserialize)]
pub struct BundleList {
    #[serde(default)]
    pub bundles: Vec<Bundle>,
}

/// A dependency package available on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyPackage {
    pub filename: String,
    pub platform: String,
    pub installer_version: String,
}

/// Response of `GET /api/desktop/dependencyPackages`.
#[derive(Debug, Clone, Deserialize)]
pub struct DependencyPackageList {
    #[serde(default)]
    pub packages: Vec<DependencyPackage>,
}

/// Payload for creating a bundle.
#[derive(Debug, Clone, PartialEq)]
pub struct NewBundle {
    pub name: String,
    pub addons: BTreeMap<String, Option<String>>,
    pub production: bool,
    pub staging: bool,
    /// Installer version; the newest available one when `None`.
    pub installer_version: Option<String>,
}

impl NewBundle {
    /// Creates a non-production, non-staging bundle request.
    #[must_use]
    pub fn new(name: &str, addons: BTreeMap<String, Option<String>>) -> Self {
        Self {
            name: name.to_string(),
            addons,
            production: false,
            staging: false,
            installer_version: None,
        }
    }

    /// Marks the bundle as production.
    #[must_use]
    pub fn production(mut self, production: bool) -> Self {
        self.production = production;
        self
    }

    /// Marks the bundle as staging.
    #[must_use]
    pub fn staging(mut self, staging: bool) -> Self {
        self.staging = staging;
        self
    }

    /// Pins the installer version.
    #[must_use]
    pub fn installer_version(mut self, version: Option<String>) -> Self {
        self.installer_version = version;
        self
    }

    /// Builds the request body against the server's dependency packages.
    pub fn to_body(&self, packages: &[DependencyPackage]) -> Result<Value, ServerError> {
        if self.name.trim().is_empty() {
            return Err(ServerError::InvalidPayload("Bundle name must not be empty".to_string()));
        }
        let installer = match &self.installer_version {
            Some(v) => v.clone(),
            None => newest_installer_version(packages).ok_or(ServerError::NoInstallerVersion)?,
        };

        let dependency_packages: Map<String, Value> = packages
            .iter()
            .map(|p| (p.platform.clone(), Value::String(p.filename.clone())))
            .collect();

        Ok(serde_json::json!({
            "addons": self.addons,
            "installerVersion": installer,
            "name": self.name,
            "dependencyPackages": dependency_packages,
            "isArchived": false,
            "isStaging": self.staging,
            "isProduction": self.production,
            "isDev": false,
            "addonDevelopment": {},
        }))
    }
}

/// Returns the highest installer version among the packages.
#[must_use]
pub fn newest_installer_version(packages: &[DependencyPackage]) -> Option<String> {
    packages
        .iter()
        .map(|p| p.installer_version.as_str())
        .max_by(|a, b| compare_versions(a, b))
        .map(String::from)
}

/// Compares dotted versions numerically, falling back to text order
/// for non-numeric parts (`1.10.0` > `1.9.3`).
#[must_use]
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = a.split(['.', '-', '+']);
    let mut right = b.split(['.', '-', '+']);
    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (Some(_), None) => return Ordering::Greater,
            (None, Some(_)) => return Ordering::Less,
            (Some(l), Some(r)) => {
                let ord = match (l.parse::<u64>(), r.parse::<u64>()) {
                    (Ok(l), Ok(r)) => l.cmp(&r),
                    _ => l.cmp(r),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
        }
    }
}

/// Anatomy preset summary from `GET /api/anatomy/presets`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnatomyPresetInfo {
    pub name: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response of `GET /api/anatomy/presets`.
#[derive(Debug, Clone, Deserialize)]
pub struct AnatomyPresetList {
    #[serde(default)]
    pub presets: Vec<AnatomyPresetInfo>,
}

/// Project summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectInfo {
    pub name: String,
    #[serde(default)]
    pub code: String,
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_true() -> bool {
    true
}

/// Response of `GET /api/projects`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectList {
    #[serde(default)]
    pub projects: Vec<ProjectInfo>,
}

/// Addon installed on the server with its available versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddonInfo {
    pub name: String,
    #[serde(default)]
    pub versions: BTreeMap<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AddonInfo {
    /// Returns true if the given version is installed.
    #[must_use]
    pub fn has_version(&self, version: &str) -> bool {
        self.versions.contains_key(version)
    }
}

/// Response of `GET /api/addons`.
#[derive(Debug, Clone, Deserialize)]
pub struct AddonList {
    #[serde(default)]
    pub addons: Vec<AddonInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn package(platform: &str, installer: &str) -> DependencyPackage {
        DependencyPackage {
            filename: format!("{}-{}.zip", platform, installer),
            platform: platform.to_string(),
            installer_version: installer.to_string(),
        }
    }

    #[test]
    fn test_bundle_keeps_unknown_fields() {
        let raw = json!({
            "name": "prod-2024",
            "addons": {"core": "1.0.0", "maya": null},
            "installerVersion": "1.0.1",
            "isProduction": true,
            "createdAt": "2024-01-01T00:00:00",
        });
        let bundle: Bundle = serde_json::from_value(raw).unwrap();
        assert!(bundle.is_production);
        assert_eq!(bundle.extra.get("createdAt"), Some(&json!("2024-01-01T00:00:00")));

        let back = serde_json::to_value(&bundle).unwrap();
        assert_eq!(back["createdAt"], "2024-01-01T00:00:00");
        assert_eq!(back["installerVersion"], "1.0.1");
    }

    #[test]
    fn test_pinned_addons_skip_disabled() {
        let bundle: Bundle = serde_json::from_value(json!({
            "name": "b",
            "addons": {"core": "1.0.0", "maya": null, "nuke": "0.2.0"},
        }))
        .unwrap();

        let pinned: Vec<_> = bundle.pinned_addons().collect();
        assert_eq!(pinned, vec![("core", "1.0.0"), ("nuke", "0.2.0")]);
        assert_eq!(bundle.addon_version("maya"), None);
    }

    #[test]
    fn test_compare_versions() {
        assert_eq!(compare_versions("1.10.0", "1.9.3"), Ordering::Greater);
        assert_eq!(compare_versions("1.0.0", "1.0.0"), Ordering::Equal);
        assert_eq!(compare_versions("1.0", "1.0.1"), Ordering::Less);
    }

    #[test]
    fn test_newest_installer_version() {
        let packages = vec![package("linux", "1.0.9"), package("windows", "1.0.10")];
        assert_eq!(newest_installer_version(&packages).as_deref(), Some("1.0.10"));
        assert_eq!(newest_installer_version(&[]), None);
    }

    #[test]
    fn test_new_bundle_body() {
        let mut addons = BTreeMap::new();
        addons.insert("core".to_string(), Some("1.0.0".to_string()));
        let packages = vec![package("linux", "1.0.1"), package("windows", "1.0.2")];

        let body = NewBundle::new("restored", addons)
            .production(true)
            .to_body(&packages)
            .unwrap();

        assert_eq!(body["installerVersion"], "1.0.2");
        assert_eq!(body["isProduction"], true);
        assert_eq!(body["isStaging"], false);
        assert_eq!(body["dependencyPackages"]["linux"], "linux-1.0.1.zip");
        assert_eq!(body["addons"]["core"], "1.0.0");
    }

    #[test]
    fn test_new_bundle_without_packages() {
        let result = NewBundle::new("b", BTreeMap::new()).to_body(&[]);
        assert!(matches!(result, Err(ServerError::NoInstallerVersion)));

        let body = NewBundle::new("b", BTreeMap::new())
            .installer_version(Some("1.2.3".to_string()))
            .to_body(&[])
            .unwrap();
        assert_eq!(body["installerVersion"], "1.2.3");
    }

    #[test]
    fn test_new_bundle_requires_name() {
        let packages = vec![package("linux", "1.0.1")];
        let result = NewBundle::new("", BTreeMap::new()).to_body(&packages);
        assert!(matches!(result, Err(ServerError::InvalidPayload(_))));
    }
}
