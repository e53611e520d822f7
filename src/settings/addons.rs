//! Project addon settings.
//!
//! Reading follows a bundle's pinned versions. Writing validates every
//! supplied version against the target's production bundle first and
//! refuses to write anything when a version disagrees.

use super::SyncError;
use crate::server::{Bundle, ServerClient};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{error, info, warn};

/// Settings of one addon together with the version they belong to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AddonSettingsEntry {
    pub version: String,
    pub settings: Value,
}

/// Addon name to versioned settings.
pub type AddonSettingsMap = BTreeMap<String, AddonSettingsEntry>;

/// Anatomy and addon settings of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSettings {
    pub anatomy: Value,
    #[serde(default)]
    pub addons: AddonSettingsMap,
}

/// Outcome of writing addon settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Addons written successfully.
    pub applied: Vec<String>,
    /// Addons skipped by request.
    pub skipped: Vec<String>,
    /// Bundle addons for which no settings were supplied.
    pub missing: Vec<String>,
    /// Addons whose write failed, with the error text.
    pub failed: Vec<(String, String)>,
}

impl ApplyReport {
    /// Returns true if every write succeeded.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

fn is_skipped(skip_addons: &[String], addon: &str) -> bool {
    skip_addons.iter().any(|s| s == addon)
}

/// Resolves a bundle by name, or the production bundle when no name is given.
pub(crate) fn resolve_bundle(
    client: &ServerClient,
    bundle_name: Option<&str>,
) -> Result<Bundle, SyncError> {
    let bundle = match bundle_name {
        Some(name) => client.get_bundle(name)?,
        None => client.get_production_bundle()?,
    };
    bundle.ok_or_else(|| SyncError::BundleNotFound(bundle_name.map(String::from)))
}

/// Reads the project settings of every addon pinned by a bundle.
///
/// Uses the production bundle unless `bundle_name` is given. Addons in
/// `skip_addons` are left out.
pub fn get_project_addons_settings(
    client: &ServerClient,
    project_name: &str,
    bundle_name: Option<&str>,
    skip_addons: &[String],
) -> Result<AddonSettingsMap, SyncError> {
    let bundle = resolve_bundle(client, bundle_name)?;
    info!("[SYNC] Reading addon settings of '{}' from bundle '{}'", project_name, bundle.name);

    let mut addons = AddonSettingsMap::new();
    for (addon, version) in bundle.pinned_addons() {
        if is_skipped(skip_addons, addon) {
            continue;
        }
        let settings = client.get_project_addon_settings(project_name, addon, version)?;
        addons.insert(
            addon.to_string(),
            AddonSettingsEntry {
                version: version.to_string(),
                settings,
            },
        );
    }

    Ok(addons)
}

/// Checks supplied versions against a bundle.
///
/// Returns the mismatch messages; bundle addons without supplied settings
/// and skipped addons are recorded in the report.
fn validate_against_bundle(
    bundle: &Bundle,
    addons: &AddonSettingsMap,
    skip_addons: &[String],
    report: &mut ApplyReport,
) -> Vec<String> {
    let mut errors = Vec::new();

    for (addon, version) in bundle.pinned_addons() {
        if is_skipped(skip_addons, addon) {
            info!("[SYNC] Skip {}", addon);
            report.skipped.push(addon.to_string());
            continue;
        }
        let Some(entry) = addons.get(addon) else {
            warn!("[SYNC] Addon \"{}\" is not in bundle {}", addon, bundle.name);
            report.missing.push(addon.to_string());
            continue;
        };
        if entry.version != version {
            errors.push(format!(
                "Addon \"{}\" version is not equal to bundle version: {} > {}",
                addon, entry.version, version
            ));
        }
    }

    errors
}

/// Writes project addon settings after validating them against the
/// target's production bundle.
///
/// Any version mismatch aborts before the first write and returns all
/// mismatches at once. Individual write failures are logged and reported,
/// the remaining addons are still written.
pub fn set_project_addons_settings(
    client: &ServerClient,
    project_name: &str,
    addons: &AddonSettingsMap,
    skip_addons: &[String],
) -> Result<ApplyReport, SyncError> {
    let bundle = resolve_bundle(client, None)?;
    info!("[SYNC] Writing addon settings of '{}' to bundle '{}'", project_name, bundle.name);

    let mut report = ApplyReport::default();
    let errors = validate_against_bundle(&bundle, addons, skip_addons, &mut report);
    if !errors.is_empty() {
        for e in &errors {
            error!("[SYNC] {}", e);
        }
        return Err(SyncError::VersionMismatch(errors));
    }

    for (addon, entry) in addons {
        if is_skipped(skip_addons, addon) {
            continue;
        }
        match client.set_project_addon_settings(project_name, addon, &entry.version, &entry.settings) {
            Ok(()) => report.applied.push(addon.clone()),
            Err(e) => {
                error!("[SYNC] Error setting addon \"{}\" settings: {}", addon, e);
                report.failed.push((addon.clone(), e.to_string()));
            }
        }
    }

    Ok(report)
}

/// Reads a project's anatomy and addon settings.
pub fn get_project_all_settings(
    client: &ServerClient,
    project_name: &str,
    bundle_name: Option<&str>,
    skip_addons: &[String],
) -> Result<ProjectSettings, SyncError> {
    Ok(ProjectSettings {
        anatomy: client.get_project_anatomy(project_name)?,
        addons: get_project_addons_settings(client, project_name, bundle_name, skip_addons)?,
    })
}

/// Writes a project's anatomy, then its addon settings.
pub fn set_project_all_settings(
    client: &ServerClient,
    project_name: &str,
    settings: &ProjectSettings,
    skip_addons: &[String],
) -> Result<ApplyReport, SyncError> {
    client.update_project_anatomy(project_name, &settings.anatomy)?;
    set_project_addons_settings(client, project_name, &settings.addons, skip_addons)
}
