//! Copying configuration from one server to another.
//!
//! Everything is read from the source first, then written to the target.
//! Writes are last-writer-wins; nothing is merged.

use super::SyncError;
use super::addons::{get_project_addons_settings, resolve_bundle, set_project_addons_settings, ApplyReport};
use crate::server::{NewBundle, ServerClient};
use std::collections::BTreeMap;
use tracing::{error, info};

/// Builds a project code from a project name.
///
/// Splits on anything that is not an ASCII letter or digit and joins the
/// remaining parts with `_`.
#[must_use]
pub fn slugify(name: &str) -> String {
    name.split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join("_")
}

/// Copies a project's anatomy, creating the target project if needed.
///
/// `to_project` defaults to `from_project`.
pub fn clone_project(
    source: &ServerClient,
    target: &ServerClient,
    from_project: &str,
    to_project: Option<&str>,
) -> Result<(), SyncError> {
    let to_project = to_project.unwrap_or(from_project);

    if source.get_project(from_project)?.is_none() {
        return Err(SyncError::ProjectNotFound(from_project.to_string()));
    }
    let anatomy = source.get_project_anatomy(from_project)?;

    if target.get_project(to_project)?.is_none() {
        let code = slugify(to_project);
        info!("[SYNC] Target project '{}' missing, creating with code '{}'", to_project, code);
        target.create_project(to_project, &code, Some(&anatomy))?;
    }
    target.update_project_anatomy(to_project, &anatomy)?;

    info!(
        "[SYNC] Cloned project '{}' ({}) -> '{}' ({})",
        from_project,
        source.server_url(),
        to_project,
        target.server_url()
    );
    Ok(())
}

/// Copies a project's addon settings.
///
/// Reads against `bundle_name` (or the source production bundle) and writes
/// with validation against the target production bundle.
pub fn clone_addon_settings(
    source: &ServerClient,
    target: &ServerClient,
    from_project: &str,
    to_project: Option<&str>,
    bundle_name: Option<&str>,
    skip_addons: &[String],
) -> Result<ApplyReport, SyncError> {
    let to_project = to_project.unwrap_or(from_project);
    let settings = get_project_addons_settings(source, from_project, bundle_name, skip_addons)?;
    set_project_addons_settings(target, to_project, &settings, skip_addons)
}

/// Copies an anatomy preset. `to_preset` defaults to `from_preset`.
pub fn clone_studio_anatomy_preset(
    source: &ServerClient,
    target: &ServerClient,
    from_preset: &str,
    to_preset: Option<&str>,
) -> Result<(), SyncError> {
    let to_preset = to_preset.unwrap_or(from_preset);
    let preset = source.get_studio_preset(from_preset)?;
    target.upload_studio_preset(to_preset, &preset)?;
    info!("[SYNC] Cloned anatomy preset '{}' -> '{}'", from_preset, to_preset);
    Ok(())
}

/// Copies the attribute definitions.
pub fn clone_attributes(source: &ServerClient, target: &ServerClient) -> Result<(), SyncError> {
    let attributes = source.get_attributes()?;
    target.set_attributes(&attributes)?;
    info!("[SYNC] Cloned attributes {} -> {}", source.server_url(), target.server_url());
    Ok(())
}

/// Outcome of a bundle clone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloneBundleReport {
    /// Name of the bundle created on the target.
    pub bundle_name: String,
    /// Addons whose studio settings were copied.
    pub copied: Vec<String>,
    /// Addons whose settings copy failed, with the error text.
    pub failed: Vec<(String, String)>,
}

/// Recreates a bundle on the target and copies its studio addon settings.
///
/// The source bundle is `from_bundle` or the source production bundle.
/// Every pinned addon version must already be installed on the target;
/// otherwise nothing is created. The new bundle is not marked production.
pub fn clone_bundle(
    source: &ServerClient,
    target: &ServerClient,
    from_bundle: Option<&str>,
    to_bundle: Option<&str>,
) -> Result<CloneBundleReport, SyncError> {
    let bundle = resolve_bundle(source, from_bundle)?;
    let to_bundle = to_bundle.unwrap_or(&bundle.name).to_string();

    let installed = target.list_addons()?;
    let missing: Vec<String> = bundle
        .pinned_addons()
        .filter(|(addon, version)| {
            !installed
                .iter()
                .any(|info| info.name == *addon && info.has_version(version))
        })
        .map(|(addon, version)| format!("{} {}", addon, version))
        .collect();
    if !missing.is_empty() {
        for m in &missing {
            error!("[SYNC] Addon {} is not installed on {}", m, target.server_url());
        }
        return Err(SyncError::MissingAddons(missing));
    }

    let mut settings = BTreeMap::new();
    for (addon, version) in bundle.pinned_addons() {
        settings.insert(addon.to_string(), (version.to_string(), source.get_addon_settings(addon, version)?));
    }

    let request = NewBundle::new(&to_bundle, bundle.addons.clone())
        .installer_version(bundle.installer_version.clone());
    target.create_bundle(&request)?;

    let mut report = CloneBundleReport {
        bundle_name: to_bundle,
        ..CloneBundleReport::default()
    };
    for (addon, (version, value)) in settings {
        match target.set_addon_settings(&addon, &version, &value) {
            Ok(()) => report.copied.push(addon),
            Err(e) => {
                error!("[SYNC] Copy settings of {} {} FAILED: {}", addon, version, e);
                report.failed.push((addon, e.to_string()));
            }
        }
    }

    info!(
        "[SYNC] Cloned bundle '{}' -> '{}' ({} addons copied, {} failed)",
        bundle.name,
        report.bundle_name,
        report.copied.len(),
        report.failed.len()
    );
    Ok(report)
}
