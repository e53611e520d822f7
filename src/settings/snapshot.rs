//! Whole-server configuration snapshots.
//!
//! A snapshot holds the production bundle, every anatomy preset, the
//! attribute definitions and the studio settings of each pinned addon.

use super::SyncError;
use super::addons::resolve_bundle;
use crate::server::{Bundle, NewBundle, ServerClient};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{error, info};

/// Dump file contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerSnapshot {
    pub bundle: Bundle,
    #[serde(default)]
    pub studio_presets: BTreeMap<String, Value>,
    #[serde(default)]
    pub attributes: Value,
    /// Addon name to studio settings.
    #[serde(default)]
    pub addons: BTreeMap<String, Value>,
}

impl ServerSnapshot {
    /// Reads a snapshot file.
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Writes the snapshot as 2-space indented JSON.
    pub fn save(&self, path: &Path) -> Result<(), SyncError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let content = serde_json::to_string_pretty(self)?;
        let mut file = fs::File::create(path)?;
        file.write_all(content.as_bytes())?;
        file.flush()?;
        Ok(())
    }
}

/// Outcome of a restore.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Presets uploaded.
    pub presets: Vec<String>,
    /// Addons whose settings were restored.
    pub restored: Vec<String>,
    /// Addons that failed, with the error text.
    pub failed: Vec<(String, String)>,
}

/// Reads the current server configuration.
pub fn fetch_server_snapshot(client: &ServerClient) -> Result<ServerSnapshot, SyncError> {
    let bundle = resolve_bundle(client, None)?;

    let mut addons = BTreeMap::new();
    for (addon, version) in bundle.pinned_addons() {
        addons.insert(addon.to_string(), client.get_addon_settings(addon, version)?);
    }

    let mut studio_presets = BTreeMap::new();
    for name in client.get_studio_presets_names()? {
        let preset = client.get_studio_preset(&name)?;
        studio_presets.insert(name, preset);
    }

    let attributes = client.get_attributes()?;

    Ok(ServerSnapshot {
        bundle,
        studio_presets,
        attributes,
        addons,
    })
}

/// Dumps the server configuration into a JSON file.
pub fn dump_server_settings(client: &ServerClient, path: &Path) -> Result<ServerSnapshot, SyncError> {
    let snapshot = fetch_server_snapshot(client)?;
    snapshot.save(path)?;
    info!(
        "[SYNC] Dumped {} (bundle '{}', {} presets, {} addons) to {}",
        client.server_url(),
        snapshot.bundle.name,
        snapshot.studio_presets.len(),
        snapshot.addons.len(),
        path.display()
    );
    Ok(snapshot)
}

/// Writes a snapshot to the server.
///
/// Creates the bundle as production, uploads presets and attributes, then
/// restores addon settings one by one. Addon failures are logged and
/// reported; earlier steps abort on the first error.
pub fn restore_server_snapshot(
    client: &ServerClient,
    snapshot: &ServerSnapshot,
) -> Result<RestoreReport, SyncError> {
    let bundle = &snapshot.bundle;
    client.create_bundle(&NewBundle::new(&bundle.name, bundle.addons.clone()).production(true))?;

    let mut report = RestoreReport::default();
    for (name, preset) in &snapshot.studio_presets {
        client.upload_studio_preset(name, preset)?;
        report.presets.push(name.clone());
    }

    client.set_attributes(&snapshot.attributes)?;

    for (addon, settings) in &snapshot.addons {
        let Some(version) = bundle.addon_version(addon) else {
            error!("[SYNC] Restore {} FAILED: addon is not pinned by bundle '{}'", addon, bundle.name);
            report
                .failed
                .push((addon.clone(), format!("not pinned by bundle '{}'", bundle.name)));
            continue;
        };
        match client.set_addon_settings(addon, version, settings) {
            Ok(()) => report.restored.push(addon.clone()),
            Err(e) => {
                error!("[SYNC] Restore {} {} FAILED: {}", addon, version, e);
                report.failed.push((addon.clone(), e.to_string()));
            }
        }
    }

    Ok(report)
}

/// Restores the server configuration from a JSON file.
pub fn restore_server_settings(client: &ServerClient, path: &Path) -> Result<RestoreReport, SyncError> {
    let snapshot = ServerSnapshot::load(path)?;
    let report = restore_server_snapshot(client, &snapshot)?;
    info!(
        "[SYNC] Restored {} from {} ({} addons, {} failed)",
        client.server_url(),
        path.display(),
        report.restored.len(),
        report.failed.len()
    );
    Ok(report)
}
