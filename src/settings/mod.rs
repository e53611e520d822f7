//! Settings synchronization between servers and files.
//!
//! # Architecture
//!
//! - **addons**: project addon settings read/write, validated against the production bundle
//! - **clone**: copy projects, addon settings, presets, attributes and bundles between servers
//! - **snapshot**: dump/restore the whole server configuration as one JSON file
//! - **diff**: structural diff of two JSON documents
//!
//! Every operation is a sequence of blocking calls; clone operations read
//! everything from the source before touching the target.

mod addons;
mod clone;
mod diff;
mod snapshot;

pub use addons::{
    AddonSettingsEntry, AddonSettingsMap, ApplyReport, ProjectSettings, get_project_addons_settings,
    get_project_all_settings, set_project_addons_settings, set_project_all_settings,
};
pub use clone::{
    CloneBundleReport, clone_addon_settings, clone_attributes, clone_bundle, clone_project,
    clone_studio_anatomy_preset, slugify,
};
pub use diff::{ChangeKind, JsonChange, diff_values};
pub use snapshot::{
    RestoreReport, ServerSnapshot, dump_server_settings, fetch_server_snapshot,
    restore_server_settings, restore_server_snapshot,
};

use crate::server::ServerError;
use std::io;
use thiserror::Error;

/// Settings synchronization errors.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Server call failed.
    #[error(transparent)]
    Server(#[from] ServerError),

    /// Requested bundle does not exist (`None` = production bundle).
    #[error("Bundle not found: {}", .0.as_deref().unwrap_or("<production>"))]
    BundleNotFound(Option<String>),

    /// Source project does not exist.
    #[error("Source project not found: {0}")]
    ProjectNotFound(String),

    /// Addon versions disagree with the target bundle.
    #[error("Some errors occurred: {}", .0.join("; "))]
    VersionMismatch(Vec<String>),

    /// Target server lacks addon versions pinned by the bundle.
    #[error("Missing addons on target server: {}", .0.join(", "))]
    MissingAddons(Vec<String>),

    /// Snapshot file I/O failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Snapshot file is not valid JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
