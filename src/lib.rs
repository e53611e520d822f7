//! ayon-tools
//!
//! Administrative toolkit for AYON configuration servers: list, diff,
//! clone, dump and restore studio/project settings, and keep them in a
//! git-tracked settings repository.
//!
//! # Architecture
//!
//! - **Server Module**: blocking REST client authenticated by API key
//! - **Settings Module**: bundle-validated settings sync, cloning, snapshots, diffs
//! - **Repo Module**: git wrapper and on-disk settings store
//! - **Config Module**: `~/.ayonrc` with named server profiles
//! - **CLI Module**: clap commands
//!
//! # Usage
//!
//! ```no_run
//! use ayon_tools::server::{Credentials, ServerClient};
//! use ayon_tools::settings::get_project_all_settings;
//!
//! let client = ServerClient::new(Credentials::from_env());
//! let settings = get_project_all_settings(&client, "demo", None, &[])?;
//! # Ok::<(), ayon_tools::settings::SyncError>(())
//! ```

// Clippy configuration - allow common patterns
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::too_many_arguments)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

pub mod cli;
pub mod config;
pub mod logging;
pub mod repo;
pub mod server;
pub mod settings;

// Re-export main types
pub use config::Config;
pub use repo::{GitRepo, SettingsStore};
pub use server::{Credentials, ServerClient, ServerError};
pub use settings::SyncError;
