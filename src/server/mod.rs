//! Configuration server access.
//!
//! # Architecture
//!
//! - **auth**: `Credentials` (server URL + static API key)
//! - **types**: server resources (`Bundle`, `DependencyPackage`, ...) and `ServerError`
//! - **client**: `ServerClient`, one blocking method per REST operation
//!
//! # Usage
//!
//! ```no_run
//! use ayon_tools::server::{Credentials, ServerClient};
//!
//! let client = ServerClient::new(Credentials::new("http://localhost:5000", "key"));
//! let bundle = client.get_production_bundle()?;
//! # Ok::<(), ayon_tools::server::ServerError>(())
//! ```

mod auth;
mod client;
mod types;

pub use auth::{
    API_KEY_ENV, API_KEY_HEADER, Credentials, DEFAULT_API_KEY, DEFAULT_SERVER_URL,
    SERVER_URL_ENV,
};
pub use client::{ServerClient, read_json_file};
pub use types::{
    AddonInfo, AnatomyPresetInfo, Bundle, DependencyPackage, NewBundle, ProjectInfo, ServerError,
    compare_versions, newest_installer_version,
};
