//! Server credentials.
//!
//! Every `ServerClient` owns its own `Credentials`, so two servers can be
//! addressed side by side during clone operations.

use std::env;

/// Default server URL for a local development server.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:5000";

/// Default API key of a local development server.
pub const DEFAULT_API_KEY: &str = "veryinsecurapikey";

/// Environment variable holding the server URL.
pub const SERVER_URL_ENV: &str = "AYON_SERVER_URL";

/// Environment variable holding the API key.
pub const API_KEY_ENV: &str = "AYON_API_KEY";

/// Header carrying the API key on every request.
pub const API_KEY_HEADER: &str = "x-api-key";

/// Server URL and static API key.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    server_url: String,
    api_key: String,
}

impl Credentials {
    /// Creates credentials, trimming any trailing `/` from the URL.
    #[must_use]
    pub fn new(server_url: &str, api_key: &str) -> Self {
        let server_url = server_url.trim().trim_end_matches('/');
        assert!(!server_url.is_empty(), "Server URL must not be empty");
        assert!(!api_key.is_empty(), "API key must not be empty");

        Self {
            server_url: server_url.to_string(),
            api_key: api_key.to_string(),
        }
    }

    /// Reads credentials from `AYON_SERVER_URL` / `AYON_API_KEY`.
    ///
    /// Missing variables fall back to the local development defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let url = env::var(SERVER_URL_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string());
        let key = env::var(API_KEY_ENV)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| DEFAULT_API_KEY.to_string());
        Self::new(&url, &key)
    }

    /// Returns the server URL without trailing slash.
    #[must_use]
    pub fn server_url(&self) -> &str {
        &self.server_url
    }

    /// Returns the API key.
    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Builds an absolute URL for an API path such as `/api/bundles`.
    #[must_use]
    pub fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.server_url, path)
        } else {
            format!("{}/{}", self.server_url, path)
        }
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self::new(DEFAULT_SERVER_URL, DEFAULT_API_KEY)
    }
}

// The API key never ends up in logs.
impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("server_url", &self.server_url)
            .field("api_key", &"***")
            .finish()
    }
}
