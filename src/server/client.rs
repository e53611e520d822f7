//! Blocking REST client for the configuration server.
//!
//! One method per server operation. Every request carries the API key
//! header and every non-success status is turned into an error.

use super::auth::{API_KEY_HEADER, Credentials};
use super::types::{
    AddonInfo, AddonList, AnatomyPresetList, Bundle, BundleList, DependencyPackage,
    DependencyPackageList, NewBundle, ProjectInfo, ProjectList, ServerError,
};
use reqwest::{Method, Url};
use reqwest::blocking::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Request timeout.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Settings variant used for every addon settings call.
const SETTINGS_VARIANT: &str = "production";

/// Maximum number of error body bytes kept in a status error.
const MAX_ERROR_BODY: usize = 2000;

/// Base used to percent-encode API paths.
const PATH_BASE: &str = "http://localhost/";

/// Client for one server instance.
pub struct ServerClient {
    /// HTTP client.
    client: Client,
    /// Server URL and API key.
    credentials: Credentials,
}

impl ServerClient {
    /// Creates a client for the given server.
    #[must_use]
    pub fn new(credentials: Credentials) -> Self {
        let client = Client::builder()
            .user_agent(concat!("ayon-tools/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            client,
            credentials,
        }
    }

    /// Returns the credentials this client uses.
    #[must_use]
    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    /// Returns the server URL.
    #[must_use]
    pub fn server_url(&self) -> &str {
        self.credentials.server_url()
    }

    // ------------------------------------------------------------------
    // Anatomy presets
    // ------------------------------------------------------------------

    /// Lists the names of all anatomy presets.
    pub fn get_studio_presets_names(&self) -> Result<Vec<String>, ServerError> {
        let list: AnatomyPresetList = self.get_json("/api/anatomy/presets")?;
        Ok(list.presets.into_iter().map(|p| p.name).collect())
    }

    /// Fetches one anatomy preset.
    pub fn get_studio_preset(&self, preset_name: &str) -> Result<Value, ServerError> {
        require("Preset name", preset_name)?;
        self.get_json(&api_path(&["api", "anatomy", "presets", preset_name])?)
    }

    /// Creates or replaces an anatomy preset.
    pub fn upload_studio_preset(&self, preset_name: &str, preset: &Value) -> Result<(), ServerError> {
        require("Preset name", preset_name)?;
        self.send_json(
            Method::PUT,
            &api_path(&["api", "anatomy", "presets", preset_name])?,
            preset,
        )
    }

    /// Uploads an anatomy preset read from a JSON file.
    pub fn upload_studio_preset_file(&self, preset_name: &str, path: &Path) -> Result<(), ServerError> {
        let preset = read_json_file(path)?;
        self.upload_studio_preset(preset_name, &preset)
    }

    // ------------------------------------------------------------------
    // Project anatomy
    // ------------------------------------------------------------------

    /// Fetches the anatomy of a project.
    pub fn get_project_anatomy(&self, project_name: &str) -> Result<Value, ServerError> {
        require("Project name", project_name)?;
        self.get_json(&api_path(&["api", "projects", project_name, "anatomy"])?)
    }

    /// Replaces the anatomy of a project. The anatomy must be a JSON object.
    pub fn update_project_anatomy(&self, project_name: &str, anatomy: &Value) -> Result<(), ServerError> {
        require("Project name", project_name)?;
        if !anatomy.is_object() {
            return Err(ServerError::InvalidPayload(format!(
                "anatomy for project '{}' must be a JSON object",
                project_name
            )));
        }
        self.send_json(
            Method::POST,
            &api_path(&["api", "projects", project_name, "anatomy"])?,
            anatomy,
        )
    }

    /// Replaces the anatomy of a project from a JSON file.
    pub fn update_project_anatomy_file(&self, project_name: &str, path: &Path) -> Result<(), ServerError> {
        let anatomy = read_json_file(path)?;
        self.update_project_anatomy(project_name, &anatomy)
    }

    // ------------------------------------------------------------------
    // Bundles
    // ------------------------------------------------------------------

    /// Lists bundles, archived or not.
    pub fn get_bundles(&self, archived: bool) -> Result<Vec<Bundle>, ServerError> {
        let list: BundleList = self.get_json(&format!("/api/bundles?archived={}", archived))?;
        Ok(list.bundles)
    }

    /// Finds a non-archived bundle by name.
    pub fn get_bundle(&self, bundle_name: &str) -> Result<Option<Bundle>, ServerError> {
        Ok(self
            .get_bundles(false)?
            .into_iter()
            .find(|b| b.name == bundle_name))
    }

    /// Returns the current production bundle, if any.
    pub fn get_production_bundle(&self) -> Result<Option<Bundle>, ServerError> {
        Ok(self.get_bundles(false)?.into_iter().find(|b| b.is_production))
    }

    /// Lists dependency packages.
    pub fn get_dep_packages(&self) -> Result<Vec<DependencyPackage>, ServerError> {
        let list: DependencyPackageList = self.get_json("/api/desktop/dependencyPackages")?;
        Ok(list.packages)
    }

    /// Creates a bundle. All known dependency packages are attached.
    pub fn create_bundle(&self, bundle: &NewBundle) -> Result<(), ServerError> {
        require("Bundle name", &bundle.name)?;
        let packages = self.get_dep_packages()?;
        let body = bundle.to_body(&packages)?;
        info!(
            "[SERVER] Creating bundle '{}' (production={}, installer={})",
            bundle.name, bundle.production, body["installerVersion"]
        );
        self.send_json(Method::POST, "/api/bundles", &body)
    }

    // ------------------------------------------------------------------
    // Addon settings
    // ------------------------------------------------------------------

    /// Fetches studio-level settings of an addon version.
    pub fn get_addon_settings(&self, addon_name: &str, version: &str) -> Result<Value, ServerError> {
        self.get_json(&studio_settings_path(addon_name, version)?)
    }

    /// Writes studio-level settings of an addon version.
    pub fn set_addon_settings(
        &self,
        addon_name: &str,
        version: &str,
        settings: &Value,
    ) -> Result<(), ServerError> {
        self.send_json(Method::POST, &studio_settings_path(addon_name, version)?, settings)
    }

    /// Fetches project-level settings of an addon version.
    pub fn get_project_addon_settings(
        &self,
        project_name: &str,
        addon_name: &str,
        version: &str,
    ) -> Result<Value, ServerError> {
        self.get_json(&project_settings_path(project_name, addon_name, version)?)
    }

    /// Writes project-level settings of an addon version.
    pub fn set_project_addon_settings(
        &self,
        project_name: &str,
        addon_name: &str,
        version: &str,
        settings: &Value,
    ) -> Result<(), ServerError> {
        self.send_json(
            Method::POST,
            &project_settings_path(project_name, addon_name, version)?,
            settings,
        )
    }

    /// Lists installed addons and their versions.
    pub fn list_addons(&self) -> Result<Vec<AddonInfo>, ServerError> {
        let list: AddonList = self.get_json("/api/addons")?;
        Ok(list.addons)
    }

    // ------------------------------------------------------------------
    // Attributes
    // ------------------------------------------------------------------

    /// Fetches the attribute definitions document.
    pub fn get_attributes(&self) -> Result<Value, ServerError> {
        self.get_json("/api/attributes")
    }

    /// Replaces the attribute definitions document.
    pub fn set_attributes(&self, attributes: &Value) -> Result<(), ServerError> {
        self.send_json(Method::PUT, "/api/attributes", attributes)
    }

    // ------------------------------------------------------------------
    // Projects
    // ------------------------------------------------------------------

    /// Lists projects.
    pub fn list_projects(&self) -> Result<Vec<ProjectInfo>, ServerError> {
        let list: ProjectList = self.get_json("/api/projects")?;
        Ok(list.projects)
    }

    /// Fetches a project, `None` if it does not exist.
    pub fn get_project(&self, project_name: &str) -> Result<Option<ProjectInfo>, ServerError> {
        require("Project name", project_name)?;
        match self.get_json(&api_path(&["api", "projects", project_name])?) {
            Ok(project) => Ok(Some(project)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Creates a project with the given code and initial anatomy.
    pub fn create_project(
        &self,
        project_name: &str,
        project_code: &str,
        anatomy: Option<&Value>,
    ) -> Result<(), ServerError> {
        require("Project name", project_name)?;
        require("Project code", project_code)?;

        let mut body = serde_json::json!({
            "code": project_code,
            "library": false,
        });
        if let Some(anatomy) = anatomy {
            body["anatomy"] = anatomy.clone();
        }

        info!("[SERVER] Creating project '{}' ({})", project_name, project_code);
        self.send_json(Method::PUT, &api_path(&["api", "projects", project_name])?, &body)
    }

    // ------------------------------------------------------------------
    // Transport
    // ------------------------------------------------------------------

    /// Issues a GET and parses the JSON body.
    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ServerError> {
        let url = self.credentials.url(path);
        debug!("[SERVER] GET {}", url);
        let start = Instant::now();

        let response = self
            .client
            .get(&url)
            .header(API_KEY_HEADER, self.credentials.api_key())
            .send()
            .map_err(|e| {
                warn!("[SERVER] HTTP request failed: {}", e);
                ServerError::Http(e)
            })?;

        let response = check_status(response, &url)?;
        debug!("[SERVER] Response from {} in {:?}", url, start.elapsed());

        let text = response.text()?;
        serde_json::from_str(&text).map_err(|e| {
            warn!("[SERVER] Failed to parse JSON from {}: {}", url, e);
            ServerError::Json(e)
        })
    }

    /// Sends a JSON body with the given method, ignoring the response body.
    fn send_json(&self, method: Method, path: &str, body: &Value) -> Result<(), ServerError> {
        let url = self.credentials.url(path);
        debug!("[SERVER] {} {}", method, url);
        let start = Instant::now();

        let response = self
            .client
            .request(method, &url)
            .header(API_KEY_HEADER, self.credentials.api_key())
            .json(body)
            .send()
            .map_err(|e| {
                warn!("[SERVER] HTTP request failed: {}", e);
                ServerError::Http(e)
            })?;

        check_status(response, &url)?;
        debug!("[SERVER] Response from {} in {:?}", url, start.elapsed());
        Ok(())
    }
}

/// Turns a non-success response into a status error.
fn check_status(response: Response, url: &str) -> Result<Response, ServerError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let mut body = response.text().unwrap_or_default();
    if body.len() > MAX_ERROR_BODY {
        let mut cut = MAX_ERROR_BODY;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        body.truncate(cut);
    }
    warn!("[SERVER] {} returned {}", url, status);

    Err(ServerError::Status {
        status,
        url: url.to_string(),
        body,
    })
}

/// Rejects an empty or blank name taken from user input or a file.
fn require(what: &str, value: &str) -> Result<(), ServerError> {
    if value.trim().is_empty() {
        return Err(ServerError::InvalidPayload(format!("{} must not be empty", what)));
    }
    Ok(())
}

/// Joins path segments into an absolute API path, percent-encoding each one.
fn api_path(segments: &[&str]) -> Result<String, ServerError> {
    let mut url = Url::parse(PATH_BASE).map_err(|e| ServerError::InvalidPayload(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| ServerError::InvalidPayload(format!("{} cannot hold a path", PATH_BASE)))?
        .pop_if_empty()
        .extend(segments);
    Ok(url.path().to_string())
}

fn studio_settings_path(addon_name: &str, version: &str) -> Result<String, ServerError> {
    require("Addon name", addon_name)?;
    require("Addon version", version)?;
    let path = api_path(&["api", "addons", addon_name, version, "settings"])?;
    Ok(format!("{}?variant={}", path, SETTINGS_VARIANT))
}

fn project_settings_path(project_name: &str, addon_name: &str, version: &str) -> Result<String, ServerError> {
    require("Project name", project_name)?;
    require("Addon name", addon_name)?;
    require("Addon version", version)?;
    let path = api_path(&["api", "addons", addon_name, version, "settings", project_name])?;
    Ok(format!("{}?variant={}", path, SETTINGS_VARIANT))
}

/// Reads a JSON document from disk.
pub fn read_json_file(path: &Path) -> Result<Value, ServerError> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}
