//! In-process fake AYON server for integration tests.
//!
//! Runs an axum router on a background thread with its own tokio runtime,
//! so tests stay synchronous and drive it through the blocking client.

#![allow(dead_code)]
#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::JoinHandle;

use axum::{
    Json, Router,
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::Response,
    routing::get,
};
use serde_json::{Value, json};
use tokio::sync::oneshot;

use ayon_tools::server::{Credentials, ServerClient};

pub const TEST_API_KEY: &str = "test-key";

/// Mutable state behind the fake server.
#[derive(Debug, Clone)]
pub struct ServerState {
    pub api_key: String,
    pub bundles: Vec<Value>,
    pub packages: Vec<Value>,
    pub presets: BTreeMap<String, Value>,
    pub attributes: Value,
    pub projects: BTreeMap<String, Value>,
    pub anatomy: BTreeMap<String, Value>,
    pub addons: Vec<Value>,
    /// (addon, version) -> studio settings.
    pub studio_settings: BTreeMap<(String, String), Value>,
    /// (project, addon, version) -> project settings.
    pub project_settings: BTreeMap<(String, String, String), Value>,
    /// Addons whose settings writes answer 500.
    pub reject_settings_for: Vec<String>,
    /// "METHOD uri" of every authorized request.
    pub requests: Vec<String>,
}

impl ServerState {
    /// Empty server with the test API key.
    pub fn empty() -> Self {
        Self {
            api_key: TEST_API_KEY.to_string(),
            bundles: Vec::new(),
            packages: Vec::new(),
            presets: BTreeMap::new(),
            attributes: json!({}),
            projects: BTreeMap::new(),
            anatomy: BTreeMap::new(),
            addons: Vec::new(),
            studio_settings: BTreeMap::new(),
            project_settings: BTreeMap::new(),
            reject_settings_for: Vec::new(),
            requests: Vec::new(),
        }
    }

    /// Production server with a "prod-1" bundle pinning core 1.0.0 and
    /// maya 2.0.0 (ocio disabled), one "demo" project and one preset.
    pub fn studio() -> Self {
        let mut state = Self::empty();
        state.bundles.push(json!({
            "name": "prod-1",
            "addons": {"core": "1.0.0", "maya": "2.0.0", "ocio": null},
            "installerVersion": "1.0.4",
            "dependencyPackages": {"linux": "deps-linux.zip"},
            "isProduction": true,
            "isStaging": false,
            "isArchived": false,
            "isDev": false,
            "createdAt": "2024-01-01T00:00:00",
        }));
        state.bundles.push(json!({
            "name": "staging-1",
            "addons": {"core": "1.1.0"},
            "isStaging": true,
        }));
        state.packages = vec![
            json!({"filename": "deps-linux-1.0.4.zip", "platform": "linux", "installerVersion": "1.0.4"}),
            json!({"filename": "deps-windows-1.0.10.zip", "platform": "windows", "installerVersion": "1.0.10"}),
        ];
        state.presets.insert("_".to_string(), json!({"roots": {"work": "/mnt/work"}}));
        state.attributes = json!({"attributes": [{"name": "fps", "scope": ["project"]}]});
        state.addons = vec![
            json!({"name": "core", "versions": {"1.0.0": {}, "1.1.0": {}}}),
            json!({"name": "maya", "versions": {"2.0.0": {}}}),
        ];
        state.add_project("demo", "demo", json!({"roots": {"work": "/mnt/demo"}}));
        state.studio_settings.insert(key2("core", "1.0.0"), json!({"studio_name": "Acme"}));
        state.studio_settings.insert(key2("maya", "2.0.0"), json!({"units": "cm"}));
        state
            .project_settings
            .insert(key3("demo", "core", "1.0.0"), json!({"templates": {"work": "{root}/demo"}}));
        state
            .project_settings
            .insert(key3("demo", "maya", "2.0.0"), json!({"units": "m"}));
        state
    }

    pub fn add_project(&mut self, name: &str, code: &str, anatomy: Value) {
        self.projects
            .insert(name.to_string(), json!({"name": name, "code": code, "active": true}));
        self.anatomy.insert(name.to_string(), anatomy);
    }

    pub fn production_bundle(&self) -> Option<&Value> {
        self.bundles.iter().find(|b| b["isProduction"] == json!(true))
    }

    pub fn bundle(&self, name: &str) -> Option<&Value> {
        self.bundles.iter().find(|b| b["name"] == json!(name))
    }
}

pub fn key2(a: &str, b: &str) -> (String, String) {
    (a.to_string(), b.to_string())
}

pub fn key3(a: &str, b: &str, c: &str) -> (String, String, String) {
    (a.to_string(), b.to_string(), c.to_string())
}

type Shared = Arc<Mutex<ServerState>>;

/// Running fake server. Stops on drop.
pub struct FakeServer {
    addr: SocketAddr,
    state: Shared,
    shutdown_tx: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl FakeServer {
    pub fn start(state: ServerState) -> Self {
        let state = Arc::new(Mutex::new(state));
        let router = create_router(Arc::clone(&state));

        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.set_nonblocking(true).unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let thread = std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .unwrap();
            runtime.block_on(async move {
                let listener = tokio::net::TcpListener::from_std(listener).unwrap();
                axum::serve(listener, router)
                    .with_graceful_shutdown(async {
                        let _ = shutdown_rx.await;
                    })
                    .await
                    .unwrap();
            });
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
            thread: Some(thread),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn credentials(&self) -> Credentials {
        Credentials::new(&self.url(), TEST_API_KEY)
    }

    pub fn client(&self) -> ServerClient {
        ServerClient::new(self.credentials())
    }

    pub fn state(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap()
    }

    pub fn requests(&self) -> Vec<String> {
        self.state().requests.clone()
    }

    /// Requests other than GET.
    pub fn writes(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|r| !r.starts_with("GET "))
            .collect()
    }
}

impl Drop for FakeServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

fn create_router(state: Shared) -> Router {
    Router::new()
        .route("/api/anatomy/presets", get(list_presets))
        .route("/api/anatomy/presets/{name}", get(get_preset).put(put_preset))
        .route("/api/projects", get(list_projects))
        .route("/api/projects/{name}", get(get_project).put(put_project))
        .route("/api/projects/{name}/anatomy", get(get_anatomy).post(post_anatomy))
        .route("/api/bundles", get(list_bundles).post(post_bundle))
        .route("/api/desktop/dependencyPackages", get(list_packages))
        .route("/api/addons", get(list_addons))
        .route(
            "/api/addons/{addon}/{version}/settings",
            get(get_studio_settings).post(post_studio_settings),
        )
        .route(
            "/api/addons/{addon}/{version}/settings/{project}",
            get(get_project_settings).post(post_project_settings),
        )
        .route("/api/attributes", get(get_attributes).put(put_attributes))
        .layer(middleware::from_fn_with_state(Arc::clone(&state), check_api_key))
        .with_state(state)
}

async fn check_api_key(
    State(state): State<Shared>,
    request: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let given = request
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    {
        let mut state = state.lock().unwrap();
        if given.as_deref() != Some(state.api_key.as_str()) {
            return Err(StatusCode::UNAUTHORIZED);
        }
        state
            .requests
            .push(format!("{} {}", request.method(), request.uri()));
    }

    Ok(next.run(request).await)
}

async fn list_presets(State(state): State<Shared>) -> Json<Value> {
    let state = state.lock().unwrap();
    let presets: Vec<Value> = state
        .presets
        .keys()
        .map(|name| json!({"name": name, "primary": name == "_"}))
        .collect();
    Json(json!({"presets": presets}))
}

async fn get_preset(
    State(state): State<Shared>,
    Path(name): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let state = state.lock().unwrap();
    state.presets.get(&name).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn put_preset(
    State(state): State<Shared>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    state.lock().unwrap().presets.insert(name, body);
    StatusCode::NO_CONTENT
}

async fn list_projects(State(state): State<Shared>) -> Json<Value> {
    let state = state.lock().unwrap();
    let projects: Vec<Value> = state.projects.values().cloned().collect();
    Json(json!({"count": projects.len(), "projects": projects}))
}

async fn get_project(
    State(state): State<Shared>,
    Path(name): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let state = state.lock().unwrap();
    state.projects.get(&name).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn put_project(
    State(state): State<Shared>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    let mut state = state.lock().unwrap();
    if state.projects.contains_key(&name) {
        return StatusCode::CONFLICT;
    }
    let code = body["code"].as_str().unwrap_or_default().to_string();
    let anatomy = body.get("anatomy").cloned().unwrap_or_else(|| json!({}));
    state.add_project(&name, &code, anatomy);
    StatusCode::CREATED
}

async fn get_anatomy(
    State(state): State<Shared>,
    Path(name): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    let state = state.lock().unwrap();
    state.anatomy.get(&name).cloned().map(Json).ok_or(StatusCode::NOT_FOUND)
}

async fn post_anatomy(
    State(state): State<Shared>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    let mut state = state.lock().unwrap();
    if !state.projects.contains_key(&name) {
        return StatusCode::NOT_FOUND;
    }
    state.anatomy.insert(name, body);
    StatusCode::NO_CONTENT
}

async fn list_bundles(State(state): State<Shared>) -> Json<Value> {
    let state = state.lock().unwrap();
    Json(json!({"bundles": state.bundles}))
}

async fn post_bundle(State(state): State<Shared>, Json(body): Json<Value>) -> StatusCode {
    let mut state = state.lock().unwrap();
    if state.bundle(body["name"].as_str().unwrap_or_default()).is_some() {
        return StatusCode::CONFLICT;
    }
    if body["isProduction"] == json!(true) {
        for bundle in &mut state.bundles {
            bundle["isProduction"] = json!(false);
        }
    }
    state.bundles.push(body);
    StatusCode::CREATED
}

async fn list_packages(State(state): State<Shared>) -> Json<Value> {
    let state = state.lock().unwrap();
    Json(json!({"packages": state.packages}))
}

async fn list_addons(State(state): State<Shared>) -> Json<Value> {
    let state = state.lock().unwrap();
    Json(json!({"addons": state.addons}))
}

async fn get_studio_settings(
    State(state): State<Shared>,
    Path((addon, version)): Path<(String, String)>,
) -> Result<Json<Value>, StatusCode> {
    let state = state.lock().unwrap();
    state
        .studio_settings
        .get(&(addon, version))
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn post_studio_settings(
    State(state): State<Shared>,
    Path((addon, version)): Path<(String, String)>,
    Json(body): Json<Value>,
) -> StatusCode {
    let mut state = state.lock().unwrap();
    if state.reject_settings_for.contains(&addon) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    state.studio_settings.insert((addon, version), body);
    StatusCode::NO_CONTENT
}

async fn get_project_settings(
    State(state): State<Shared>,
    Path((addon, version, project)): Path<(String, String, String)>,
) -> Result<Json<Value>, StatusCode> {
    let state = state.lock().unwrap();
    state
        .project_settings
        .get(&(project, addon, version))
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn post_project_settings(
    State(state): State<Shared>,
    Path((addon, version, project)): Path<(String, String, String)>,
    Json(body): Json<Value>,
) -> StatusCode {
    let mut state = state.lock().unwrap();
    if state.reject_settings_for.contains(&addon) {
        return StatusCode::INTERNAL_SERVER_ERROR;
    }
    state.project_settings.insert((project, addon, version), body);
    StatusCode::NO_CONTENT
}

async fn get_attributes(State(state): State<Shared>) -> Json<Value> {
    let state = state.lock().unwrap();
    Json(state.attributes.clone())
}

async fn put_attributes(State(state): State<Shared>, Json(body): Json<Value>) -> StatusCode {
    state.lock().unwrap().attributes = body;
    StatusCode::NO_CONTENT
}
