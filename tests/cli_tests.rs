//! End-to-end tests for CLI commands against the fake server.
//!
//! Each test points a `Config` at a fake server and a temporary settings
//! repository, then runs commands through `cli::run`.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use ayon_tools::cli::{self, Cli};
use ayon_tools::config::{Config, ServerProfile};
use ayon_tools::repo::SettingsStore;
use ayon_tools::settings::{AddonSettingsEntry, ProjectSettings};
use clap::Parser;
use common::{FakeServer, ServerState, TEST_API_KEY, key3};
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use std::fs;
use tempfile::TempDir;

fn config_for(server: &FakeServer, dir: &TempDir) -> Config {
    Config {
        server_url: server.url(),
        api_key: TEST_API_KEY.to_string(),
        settings_repo_root: dir.path().join("repo"),
        config_path: dir.path().join(".ayonrc"),
        ..Config::default()
    }
}

fn run(config: &Config, args: &[&str]) -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = vec!["ayon-tools"];
    argv.extend_from_slice(args);
    cli::run(Cli::try_parse_from(argv).unwrap(), config)
}

#[test]
fn test_add_and_list_studios() {
    let dir = TempDir::new().unwrap();
    let server = FakeServer::start(ServerState::empty());
    let config = config_for(&server, &dir);

    run(&config, &["add-studio", "Acme", "acme"]).unwrap();
    run(&config, &["list-studios"]).unwrap();

    let studio = config.store().get_studio_config("acme").unwrap().unwrap();
    assert_eq!(studio.name, "Acme");
    assert!(run(&config, &["add-studio", "Acme", "acme"]).is_err());
}

#[test]
fn test_add_studio_rejects_unknown_profile() {
    let dir = TempDir::new().unwrap();
    let server = FakeServer::start(ServerState::empty());
    let config = config_for(&server, &dir);

    assert!(run(&config, &["add-studio", "Acme", "acme", "--server", "nowhere"]).is_err());
    assert!(config.store().get_studio_config("acme").unwrap().is_none());
}

#[test]
fn test_pull_then_deploy_to_new_project() {
    let dir = TempDir::new().unwrap();
    let server = FakeServer::start(ServerState::studio());
    let config = config_for(&server, &dir);
    let store: SettingsStore = config.store();

    run(&config, &["add-studio", "Acme", "acme"]).unwrap();
    run(&config, &["pull-project", "acme", "demo"]).unwrap();

    // Store the pulled settings under a new project name and deploy it
    let mut settings = store.load_project_settings("acme", "demo").unwrap();
    settings.addons.get_mut("maya").unwrap().settings = json!({"units": "ft"});
    store.save_project_settings("acme", "Next Show", &settings).unwrap();

    run(&config, &["deploy", "acme", "Next Show"]).unwrap();

    let state = server.state();
    assert_eq!(state.projects["Next Show"]["code"], json!("Next_Show"));
    assert_eq!(state.anatomy["Next Show"], json!({"roots": {"work": "/mnt/demo"}}));
    assert_eq!(
        state.project_settings[&key3("Next Show", "maya", "2.0.0")],
        json!({"units": "ft"})
    );
}

#[test]
fn test_deploy_version_mismatch_fails() {
    let dir = TempDir::new().unwrap();
    let server = FakeServer::start(ServerState::studio());
    let config = config_for(&server, &dir);
    let store = config.store();
    store.add_new_studio("Acme", "acme").unwrap();

    let mut settings = ProjectSettings {
        anatomy: json!({}),
        addons: Default::default(),
    };
    settings.addons.insert(
        "core".to_string(),
        AddonSettingsEntry {
            version: "0.1.0".to_string(),
            settings: json!({}),
        },
    );
    store.save_project_settings("acme", "demo", &settings).unwrap();

    let err = run(&config, &["deploy", "acme", "demo"]).unwrap_err();
    assert!(err.to_string().contains("version is not equal to bundle version"));
}

#[test]
fn test_deploy_unknown_studio() {
    let dir = TempDir::new().unwrap();
    let server = FakeServer::start(ServerState::studio());
    let config = config_for(&server, &dir);
    config
        .store()
        .save_project_settings(
            "ghost",
            "demo",
            &ProjectSettings {
                anatomy: json!({}),
                addons: Default::default(),
            },
        )
        .unwrap();

    let err = run(&config, &["deploy", "ghost", "demo"]).unwrap_err();
    assert_eq!(err.to_string(), "Studio ghost not found in settings repository");
    assert!(server.writes().is_empty());
}

#[test]
fn test_dump_addon_studio_and_project() {
    let dir = TempDir::new().unwrap();
    let server = FakeServer::start(ServerState::studio());
    let config = config_for(&server, &dir);
    let store = config.store();
    run(&config, &["add-studio", "Acme", "acme"]).unwrap();

    run(&config, &["dump-addon", "acme", "maya"]).unwrap();
    run(&config, &["dump-addon", "acme", "maya", "demo"]).unwrap();

    let read = |path: std::path::PathBuf| -> Value { serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap() };
    assert_eq!(
        read(store.addon_settings_path("acme", "maya", None)),
        json!({"version": "2.0.0", "settings": {"units": "cm"}})
    );
    assert_eq!(
        read(store.addon_settings_path("acme", "maya", Some("demo"))),
        json!({"version": "2.0.0", "settings": {"units": "m"}})
    );
}

#[test]
fn test_dump_addon_not_in_bundle() {
    let dir = TempDir::new().unwrap();
    let server = FakeServer::start(ServerState::studio());
    let config = config_for(&server, &dir);
    run(&config, &["add-studio", "Acme", "acme"]).unwrap();

    let err = run(&config, &["dump-addon", "acme", "ocio"]).unwrap_err();
    assert_eq!(err.to_string(), "Addon ocio is not pinned by production bundle prod-1");
}

#[test]
fn test_studio_uses_its_server_profile() {
    let dir = TempDir::new().unwrap();
    let server = FakeServer::start(ServerState::studio());
    let mut config = config_for(&server, &dir);
    // Default server is unreachable; only the profile works
    config.server_url = "http://127.0.0.1:9".to_string();
    config.servers.insert(
        "prod".to_string(),
        ServerProfile {
            url: server.url(),
            api_key: TEST_API_KEY.to_string(),
        },
    );

    run(&config, &["add-studio", "Acme", "acme", "--server", "prod"]).unwrap();
    run(&config, &["list-projects", "acme"]).unwrap();
    assert_eq!(server.requests(), vec!["GET /api/projects".to_string()]);
}

#[test]
fn test_add_addon() {
    let dir = TempDir::new().unwrap();
    let server = FakeServer::start(ServerState::empty());
    let config = config_for(&server, &dir);

    run(&config, &["add-addon", "https://example.com/core-1.0.0.zip"]).unwrap();
    run(&config, &["add-addon", "https://example.com/core-1.0.0.zip"]).unwrap();
    assert_eq!(config.store().addon_urls().unwrap().len(), 1);
}

#[test]
fn test_dump_and_restore_server() {
    let dir = TempDir::new().unwrap();
    let source = FakeServer::start(ServerState::studio());
    let mut target_state = ServerState::empty();
    target_state.packages = ServerState::studio().packages;
    let target = FakeServer::start(target_state);
    let config = config_for(&source, &dir);
    let file = dir.path().join("dump.json");
    let file = file.to_str().unwrap();

    run(&config, &["dump-server", file]).unwrap();
    run(&config, &["restore-server", file, "--server", &target.url()]).unwrap();

    assert_eq!(target.state().production_bundle().unwrap()["name"], json!("prod-1"));
}

#[test]
fn test_deploy_project_without_usable_code() {
    let dir = TempDir::new().unwrap();
    let server = FakeServer::start(ServerState::studio());
    let config = config_for(&server, &dir);
    let store = config.store();
    store.add_new_studio("Acme", "acme").unwrap();
    store
        .save_project_settings(
            "acme",
            "---",
            &ProjectSettings {
                anatomy: json!({}),
                addons: Default::default(),
            },
        )
        .unwrap();

    let err = run(&config, &["deploy", "acme", "---"]).unwrap_err();
    assert!(err.to_string().contains("Project code must not be empty"));
    assert!(server.writes().is_empty());
}

#[test]
fn test_blank_addon_url_is_an_error() {
    let dir = TempDir::new().unwrap();
    let server = FakeServer::start(ServerState::empty());
    let config = config_for(&server, &dir);

    let err = run(&config, &["add-addon", "  "]).unwrap_err();
    assert_eq!(err.to_string(), "Invalid addon URL: \"\"");
    assert!(config.store().addon_urls().unwrap().is_empty());
}

#[test]
fn test_empty_studio_code_is_an_error() {
    let dir = TempDir::new().unwrap();
    let server = FakeServer::start(ServerState::studio());
    let config = config_for(&server, &dir);

    let err = run(&config, &["list-projects", ""]).unwrap_err();
    assert!(err.to_string().starts_with("Invalid studio code"));
    assert!(run(&config, &["add-studio", "Acme", ""]).is_err());
    assert!(server.requests().is_empty());
}

#[test]
fn test_empty_api_key_is_an_error() {
    let dir = TempDir::new().unwrap();
    let server = FakeServer::start(ServerState::studio());
    let config = config_for(&server, &dir);
    let file = dir.path().join("dump.json");
    let file = file.to_str().unwrap();

    let err = run(&config, &["dump-server", file, "--api-key", ""]).unwrap_err();
    assert!(err.to_string().contains("must not be empty"));

    let target = server.url();
    assert!(run(&config, &["clone-attributes", "--from", "default", "--to", &target, "--to-key", ""]).is_err());
    assert!(run(&config, &["clone-attributes", "--from", "default", "--from-key", "", "--to", &target]).is_err());
    assert!(server.requests().is_empty());
    assert!(!dir.path().join("dump.json").exists());
}
