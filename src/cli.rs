//! Command-line interface.
//!
//! Argument definitions (clap derive) and one handler per command.
//! Handlers print results to stdout; diagnostics go through `tracing`.

use crate::config::Config;
use crate::repo::{GitRepo, SettingsStore, StudioConfig};
use crate::server::{Credentials, ServerClient};
use crate::settings::{
    self, AddonSettingsEntry, ApplyReport, diff_values, get_project_all_settings,
    set_project_all_settings, slugify,
};
use clap::{Args, Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Result of a command handler.
pub type CliResult = Result<(), Box<dyn Error>>;

/// Command errors not covered by the library error types.
#[derive(Debug, Error)]
pub enum CliError {
    /// No `studio.json` for the studio code.
    #[error("Studio {0} not found in settings repository")]
    StudioNotFound(String),

    /// Addon is not pinned by the production bundle.
    #[error("Addon {addon} is not pinned by production bundle {bundle}")]
    AddonNotInBundle { addon: String, bundle: String },

    /// Server has no production bundle.
    #[error("Server {0} has no production bundle")]
    NoProductionBundle(String),

    /// Some writes failed; details were logged.
    #[error("{0} addon(s) failed, see log for details")]
    PartialFailure(usize),
}

/// Administrative toolkit for AYON configuration servers.
#[derive(Parser, Debug)]
#[command(name = "ayon-tools")]
#[command(version)]
#[command(about = "List, diff, clone, dump and restore AYON server configuration")]
pub struct Cli {
    /// Enable debug output.
    #[arg(long, global = true, overrides_with = "no_debug")]
    pub debug: bool,

    /// Disable debug output.
    #[arg(long = "no-debug", global = true, overrides_with = "debug")]
    pub no_debug: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Returns true if debug mode is enabled.
    #[must_use]
    pub fn debug_enabled(&self) -> bool {
        self.debug && !self.no_debug
    }
}

/// Single-server selection.
#[derive(Args, Debug, Clone, Default)]
pub struct ServerArgs {
    /// Server profile alias, "default", or URL.
    #[arg(long)]
    pub server: Option<String>,

    /// API key overriding the profile's key.
    #[arg(long)]
    pub api_key: Option<String>,
}

/// Source and target server selection.
#[derive(Args, Debug, Clone)]
pub struct CloneArgs {
    /// Source server profile alias or URL.
    #[arg(long)]
    pub from: String,

    /// API key for the source server.
    #[arg(long)]
    pub from_key: Option<String>,

    /// Target server profile alias or URL.
    #[arg(long)]
    pub to: String,

    /// API key for the target server.
    #[arg(long)]
    pub to_key: Option<String>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Push stored project settings to the studio's server.
    Deploy {
        studio_name: String,
        project_name: String,
        /// Addons to leave untouched (repeatable).
        #[arg(long = "skip")]
        skip: Vec<String>,
        #[command(flatten)]
        server: ServerArgs,
    },

    /// List projects on the studio's server.
    ListProjects {
        studio_name: String,
        #[command(flatten)]
        server: ServerArgs,
    },

    /// List studios in the settings repository.
    ListStudios,

    /// Show differences between stored and server project settings.
    Diff {
        studio_name: String,
        project_name: String,
        #[arg(long = "skip")]
        skip: Vec<String>,
        #[command(flatten)]
        server: ServerArgs,
    },

    /// Add an addon to the main addon list.
    AddAddon { addon_url: String },

    /// Store addon settings, replacing existing ones.
    DumpAddon {
        studio_name: String,
        addon_name: String,
        project_name: Option<String>,
        #[command(flatten)]
        server: ServerArgs,
    },

    /// Initialize the settings repository.
    Init,

    /// Register a studio in the settings repository.
    AddStudio {
        studio_name: String,
        studio_code: String,
        /// Server profile alias used for this studio.
        #[arg(long)]
        server: Option<String>,
    },

    /// Store a project's server settings in the settings repository.
    PullProject {
        studio_name: String,
        project_name: String,
        #[arg(long)]
        bundle: Option<String>,
        #[arg(long = "skip")]
        skip: Vec<String>,
        #[command(flatten)]
        server: ServerArgs,
    },

    /// Dump the server configuration into a JSON file.
    DumpServer {
        filename: PathBuf,
        #[command(flatten)]
        server: ServerArgs,
    },

    /// Restore the server configuration from a JSON file.
    RestoreServer {
        filename: PathBuf,
        #[command(flatten)]
        server: ServerArgs,
    },

    /// Copy a project's anatomy to another server.
    CloneProject {
        from_project: String,
        to_project: Option<String>,
        #[command(flatten)]
        servers: CloneArgs,
    },

    /// Copy a project's addon settings to another server.
    CloneAddons {
        from_project: String,
        to_project: Option<String>,
        /// Source bundle (production bundle when omitted).
        #[arg(long)]
        bundle: Option<String>,
        #[arg(long = "skip")]
        skip: Vec<String>,
        #[command(flatten)]
        servers: CloneArgs,
    },

    /// Copy an anatomy preset to another server.
    ClonePreset {
        from_preset: String,
        to_preset: Option<String>,
        #[command(flatten)]
        servers: CloneArgs,
    },

    /// Copy attribute definitions to another server.
    CloneAttributes {
        #[command(flatten)]
        servers: CloneArgs,
    },

    /// Recreate a bundle and its addon settings on another server.
    CloneBundle {
        /// Source bundle (production bundle when omitted).
        #[arg(long)]
        bundle: Option<String>,
        /// Name of the new bundle (source name when omitted).
        #[arg(long)]
        name: Option<String>,
        #[command(flatten)]
        servers: CloneArgs,
    },

    /// Show branches of the settings repository with commits and tags.
    History,
}

/// Runs a parsed command.
pub fn run(cli: Cli, config: &Config) -> CliResult {
    if cli.debug_enabled() {
        println!("Debug mode is enabled");
    }

    let store = config.store();
    match cli.command {
        Commands::Deploy {
            studio_name,
            project_name,
            skip,
            server,
        } => deploy(config, &store, &studio_name, &project_name, &skip, &server),
        Commands::ListProjects {
            studio_name,
            server,
        } => list_projects(config, &store, &studio_name, &server),
        Commands::ListStudios => list_studios(&store),
        Commands::Diff {
            studio_name,
            project_name,
            skip,
            server,
        } => show_difference(config, &store, &studio_name, &project_name, &skip, &server),
        Commands::AddAddon { addon_url } => add_addon(&store, &addon_url),
        Commands::DumpAddon {
            studio_name,
            addon_name,
            project_name,
            server,
        } => dump_addon(
            config,
            &store,
            &studio_name,
            &addon_name,
            project_name.as_deref(),
            &server,
        ),
        Commands::Init => init_repo(&store),
        Commands::AddStudio {
            studio_name,
            studio_code,
            server,
        } => add_studio(config, &store, &studio_name, &studio_code, server),
        Commands::PullProject {
            studio_name,
            project_name,
            bundle,
            skip,
            server,
        } => pull_project(
            config,
            &store,
            &studio_name,
            &project_name,
            bundle.as_deref(),
            &skip,
            &server,
        ),
        Commands::DumpServer { filename, server } => {
            let client = single_client(config, &server)?;
            let snapshot = settings::dump_server_settings(&client, &filename)?;
            println!(
                "Dumped bundle '{}' with {} addons and {} presets to {}",
                snapshot.bundle.name,
                snapshot.addons.len(),
                snapshot.studio_presets.len(),
                filename.display()
            );
            Ok(())
        }
        Commands::RestoreServer { filename, server } => {
            let client = single_client(config, &server)?;
            let report = settings::restore_server_settings(&client, &filename)?;
            println!(
                "Restored {} presets and {} addons to {}",
                report.presets.len(),
                report.restored.len(),
                client.server_url()
            );
            for (addon, err) in &report.failed {
                println!("  FAILED {}: {}", addon, err);
            }
            failures(report.failed.len())
        }
        Commands::CloneProject {
            from_project,
            to_project,
            servers,
        } => {
            let (source, target) = clone_clients(config, &servers)?;
            settings::clone_project(&source, &target, &from_project, to_project.as_deref())?;
            println!(
                "Cloned project {} -> {}",
                from_project,
                to_project.as_deref().unwrap_or(&from_project)
            );
            Ok(())
        }
        Commands::CloneAddons {
            from_project,
            to_project,
            bundle,
            skip,
            servers,
        } => {
            let (source, target) = clone_clients(config, &servers)?;
            let skip = skip_list(config, &skip);
            let report = settings::clone_addon_settings(
                &source,
                &target,
                &from_project,
                to_project.as_deref(),
                bundle.as_deref(),
                &skip,
            )?;
            print_apply_report(&report);
            failures(report.failed.len())
        }
        Commands::ClonePreset {
            from_preset,
            to_preset,
            servers,
        } => {
            let (source, target) = clone_clients(config, &servers)?;
            settings::clone_studio_anatomy_preset(&source, &target, &from_preset, to_preset.as_deref())?;
            println!(
                "Cloned anatomy preset {} -> {}",
                from_preset,
                to_preset.as_deref().unwrap_or(&from_preset)
            );
            Ok(())
        }
        Commands::CloneAttributes { servers } => {
            let (source, target) = clone_clients(config, &servers)?;
            settings::clone_attributes(&source, &target)?;
            println!("Cloned attributes {} -> {}", source.server_url(), target.server_url());
            Ok(())
        }
        Commands::CloneBundle {
            bundle,
            name,
            servers,
        } => {
            let (source, target) = clone_clients(config, &servers)?;
            let report = settings::clone_bundle(&source, &target, bundle.as_deref(), name.as_deref())?;
            println!(
                "Created bundle {} on {} ({} addon settings copied)",
                report.bundle_name,
                target.server_url(),
                report.copied.len()
            );
            for (addon, err) in &report.failed {
                println!("  FAILED {}: {}", addon, err);
            }
            failures(report.failed.len())
        }
        Commands::History => history(&store),
    }
}

// ----------------------------------------------------------------------
// Helpers
// ----------------------------------------------------------------------

fn single_client(config: &Config, server: &ServerArgs) -> Result<ServerClient, Box<dyn Error>> {
    let creds = config.resolve_server(server.server.as_deref(), server.api_key.as_deref())?;
    debug!("Using server {:?}", creds);
    Ok(ServerClient::new(creds))
}

fn clone_clients(config: &Config, servers: &CloneArgs) -> Result<(ServerClient, ServerClient), Box<dyn Error>> {
    let source = config.resolve_server(Some(&servers.from), servers.from_key.as_deref())?;
    let target = config.resolve_server(Some(&servers.to), servers.to_key.as_deref())?;
    debug!("Cloning from {:?} to {:?}", source, target);
    Ok((ServerClient::new(source), ServerClient::new(target)))
}

/// Loads a studio and builds a client for its server.
///
/// An explicit `--server` wins over the studio's own profile.
fn studio_client(
    config: &Config,
    store: &SettingsStore,
    studio_code: &str,
    server: &ServerArgs,
) -> Result<(StudioConfig, ServerClient), Box<dyn Error>> {
    let studio = store
        .get_studio_config(studio_code)?
        .ok_or_else(|| CliError::StudioNotFound(studio_code.to_string()))?;

    let alias = server.server.as_deref().or(studio.server.as_deref());
    let creds: Credentials = config.resolve_server(alias, server.api_key.as_deref())?;
    debug!("Studio {} uses server {:?}", studio.code, creds);
    Ok((studio, ServerClient::new(creds)))
}

fn skip_list(config: &Config, extra: &[String]) -> Vec<String> {
    let mut skip = config.skip_addons.clone();
    for s in extra {
        if !skip.contains(s) {
            skip.push(s.clone());
        }
    }
    skip
}

/// Commits pending store changes if the store is a git repository.
///
/// Git failures are logged, not returned.
fn commit_store(store: &SettingsStore, message: &str) {
    let repo = GitRepo::new(store.root().to_path_buf());
    if !repo.is_repository() {
        debug!("{} is not a git repository, skipping commit", store.root().display());
        return;
    }
    match repo.has_changes() {
        Ok(true) => {
            if let Err(e) = repo.create_commit(message) {
                warn!("Commit failed: {}", e);
            }
        }
        Ok(false) => debug!("Nothing to commit"),
        Err(e) => warn!("Could not read repository status: {}", e),
    }
}

fn failures(count: usize) -> CliResult {
    if count == 0 {
        Ok(())
    } else {
        Err(Box::new(CliError::PartialFailure(count)))
    }
}

fn print_apply_report(report: &ApplyReport) {
    println!("Applied settings for {} addon(s)", report.applied.len());
    for addon in &report.skipped {
        println!("  skipped {}", addon);
    }
    for addon in &report.missing {
        println!("  no settings supplied for {}", addon);
    }
    for (addon, err) in &report.failed {
        println!("  FAILED {}: {}", addon, err);
    }
}

// ----------------------------------------------------------------------
// Handlers
// ----------------------------------------------------------------------

fn deploy(
    config: &Config,
    store: &SettingsStore,
    studio_name: &str,
    project_name: &str,
    skip: &[String],
    server: &ServerArgs,
) -> CliResult {
    println!("Start deploy project {}/{}", studio_name, project_name);

    let settings = store.load_project_settings(studio_name, project_name)?;
    let (_studio, client) = studio_client(config, store, studio_name, server)?;

    if client.get_project(project_name)?.is_none() {
        let code = slugify(project_name);
        info!("Project {} missing on {}, creating", project_name, client.server_url());
        client.create_project(project_name, &code, Some(&settings.anatomy))?;
    }

    let report = set_project_all_settings(&client, project_name, &settings, &skip_list(config, skip))?;
    print_apply_report(&report);
    failures(report.failed.len())
}

fn list_projects(config: &Config, store: &SettingsStore, studio_name: &str, server: &ServerArgs) -> CliResult {
    let (studio, client) = studio_client(config, store, studio_name, server)?;
    let stored = store.list_projects(&studio.code)?;
    let projects = client.list_projects()?;

    println!("Projects of {} ({}):", studio.name, client.server_url());
    for project in &projects {
        let marker = if stored.contains(&project.name) { " [stored]" } else { "" };
        let state = if project.active { "" } else { " (inactive)" };
        println!("  {} [{}]{}{}", project.name, project.code, state, marker);
    }
    for name in stored.iter().filter(|n| !projects.iter().any(|p| &p.name == *n)) {
        println!("  {} [local only]", name);
    }
    Ok(())
}

fn list_studios(store: &SettingsStore) -> CliResult {
    let studios = store.list_studios()?;
    if studios.is_empty() {
        println!("No studios in {}", store.root().display());
        return Ok(());
    }
    for studio in studios {
        match studio.server {
            Some(server) => println!("{} ({}) -> {}", studio.name, studio.code, server),
            None => println!("{} ({})", studio.name, studio.code),
        }
    }
    Ok(())
}

fn show_difference(
    config: &Config,
    store: &SettingsStore,
    studio_name: &str,
    project_name: &str,
    skip: &[String],
    server: &ServerArgs,
) -> CliResult {
    let local = store.load_project_settings(studio_name, project_name)?;
    let (_studio, client) = studio_client(config, store, studio_name, server)?;
    let remote = get_project_all_settings(&client, project_name, None, &skip_list(config, skip))?;

    let changes = diff_values(&serde_json::to_value(&local)?, &serde_json::to_value(&remote)?);
    println!(
        "Diff local and server for {}/{} ({} change(s))",
        studio_name,
        project_name,
        changes.len()
    );
    for change in &changes {
        println!("{}", change);
    }
    Ok(())
}

fn add_addon(store: &SettingsStore, addon_url: &str) -> CliResult {
    if store.add_addon_url(addon_url)? {
        println!("Add addon to main addon list: {}", addon_url);
        commit_store(store, &format!("Add addon {}", addon_url));
    } else {
        println!("Addon already listed: {}", addon_url);
    }
    Ok(())
}

fn dump_addon(
    config: &Config,
    store: &SettingsStore,
    studio_name: &str,
    addon_name: &str,
    project_name: Option<&str>,
    server: &ServerArgs,
) -> CliResult {
    let scope = project_name.unwrap_or("[studio]");
    println!(
        "Dump addon settings to storage and replace existing: {}/{}/{}",
        studio_name, scope, addon_name
    );

    let (studio, client) = studio_client(config, store, studio_name, server)?;
    let bundle = client
        .get_production_bundle()?
        .ok_or_else(|| CliError::NoProductionBundle(client.server_url().to_string()))?;
    let version = bundle
        .addon_version(addon_name)
        .ok_or_else(|| CliError::AddonNotInBundle {
            addon: addon_name.to_string(),
            bundle: bundle.name.clone(),
        })?
        .to_string();

    let settings = match project_name {
        Some(project) => client.get_project_addon_settings(project, addon_name, &version)?,
        None => client.get_addon_settings(addon_name, &version)?,
    };
    let entry = AddonSettingsEntry { version, settings };

    let path = store.save_addon_settings(&studio.code, addon_name, project_name, &serde_json::to_value(&entry)?)?;
    println!("Saved {}", path.display());
    commit_store(
        store,
        &format!("Dump {}/{}/{} settings {}", studio.code, scope, addon_name, entry.version),
    );
    Ok(())
}

fn init_repo(store: &SettingsStore) -> CliResult {
    let repo = GitRepo::new(store.root().to_path_buf());
    if repo.init()? {
        println!("New repository initialized at {}", store.root().display());
    } else {
        println!("{} already exists", store.root().display());
    }
    Ok(())
}

fn add_studio(
    config: &Config,
    store: &SettingsStore,
    studio_name: &str,
    studio_code: &str,
    server: Option<String>,
) -> CliResult {
    if let Some(alias) = server.as_deref() {
        // Fail early on typos instead of at the first deploy.
        config.resolve_server(Some(alias), None)?;
    }

    let mut studio = store.add_new_studio(studio_name, studio_code)?;
    if server.is_some() {
        studio.server = server;
        store.set_studio_config(studio_code, &studio)?;
    }
    println!("Added studio {} ({})", studio.name, studio.code);
    commit_store(store, &format!("Add studio {}", studio_code));
    Ok(())
}

fn pull_project(
    config: &Config,
    store: &SettingsStore,
    studio_name: &str,
    project_name: &str,
    bundle: Option<&str>,
    skip: &[String],
    server: &ServerArgs,
) -> CliResult {
    let (studio, client) = studio_client(config, store, studio_name, server)?;
    let settings = get_project_all_settings(&client, project_name, bundle, &skip_list(config, skip))?;
    let path = store.save_project_settings(&studio.code, project_name, &settings)?;
    println!("Saved {} addon settings to {}", settings.addons.len(), path.display());
    commit_store(store, &format!("Pull {}/{} settings", studio.code, project_name));
    Ok(())
}

fn history(store: &SettingsStore) -> CliResult {
    let repo = GitRepo::new(store.root().to_path_buf());
    for branch in repo.iterate_branches()? {
        println!("Branch: {}", branch.branch);
        for commit in branch.commits {
            match commit.tag {
                Some(tag) => println!("  Commit: {}, Tag: {}", commit.hash, tag),
                None => println!("  Commit: {}", commit.hash),
            }
        }
    }
    Ok(())
}
