//! ayon-tools - Main entry point.
//!
//! Usage: ayon-tools [--debug|--no-debug] <COMMAND> [ARGS]
//!
//! Server URL and API key come from ~/.ayonrc, overridden by
//! AYON_SERVER_URL / AYON_API_KEY. Run `ayon-tools --help` for commands.

use clap::Parser;

use ayon_tools::cli::{self, Cli};
use ayon_tools::config::Config;
use ayon_tools::logging;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = Config::load()?;

    // Logging failures must not block the command
    if let Err(e) = logging::init(&config.log_config, cli.debug_enabled()) {
        eprintln!("Warning: Failed to initialize logging: {}", e);
    }

    tracing::debug!("Using config {}", config.config_path.display());

    if let Err(e) = cli::run(cli, &config) {
        tracing::error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
