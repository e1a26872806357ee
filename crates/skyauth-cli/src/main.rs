//! skyauth command-line driver.

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;
mod settings;

use settings::Settings;

#[derive(Parser)]
#[command(name = "skyauth")]
#[command(about = "OAuth client for AT Protocol authorization servers", long_about = None)]
struct Cli {
    #[command(flatten)]
    settings: Settings,

    /// Load environment variables from this file instead of `.env`
    #[arg(long, global = true, value_name = "PATH")]
    env_file: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the authorization code flow and print the issued tokens
    Authorize {
        /// Handle or DID to pre-fill on the consent page
        #[arg(long)]
        login_hint: Option<String>,
        /// Print the authorization URL without opening a browser
        #[arg(long)]
        no_browser: bool,
    },
    /// Exchange a refresh token for a new token pair
    Refresh {
        /// The refresh token to redeem
        #[arg(long, env = "SKYAUTH_REFRESH_TOKEN")]
        refresh_token: String,
        /// Status that marks the refresh token as rejected after the retry
        #[arg(long, default_value_t = 401)]
        fail_status: u16,
    },
    /// Fetch and print the authorization server metadata
    Discover,
    /// Print the client metadata document to host at the client id URL
    Metadata {
        /// Human-readable application name
        #[arg(long)]
        client_name: Option<String>,
    },
    /// Generate a PKCE verifier and challenge
    Pkce,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before clap parses so `env` fallbacks see the file's values.
    load_env_file();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Authorize {
            login_hint,
            no_browser,
        } => commands::authorize::run(&cli.settings, login_hint.as_deref(), !no_browser).await,
        Commands::Refresh {
            refresh_token,
            fail_status,
        } => commands::refresh::run(&cli.settings, &refresh_token, fail_status).await,
        Commands::Discover => commands::discover::run(&cli.settings).await,
        Commands::Metadata { client_name } => commands::metadata::run(&cli.settings, client_name),
        Commands::Pkce => commands::pkce::run(),
    }
}

/// Loads environment variables from a `.env` file.
///
/// Checks for `--env-file <path>` in argv first; falls back to `.env` in the
/// current directory. Silently ignores a missing `.env`.
fn load_env_file() {
    let args: Vec<String> = std::env::args().collect();
    let custom_path = args
        .windows(2)
        .find(|w| w[0] == "--env-file")
        .map(|w| w[1].clone())
        .or_else(|| {
            args.iter()
                .find_map(|a| a.strip_prefix("--env-file=").map(str::to_string))
        });

    if let Some(path) = custom_path {
        if let Err(e) = dotenvy::from_filename(&path) {
            eprintln!("Warning: failed to load env file {path}: {e}");
        }
    } else {
        let _ = dotenvy::dotenv();
    }
}
