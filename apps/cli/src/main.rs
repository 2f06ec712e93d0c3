mod adapter;
mod commands;
mod config;

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use titanic_client::Client;

use config::CliConfig;

/// Upload video clips to the Titanic ingestion backend.
#[derive(Parser, Debug)]
#[command(name = "titanic", author, version, about, long_about = None)]
struct Cli {
    /// Backend URL, overriding config file and environment
    #[arg(long, global = true)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Upload one or more video files
    Upload {
        /// Files to upload; non-video files are skipped
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Destination folder for every file (server default otherwise)
        #[arg(short, long)]
        folder: Option<String>,

        /// Ask the server not to re-encode the files
        #[arg(long)]
        no_compress: bool,
    },

    /// List destination folders
    Folders,

    /// Show server storage usage
    Space,

    /// Check that the backend is reachable
    Health,

    /// Store session tokens in the config file
    Login {
        /// Long-lived refresh token
        #[arg(long)]
        refresh_token: String,

        /// Web API key used to exchange the refresh token
        #[arg(long)]
        api_key: String,

        /// App attestation token
        #[arg(long, default_value = "")]
        app_check_token: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,titanic=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let base_url = cli.base_url;

    match cli.command {
        Command::Upload {
            files,
            folder,
            no_compress,
        } => {
            let opts = commands::UploadOptions {
                files,
                folder,
                compress: !no_compress,
            };
            if !commands::upload(connect(base_url)?, opts).await? {
                return Ok(ExitCode::FAILURE);
            }
        }
        Command::Folders => commands::folders(&*connect(base_url)?).await?,
        Command::Space => commands::space(&*connect(base_url)?).await?,
        Command::Health => commands::health(&*connect(base_url)?).await?,
        Command::Login {
            refresh_token,
            api_key,
            app_check_token,
        } => {
            // Only the file is rewritten; environment overrides are not persisted.
            let mut stored = CliConfig::load_file()?;
            stored.refresh_token = refresh_token;
            stored.api_key = api_key;
            stored.app_check_token = app_check_token;
            stored.id_token.clear();
            if let Some(url) = base_url {
                stored.base_url = url;
            }
            stored.save()?;
            println!("session saved");
        }
    }

    Ok(ExitCode::SUCCESS)
}

/// Builds a client from config, environment and the `--base-url` flag.
fn connect(base_url: Option<String>) -> anyhow::Result<Arc<Client>> {
    let mut cfg = CliConfig::load()?;
    if let Some(url) = base_url {
        cfg.base_url = url;
    }
    tracing::debug!(base_url = %cfg.base_url, "configuration loaded");
    Ok(Arc::new(Client::new(&cfg.base_url, cfg.auth_provider())?))
}
