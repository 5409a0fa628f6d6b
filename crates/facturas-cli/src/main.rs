//! Command-line front end for the facturas back office.

mod commands;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use facturas::config::{apply_env_overrides, load_config, validate_config};
use facturas::{init_logging, ClientConfig, LogFormat};

use commands::{config, contract, status, upload};

/// Upload invoice PDFs to the facturas backend and follow their processing
#[derive(Parser)]
#[command(name = "facturas")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to config file [default: <config dir>/facturas/config.json]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Backend base URL, overrides config file and environment
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload an invoice PDF and wait for it to be processed
    Upload(upload::UploadArgs),

    /// Show the processing status of an upload
    Status(status::StatusArgs),

    /// Attach or download contract PDFs
    Contract(contract::ContractArgs),

    /// Print the effective configuration
    Config,
}

/// `<config dir>/facturas/config.json`, when it exists.
fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir()
        .map(|dir| dir.join("facturas").join("config.json"))
        .filter(|path| path.is_file())
}

/// Config file (or defaults), then `FACTURAS_*` variables, then `--api-url`.
fn resolve_config(path: Option<&Path>, api_url: Option<&str>) -> anyhow::Result<ClientConfig> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };

    apply_env_overrides(&mut config)?;

    if let Some(url) = api_url {
        config.api_url = url.to_string();
    }

    validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let format = if cli.json_logs {
        LogFormat::Json
    } else {
        LogFormat::Text
    };
    init_logging(format, cli.verbose)?;

    let config_path = cli.config.clone().or_else(default_config_path);
    let config = resolve_config(config_path.as_deref(), cli.api_url.as_deref())?;

    match cli.command {
        Commands::Upload(args) => upload::run(args, &config).await,
        Commands::Status(args) => status::run(args, &config).await,
        Commands::Contract(args) => contract::run(args, &config).await,
        Commands::Config => config::run(&config),
    }
}
