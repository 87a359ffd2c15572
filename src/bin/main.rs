//! Quarry Gateway CLI - serve action invocations over stdio
//!
//! Usage:
//!   quarry-gateway serve [--config <quarry.toml>] [--workgroup <name>]
//!   quarry-gateway check-config [--config <quarry.toml>]
//!
//! `serve` reads one action invocation per line (NDJSON) on stdin and
//! writes one response envelope per line on stdout; logs go to stderr.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use quarry_gateway::config::Settings;
use quarry_gateway::gateway::{ActionInvocation, ActionResponse, Gateway};
use quarry_gateway::warehouse::DataApiClient;
use quarry_gateway::{AclResolver, QueryExecutor};

#[derive(Parser)]
#[command(name = "quarry-gateway")]
#[command(about = "Query execution and access-control gateway for a warehouse query agent")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve action invocations: NDJSON in on stdin, NDJSON out on stdout
    Serve {
        /// Path to the config file (defaults to ./quarry.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Warehouse workgroup (overrides config)
        #[arg(short, long)]
        workgroup: Option<String>,
    },

    /// Validate the configuration and exit
    CheckConfig {
        /// Path to the config file (defaults to ./quarry.toml)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn load_settings(config: Option<&PathBuf>) -> Result<Settings, String> {
    match config {
        Some(path) => Settings::from_file(path).map_err(|e| e.to_string()),
        None => Settings::load().map_err(|e| e.to_string()),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Serve { config, workgroup } => serve(config, workgroup).await,
        Commands::CheckConfig { config } => check_config(config),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("{message}");
            ExitCode::FAILURE
        }
    }
}

fn check_config(config: Option<PathBuf>) -> Result<(), String> {
    let settings = load_settings(config.as_ref())?;
    let workgroup = settings.resolved_workgroup().map_err(|e| e.to_string())?;
    info!(%workgroup, "configuration is valid");
    Ok(())
}

async fn serve(config: Option<PathBuf>, workgroup: Option<String>) -> Result<(), String> {
    let settings = load_settings(config.as_ref())?;
    let workgroup = match workgroup {
        Some(workgroup) => workgroup,
        None => settings.resolved_workgroup().map_err(|e| e.to_string())?,
    };

    let sidecar_path =
        DataApiClient::resolve_sidecar_path(settings.warehouse.sidecar_path.as_deref())
            .map_err(|e| e.to_string())?;
    let client = DataApiClient::spawn_with_timeout(&sidecar_path, settings.warehouse_timeout())
        .await
        .map_err(|e| e.to_string())?;

    let acl: Arc<dyn AclResolver> = Arc::new(settings.acl_resolver());
    let executor = Arc::new(
        QueryExecutor::new(Arc::new(client), acl.clone(), &workgroup)
            .with_poll_policy(settings.poll.to_policy()),
    );
    let gateway = Gateway::new(executor, acl).with_max_body_bytes(settings.response.max_body_bytes);

    info!(%workgroup, sidecar = %sidecar_path.display(), "gateway ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await.map_err(|e| e.to_string())? {
        if line.trim().is_empty() {
            continue;
        }

        let response = match serde_json::from_str::<ActionInvocation>(&line) {
            Ok(invocation) => gateway.handle(invocation).await,
            Err(e) => ActionResponse::error(&e.to_string(), &ActionInvocation::default()),
        };

        let mut out = serde_json::to_string(&response).map_err(|e| e.to_string())?;
        out.push('\n');
        stdout
            .write_all(out.as_bytes())
            .await
            .map_err(|e| e.to_string())?;
        stdout.flush().await.map_err(|e| e.to_string())?;
    }

    Ok(())
}
