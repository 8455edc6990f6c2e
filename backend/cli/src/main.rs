mod config;
mod output;
mod status_cmd;

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use intentforge_config::{load_config, prepare_with, resolve_config_path};
use intentforge_gateway::{start_server, GatewayState};
use intentforge_logging::init_logger;
use intentforge_router::RouteRequest;

#[derive(Parser)]
#[command(name = "intentforge")]
#[command(about = "IntentForge: route free-text requests to MCP tool providers")]
#[command(version)]
struct Cli {
    /// Config file (defaults to $INTENTFORGE_CONFIG, then ~/.intentforge/config.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway
    Serve {
        /// Port to bind the HTTP server to
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Route one request and print the envelope
    Ask {
        /// Free-text request, e.g. "Add 200 for groceries today"
        message: String,
        /// Attach a conversational reply summarizing the result
        #[arg(long)]
        narrate: bool,
        /// Reference date for relative expressions (YYYY-MM-DD, default today)
        #[arg(long)]
        date: Option<NaiveDate>,
    },
    /// List the merged operation catalog
    Tools,
    /// Show config, provider reachability and gateway health
    Status {
        /// Port the gateway is expected on
        #[arg(short, long)]
        port: Option<u16>,
    },
}

/// Cancel `token` on Ctrl-C.
fn cancel_on_ctrl_c(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down");
                token.cancel();
            }
            Err(e) => warn!(error = %e, "Failed to listen for Ctrl-C"),
        }
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = resolve_config_path(cli.config.as_deref());
    let raw = load_config(&config_path).await?;
    let _log_guard = init_logger(&config::logging_options(raw.logging.as_ref()))?;
    let config = prepare_with(raw, &std::env::vars().collect())
        .with_context(|| format!("Invalid config: {}", config_path.display()))?;

    let cancel = CancellationToken::new();
    let interrupt = cancel_on_ctrl_c(cancel.clone());
    let router = config::build_router(&config);

    match cli.command {
        Commands::Serve { port } => {
            let addr = config::bind_addr(&config, port)?;
            info!(
                addr = %addr,
                providers = router.endpoints().len(),
                config = %config_path.display(),
                "Starting IntentForge gateway"
            );
            start_server(addr, GatewayState::new(router), cancel).await?;
        }
        Commands::Ask {
            message,
            narrate,
            date,
        } => {
            let request = RouteRequest {
                narrate,
                reference_date: date,
                ..RouteRequest::new(message)
            };
            let response = router.handle(&request, &cancel).await?;
            println!("{}", serde_json::to_string_pretty(&response)?);
        }
        Commands::Tools => {
            let catalog = router.catalog(&cancel).await?;
            print!("{}", output::tools_table(&catalog));
        }
        Commands::Status { port } => {
            let addr = config::bind_addr(&config, port)?;
            status_cmd::run(&config_path, &config, &router, addr, &cancel).await?;
        }
    }

    interrupt.abort();
    Ok(())
}
