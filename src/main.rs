use anyhow::Context;
use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

use text_search::api::{AppState, create_router};
use text_search::config::Config;
use text_search::pipeline::{HttpBackend, SearchBackend};

#[derive(Parser)]
#[command(name = "text-search", about = "Embeddable text search widget and search proxy")]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Serve host pages, widget assets and the search proxy
    Serve {
        #[arg(long)]
        bind: Option<SocketAddr>,
        #[arg(long)]
        api_base_url: Option<String>,
    },
    /// Check that the search service is reachable
    Probe {
        #[arg(long)]
        api_base_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing subscriber (also picks up records from the log crate)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();
    let mut config = Config::from_env().context("invalid configuration")?;

    match cli.command.unwrap_or(Command::Serve {
        bind: None,
        api_base_url: None,
    }) {
        Command::Serve { bind, api_base_url } => {
            if let Some(bind) = bind {
                config.bind_addr = bind;
            }
            if let Some(url) = api_base_url {
                config.search_api_base_url = url;
            }
            serve(config).await
        }
        Command::Probe { api_base_url } => {
            if let Some(url) = api_base_url {
                config.search_api_base_url = url;
            }
            probe(config).await
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    let state = AppState::from_config(&config)?;
    let app = create_router(state, &config.static_dir);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    tracing::info!(
        addr = %config.bind_addr,
        search_api = %config.search_api_base_url,
        "text search listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn probe(config: Config) -> anyhow::Result<()> {
    let backend = HttpBackend::new(
        &config.search_api_base_url,
        config.search_timeout,
        config.probe_timeout,
    )?;
    let status = backend.probe().await;
    println!("{}", serde_json::to_string_pretty(&status)?);
    if !status.is_reachable() {
        std::process::exit(1);
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("shutting down");
}
