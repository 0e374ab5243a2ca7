//! hutchd — the hutch daemon.
//!
//! Single binary that wires the exporter together:
//! - Config (hutch.toml + environment overrides)
//! - Management API client
//! - Exporter registry → enabled exporter set
//! - HTTP server exposing `/metrics`
//!
//! # Usage
//!
//! ```text
//! hutchd serve --config /etc/hutch/hutch.toml --listen 0.0.0.0:9419
//! hutchd describe
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::info;

use hutch_core::config::LogFormat;
use hutch_core::ExporterConfig;
use hutch_fetch::ManagementClient;
use hutch_metrics::{ExporterContext, ExporterRegistry, ExporterSet, MetricDesc};

#[derive(Parser)]
#[command(name = "hutchd", about = "RabbitMQ metrics exporter")]
struct Cli {
    /// Path to hutch.toml. Defaults apply when omitted.
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Serve `/metrics`, collecting from RabbitMQ on every scrape.
    Serve {
        /// Address to listen on (overrides `server.listen`).
        #[arg(long)]
        listen: Option<SocketAddr>,
    },
    /// Print the metric families the enabled exporters publish.
    Describe,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = ExporterConfig::load(cli.config.as_deref())?;

    init_tracing(config.log.format);

    match cli.command {
        Command::Serve { listen } => run_serve(config, listen).await,
        Command::Describe => run_describe(&config),
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,hutchd=debug,hutch=debug"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

fn build_exporters(config: &ExporterConfig) -> anyhow::Result<ExporterSet> {
    let client = ManagementClient::from_config(config)?;
    let ctx = ExporterContext {
        provider: Arc::new(client),
        namespace: config.server.namespace.clone(),
    };
    let registry = ExporterRegistry::builtin();
    Ok(ExporterSet::from_registry(
        &registry,
        &config.exporters.enabled,
        &ctx,
        config.server.publish_stale_on_error,
    )?)
}

fn run_describe(config: &ExporterConfig) -> anyhow::Result<()> {
    let exporters = build_exporters(config)?;
    let mut descs: Vec<MetricDesc> = Vec::new();
    exporters.describe(&mut descs);

    for desc in descs {
        println!("{} [{}] {}", desc.name, desc.labels.join(","), desc.help);
    }
    Ok(())
}

async fn run_serve(config: ExporterConfig, listen: Option<SocketAddr>) -> anyhow::Result<()> {
    info!(
        url = %config.rabbit.url,
        exporters = ?config.exporters.enabled,
        "hutch exporter starting"
    );

    let exporters = Arc::new(build_exporters(&config)?);
    info!(modules = ?exporters.names(), "exporters initialized");

    let router = hutch_api::build_router(hutch_api::ScrapeState {
        exporters,
        fail_on_error: config.server.fail_on_error,
    });

    let addr = match listen {
        Some(addr) => addr,
        None => config.listen_addr()?,
    };
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "metrics server listening");

    // Graceful shutdown on Ctrl-C.
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!(error = %e, "failed to install CTRL+C handler");
                std::future::pending::<()>().await;
            }
            info!("shutdown signal received");
        })
        .await?;

    info!("hutch exporter stopped");
    Ok(())
}
