// src/main.rs - Local print agent entry point
use clap::Parser;
use pdv_print_agent::config::{self, DEFAULT_CONFIG_PATH};
use pdv_print_agent::executor::HtmlPrintExecutor;
use pdv_print_agent::printers::{PrinterBackend, SystemPrinters};
use pdv_print_agent::queue::PrintQueue;
use pdv_print_agent::web::api::{self, AppStateInner, VERSION};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "print-agent", version, about = "Local HTML receipt print agent")]
struct Args {
    /// Path to the TOML configuration file
    #[arg(short, long)]
    config: Option<String>,
    /// Listen address (overrides config and PDV_AGENT_HOST)
    #[arg(long)]
    host: Option<String>,
    /// Listen port (overrides config and PDV_AGENT_PORT)
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    tracing::info!("Loading configuration from: {}", config_path);

    let mut config = config::load_agent_config(config_path, args.config.is_some()).map_err(|e| {
        tracing::error!("Failed to load config from '{}': {}", config_path, e);
        Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>
    })?;
    if let Some(host) = args.host {
        config.server.host = host;
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }

    let aliases = config.aliases()?;
    tracing::info!(
        queue_max = config.queue.queue_max,
        max_copies = config.queue.max_copies,
        print_wait_ms = config.queue.print_wait_ms,
        aliases = aliases.len(),
        "Queue configured"
    );

    let printers: Arc<dyn PrinterBackend> = Arc::new(SystemPrinters::new());
    let executor = Arc::new(HtmlPrintExecutor::from_config(printers.clone(), &config));
    let (queue, worker) = PrintQueue::start(config.queue, aliases, executor);

    let state = Arc::new(AppStateInner {
        queue: queue.clone(),
        printers,
        max_body_bytes: config.server.max_body_bytes,
    });
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port)).await?;
    tracing::info!(version = VERSION, "Print agent listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            tracing::info!("Shutting down print agent");
        })
        .await?;

    // Let the job in flight finish so its renderer is reaped and the
    // default printer is restored before the runtime goes away.
    queue.shutdown();
    if let Some(active) = queue.snapshot().active {
        tracing::info!(id = %active.id, "Waiting for the job in flight to finish");
    }
    if let Err(e) = worker.await {
        tracing::error!("Print worker ended abnormally: {}", e);
    }

    Ok(())
}
