use std::sync::Arc;

use clap::Parser;
use tokio::signal;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use surplusyard_api as api;

#[derive(Debug, Parser)]
#[command(name = "surplusyard-api", about = "Surplus materials marketplace API server")]
struct Cli {
    /// Override the configured listen port
    #[arg(long)]
    port: Option<u16>,
    /// Override the configured database URL
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = api::config::AppConfig::load()?;
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(database_url) = cli.database_url {
        config.database_url = database_url;
    }

    init_tracing(&config.log_level, config.is_production());

    let db = api::db::establish_connection(&config.database_url).await?;
    if config.database_url.starts_with("sqlite:") {
        api::db::create_schema(&db).await?;
        info!("SQLite schema bootstrapped");
    }

    let (event_sender, mut event_rx) = api::events::channel(config.event_buffer);

    // Drain domain events; downstream consumers (webhooks, dashboards)
    // plug in here.
    tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            info!(?event, "domain event");
        }
        warn!("Event channel closed");
    });

    let bind_address = config.bind_address();
    let state = api::AppState::new(Arc::new(db), config, Some(Arc::new(event_sender)));

    let app = axum::Router::new()
        .nest("/api", api::handlers::api_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    info!(address = %bind_address, "surplusyard-api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn init_tracing(log_level: &str, json: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    info!("Shutdown signal received");
}
