use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{error, info};

use linkwatch::db;
use linkwatch::db::schema::create_tables;
use linkwatch::monitor::probe::HttpProbe;
use linkwatch::server::config::ApiConfig;
use linkwatch::server::shutdown::shutdown_signal;
use linkwatch::telemetry::init_logging;
use linkwatch::version::VERSION;
use linkwatch::web::{AppState, create_axum_router};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let config = match ApiConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load server configuration: {e}");
            return Err(e.into());
        }
    };

    init_logging(&config.log_dir, "server.log");
    info!("Starting server, version: {}", VERSION);

    let db_pool = match db::connect(&config.database_url, 10).await {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "Failed to connect to the database.");
            return Err(e.into());
        }
    };
    create_tables(&db_pool).await?;

    let probe = HttpProbe::new(&config.probe_user_agent)?;
    let app_state = Arc::new(AppState::new(db_pool, Arc::new(probe)));
    let app = create_axum_router(app_state);

    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(address = %addr, "HTTP server listening.");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(Box::new)?;

    info!("Server stopped.");
    Ok(())
}
