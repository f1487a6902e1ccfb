use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use linkwatch::db;
use linkwatch::db::services::{CheckResultService, LeaseService, TargetService};
use linkwatch::monitor::probe::HttpProbe;
use linkwatch::scheduler::{Scheduler, SchedulerSettings};
use linkwatch::server::config::SchedulerConfig;
use linkwatch::server::shutdown::shutdown_channel;
use linkwatch::telemetry::init_logging;
use linkwatch::version::VERSION;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long)]
    config: Option<String>,

    /// Run a single cycle and exit
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let args = Args::parse();

    let config = match SchedulerConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load scheduler configuration: {e}");
            return Err(e.into());
        }
    };

    init_logging(&config.log_dir, "scheduler.log");
    info!(
        version = VERSION,
        scheduler_id = %config.scheduler_id,
        "Starting scheduler."
    );

    let pool_size = u32::try_from(config.max_concurrency)
        .unwrap_or(u32::MAX)
        .saturating_add(2);
    let db_pool = match db::connect(&config.database_url, pool_size).await {
        Ok(pool) => pool,
        Err(e) => {
            error!(error = %e, "Failed to connect to the database.");
            return Err(e.into());
        }
    };

    let probe = HttpProbe::new(&config.probe_user_agent)?;
    let scheduler = Scheduler::new(
        SchedulerSettings::from(&config),
        Arc::new(TargetService::new(db_pool.clone())),
        Arc::new(LeaseService::new(db_pool.clone())),
        Arc::new(CheckResultService::new(db_pool)),
        Arc::new(probe),
    );

    if args.once {
        let report = scheduler.run_cycle().await?;
        info!(?report, "Single cycle finished.");
        return Ok(());
    }

    scheduler.run(shutdown_channel()).await;
    Ok(())
}
