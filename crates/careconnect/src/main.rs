//! careconnect: CareConnect server binary
//!
//! Usage:
//!   careconnect            - Start the HTTP API and the maintenance scheduler
//!   careconnect --help     - Show help
//!   careconnect --version  - Show version

use std::sync::Arc;

use care_core::{Config, Marketplace, OfflineGateway, PaymentGateway, PaymentProvider};
use care_payments::{AsaasClient, AsaasConfig};
use care_schedule::{ScheduleConfig, Scheduler};
use tracing_subscriber::EnvFilter;

/// Run mode
enum RunMode {
    Server,
    Help,
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match parse_args() {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("careconnect {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        RunMode::Server => {}
    }

    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    tracing::info!("Starting careconnect...");
    tracing::info!("Database: {}", config.database.db_path);

    run_server(config).await
}

/// Parse command line arguments
fn parse_args() -> RunMode {
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--help" | "-h" => return RunMode::Help,
            "--version" | "-v" => return RunMode::Version,
            _ => {}
        }
    }
    RunMode::Server
}

fn print_help() {
    println!("careconnect - caregiver marketplace server");
    println!();
    println!("Usage:");
    println!("  careconnect            Start the HTTP API and the maintenance scheduler");
    println!("  careconnect --help     Show this help message");
    println!("  careconnect --version  Show version");
    println!();
    println!("Configuration is read from ./careconnect.toml when present,");
    println!("otherwise from the environment:");
    println!("  API_KEY                Bearer key for the HTTP API (unset = open)");
    println!("  API_PORT               HTTP API port (default: 3000)");
    println!("  API_ALLOWED_ORIGINS    Comma-separated CORS origins");
    println!("  DB_PATH                SQLite database path");
    println!("  BOOKING_FIRST_HOUR     First bookable hour (default: 8)");
    println!("  BOOKING_LAST_HOUR      Hour bookings must end by (default: 20)");
    println!("  BOOKING_MAX_HOURS      Longest single booking (default: 8)");
    println!("  PAYMENT_PROVIDER       offline or asaas (default: offline)");
    println!("  ASAAS_API_KEY          Asaas access token");
    println!("  ASAAS_BASE_URL         Asaas API root (default: sandbox)");
    println!("  PLATFORM_FEE_PERCENT   Platform share of each payment (default: 20)");
    println!("  SCHEDULE_ENABLED       Run maintenance jobs (default: true)");
    println!("  SCHEDULE_CONFIG_PATH   Path to schedule.toml");
}

fn payment_gateway(config: &Config) -> anyhow::Result<Arc<dyn PaymentGateway>> {
    match config.payments.provider {
        PaymentProvider::Asaas => {
            let client = AsaasClient::new(AsaasConfig::from_payment_config(&config.payments)?)?;
            tracing::info!("Payments: Asaas");
            Ok(Arc::new(client))
        }
        PaymentProvider::Offline => {
            tracing::warn!("Payments: offline gateway, no real charges are made");
            Ok(Arc::new(OfflineGateway))
        }
    }
}

/// Run the HTTP API until Ctrl+C, with the scheduler alongside
async fn run_server(config: Config) -> anyhow::Result<()> {
    let marketplace = Arc::new(
        Marketplace::open(&config)
            .map_err(|e| anyhow::anyhow!("Failed to open marketplace: {}", e))?
            .with_gateway(payment_gateway(&config)?),
    );

    let scheduler = if config.scheduler.enabled {
        let schedule = ScheduleConfig::load(config.scheduler.config_path.as_deref())?;
        let handle = Scheduler::new(schedule, Arc::clone(&marketplace))?.start();
        tracing::info!("Maintenance scheduler started");
        Some(handle)
    } else {
        tracing::info!("Maintenance scheduler is disabled");
        None
    };

    tracing::info!("careconnect initialized successfully");
    tracing::info!("Press Ctrl+C to exit");

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
        }
        tracing::info!("Shutting down...");
    };
    let served = care_api::start_server(config, marketplace, shutdown).await;

    if let Some(handle) = scheduler {
        handle.stop().await;
    }

    tracing::info!("careconnect stopped");
    served
}
