//! PillSrv main program

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use common::ShutdownHandle;
use tracing::{error, info};

use pillsrv::api::create_router;
use pillsrv::bootstrap;
use pillsrv::device::{create_device, spawn_console_input};
use pillsrv::services::{HardwareMonitor, ScheduleScanner};
use pillsrv::{AppState, PillsrvConfig};

#[derive(Parser, Debug)]
#[command(author, version, about = "PillSrv - pill reminder controller")]
struct Args {
    /// Configuration file path
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Use the simulated device regardless of configuration
    #[arg(long)]
    simulate: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Validate configuration, open the database and print the slot map
    Check,
    /// Print the default configuration as YAML
    DefaultConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(Commands::DefaultConfig) = args.command {
        print!("{}", PillsrvConfig::generate_default_config()?);
        return Ok(());
    }

    let config = PillsrvConfig::load(args.config.as_deref())?;

    match args.command {
        Some(Commands::Check) => check_config(config).await,
        _ => run_service(config, args.simulate).await,
    }
}

async fn run_service(config: PillsrvConfig, simulate: bool) -> Result<()> {
    let service_info = bootstrap::create_service_info(&config);
    bootstrap::init_environment(&service_info, &config)?;
    config.validate()?;

    let store = bootstrap::open_store(&config).await?;
    let device = create_device(&config.device, simulate)?;
    let state = AppState::build(store.clone(), device.io.clone()).await?;

    // Bind before any loop can light a slot; nothing below returns early
    let (addr, listener) = bootstrap::bind_listener(&service_info, &config).await?;

    let shutdown = ShutdownHandle::new();
    {
        let handle = shutdown.clone();
        tokio::spawn(async move { handle.trigger_on_signal().await });
    }

    let scanner = ScheduleScanner::new(
        store,
        state.slots.clone(),
        Duration::from_secs(config.scanner.interval_secs),
    );
    let scanner_task = {
        let token = shutdown.token();
        tokio::spawn(async move { scanner.run(token).await })
    };

    let monitor = HardwareMonitor::new(
        device.io.clone(),
        state.alarms.clone(),
        Duration::from_millis(config.monitor.poll_ms),
        Duration::from_millis(config.monitor.debounce_ms),
    );
    let monitor_task = tokio::spawn(monitor.run(shutdown.token()));

    let console_task = match (&device.simulated, config.device.console_input) {
        (Some(sim), true) => Some(spawn_console_input(sim.clone(), shutdown.token())),
        _ => None,
    };

    info!("PillSrv API listening on http://{}", addr);

    let app = create_router(state.clone());
    let server_shutdown = shutdown.clone();
    let served = axum::serve(listener, app)
        .with_graceful_shutdown(async move { server_shutdown.triggered().await })
        .await;
    if let Err(e) = served {
        error!("API server error: {}", e);
    }

    // Server may have stopped on its own; make sure the loops follow
    shutdown.trigger();
    for (name, task) in [("scanner", scanner_task), ("monitor", monitor_task)] {
        if let Err(e) = task.await {
            error!("{} task ended abnormally: {}", name, e);
        }
    }
    if let Some(task) = console_task {
        task.abort();
    }

    state.alarms.shutdown().await;
    info!("PillSrv stopped");
    Ok(())
}

async fn check_config(config: PillsrvConfig) -> Result<()> {
    println!("=== PillSrv configuration check ===\n");

    config.validate()?;
    println!("Configuration: OK");
    println!("  listen:   {}:{}", config.service.host, config.service.port);
    println!("  database: {}", config.database.path);
    println!("  device:   {:?}", config.device.backend);
    println!("  scanner:  every {}s", config.scanner.interval_secs);

    let store = bootstrap::open_store(&config).await?;
    println!("Database: OK\n");

    let occupied = store.occupied_slots().await?;
    println!("Slot map:");
    for slot in pillsrv::domain::SlotIndex::all() {
        match occupied.iter().find(|(s, _)| *s == slot) {
            Some((_, med_id)) => {
                let med = store.get_medication(*med_id).await?;
                println!("  slot {}: {} (medication {})", slot, med.name, med.id);
            },
            None => println!("  slot {}: empty", slot),
        }
    }

    Ok(())
}
