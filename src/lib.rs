pub mod channels;    // Inter-component communication channels
pub mod cms2000;     // CMS2000 inverter protocol client
pub mod config;      // Configuration management
pub mod coordinator; // Takes readings and publishes them
pub mod currentcost; // CurrentCost monitor line reader
pub mod limitlessled; // LimitlessLED UDP commands
pub mod options;     // Command line options parsing
pub mod prelude;     // Common imports and types
pub mod scheduler;   // Decides when readings are taken

// Get the package version from Cargo.toml
const CARGO_PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

use crate::prelude::*;
use crate::limitlessled::StatusLight;

/// Sets up `env_logger` with timestamps, honouring `RUST_LOG` over `loglevel`.
pub fn init_logging(loglevel: &str) {
    if let Err(e) = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(loglevel))
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {} {}] {}",
                chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.3f"),
                record.level(),
                record.module_path().unwrap_or(""),
                record.args()
            )
        })
        .write_style(env_logger::WriteStyle::Never)
        .try_init()
    {
        eprintln!("Failed to initialise logging: {}", e);
    }
}

/// Main application entry point
///
/// Loads the configuration, starts the coordinator, the scheduler and the
/// optional status light, then runs until `shutdown_rx` fires or the
/// scheduler gives up.
pub async fn app(mut shutdown_rx: broadcast::Receiver<()>, options: Options) -> Result<()> {
    let config = match Config::new(options.config_file.clone()) {
        Ok(config) => config,
        Err(e) => {
            init_logging("info");
            return Err(e);
        }
    };

    init_logging(&config.loglevel);
    info!("cms2000-bridge {} starting with config file: {}", CARGO_PKG_VERSION, options.config_file);
    config.log_summary();

    let channels = Channels::new();

    info!("  Creating Coordinator...");
    let coordinator = Coordinator::new(&config, channels.clone());
    let coordinator_clone = coordinator.clone();
    let coordinator_handle = tokio::spawn(async move {
        if let Err(e) = coordinator_clone.start().await {
            error!("Coordinator task failed: {}", e);
        }
    });

    let light_handle = config.limitlessled().map(|led| {
        info!("  Creating LimitlessLED status light...");
        let light = StatusLight::new(led, channels.clone());
        tokio::spawn(async move {
            if let Err(e) = light.start().await {
                error!("LimitlessLED task failed: {}", e);
            }
        })
    });

    info!("  Creating Scheduler...");
    let scheduler = Scheduler::new(config.clone(), channels.clone());
    let mut scheduler_handle = tokio::spawn(async move { scheduler.start().await });

    let result = tokio::select! {
        _ = shutdown_rx.recv() => {
            info!("Shutdown signal received, stopping components...");
            Ok(())
        }
        res = &mut scheduler_handle => match res {
            Ok(Ok(())) => Ok(()),
            Ok(Err(e)) => Err(anyhow!("Scheduler task failed: {}", e)),
            Err(e) => Err(anyhow!("Scheduler task panicked: {}", e)),
        },
    };

    scheduler_handle.abort();
    coordinator.stop();
    if let Err(e) = coordinator_handle.await {
        error!("Error waiting for coordinator task: {}", e);
    }
    if let Some(handle) = light_handle {
        handle.abort();
    }

    info!("Application shutdown complete");
    result
}
