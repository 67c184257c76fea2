//! RS485 protocol adapter service
//!
//! Loads the service configuration, initializes the configured devices and
//! keeps the supervisors running until Ctrl+C / SIGTERM. With `--stdin`, each
//! `<device_id> <hex frame>` line read from standard input is processed and
//! the result printed as one JSON line; EOF stops the service.

use anyhow::Context;
use clap::Parser;
use futures::future::join_all;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};

use common::bootstrap_args::ServiceArgs;
use common::service_bootstrap::{init_logging, print_startup_banner, LoggingOptions, ServiceInfo};
use common::shutdown::wait_for_shutdown;
use rs485srv::{AppConfig, DeviceId, DeviceInfo, ProtocolManager, ProtocolManagerBuilder};

#[derive(Debug, Parser)]
#[command(name = "rs485srv", version, about = "RS485 / Modbus-RTU device protocol adapter")]
struct Args {
    #[command(flatten)]
    common: ServiceArgs,

    /// Print the effective configuration as YAML and exit
    #[arg(long)]
    dump_config: bool,

    /// Read `<device_id> <hex frame>` lines from stdin and print JSON results
    #[arg(long)]
    stdin: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = AppConfig::load(args.common.config.as_deref())
        .context("failed to load configuration")?;

    if args.dump_config {
        print!("{}", config.to_yaml()?);
        return Ok(());
    }

    // Command line wins unless it was left at the default level
    let mut service_args = args.common.clone();
    if !service_args.debug && service_args.log_level.eq_ignore_ascii_case("info") {
        service_args.log_level = config.logging.level.clone();
    }

    let service = ServiceInfo::new(
        config.service.name.clone(),
        env!("CARGO_PKG_VERSION"),
        "RS485 / Modbus-RTU device protocol adapter",
    );
    init_logging(
        &service_args,
        &service,
        &LoggingOptions {
            dir: config.logging.dir.clone(),
            json: config.logging.json,
        },
    )?;
    if !service_args.no_color {
        print_startup_banner(&service);
    }

    if service_args.validate {
        info!(
            "Configuration valid: {} device(s), worker pool {}",
            config.devices.len(),
            config.service.worker_pool_size
        );
        return Ok(());
    }

    let manager = ProtocolManagerBuilder::from_config(&config).build();
    manager.start();
    initialize_devices(&manager, &config).await;

    if args.stdin {
        tokio::select! {
            result = run_stdin(&manager) => {
                if let Err(e) = result {
                    error!("stdin processing stopped: {:#}", e);
                }
            },
            () = wait_for_shutdown() => {},
        }
    } else {
        wait_for_shutdown().await;
    }

    if !manager.shutdown().await {
        warn!("Some device operations were cancelled during shutdown");
    }
    Ok(())
}

async fn initialize_devices(manager: &ProtocolManager, config: &AppConfig) {
    if config.devices.is_empty() {
        info!("No devices configured");
        return;
    }

    let pending = config.devices.iter().map(|device| {
        manager.initialize_device(
            device.device_id,
            DeviceInfo::new(device.device_model.clone()),
            device.serial.clone(),
        )
    });
    let results = join_all(pending).await;

    let mut connected = 0;
    for (device, result) in config.devices.iter().zip(results) {
        match result {
            Ok(init) if init.success => {
                if !device.write_enabled {
                    manager.set_write_enabled(device.device_id, false);
                }
                connected += 1;
            },
            Ok(init) => {
                let reason = init
                    .error
                    .map(|e| e.error_message)
                    .unwrap_or_else(|| "unknown".to_string());
                warn!("Device {} not initialized: {}", device.device_id, reason);
            },
            Err(e) => error!("Device {} initialization aborted: {}", device.device_id, e),
        }
    }
    info!("{}/{} configured device(s) connected", connected, config.devices.len());
}

async fn run_stdin(manager: &ProtocolManager) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((id, hex)) = line.split_once(char::is_whitespace) else {
            warn!("Ignoring line without frame data: {}", line);
            continue;
        };
        let device_id: DeviceId = match id.parse() {
            Ok(id) => id,
            Err(_) => {
                warn!("Ignoring line with invalid device id: {}", id);
                continue;
            },
        };

        let result = manager.process_device_message_hex(device_id, hex).await?;
        println!("{}", serde_json::to_string(&result)?);
    }
    info!("stdin closed, shutting down");
    Ok(())
}
