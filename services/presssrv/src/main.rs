//! Pressure polling service (`presssrv`)
//!
//! Polls one RS-485 Modbus-RTU pressure transducer at a fixed period and
//! appends every reading to a CSV file.

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use common::shutdown::cancel_on_shutdown;
use presssrv::{
    bootstrap::{self, Args},
    config::{ConfigLoader, PollConfig},
    runtime::{serial_scheduler, start_serial},
    scheduler::StopReason,
    transport::Transport,
};

fn log_parameters(config: &PollConfig) {
    info!("Port: {} @{}baud 8N1", config.port, config.baud_rate);
    info!(
        "Slave: {} register: 0x{:04X}",
        config.slave_address, config.register_address
    );
    info!(
        "Period: {}ms settle: {}ms timeout: {}ms",
        config.poll_period_ms, config.settle_delay_ms, config.read_timeout_ms
    );
    info!(
        "Output: {} (record invalid: {})",
        config.output_path.display(),
        config.record_invalid
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    bootstrap::init_logging(&args)?;

    let config = ConfigLoader::load_validated(args.config.as_deref(), &args.overrides())
        .context("Failed to load configuration")?;
    log_parameters(&config);

    if args.validate {
        info!("Validation completed successfully");
        return Ok(());
    }

    if args.once {
        let mut scheduler = serial_scheduler(&config)?;
        let reading = scheduler.read_once().await?;
        println!("{}", serde_json::to_string(&reading.record())?);
        if !reading.is_valid() {
            anyhow::bail!("No valid reading: {}", reading.status());
        }
        return Ok(());
    }

    let handle = start_serial(&config).await?;
    cancel_on_shutdown(handle.cancel_token());
    info!("Polling, press Ctrl+C to stop");

    let (scheduler, summary) = handle.join().await?;
    info!(
        "Run finished: {} ticks, {} valid, {} timeout, {} crc, {} header, {} length, {} sink failures",
        summary.ticks,
        summary.valid,
        summary.timeout,
        summary.crc_mismatch,
        summary.header_mismatch,
        summary.length_mismatch,
        summary.sink_failures
    );
    info!("Transport: {}", scheduler.transport().stats());

    if let Some(StopReason::Fatal(e)) = summary.stop_reason {
        error!("Polling stopped on error: {}", e);
        return Err(e.into());
    }

    info!("Shutdown complete");
    Ok(())
}
