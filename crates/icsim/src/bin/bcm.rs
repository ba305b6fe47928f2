//! Body control module
//!
//! Listens for door commands and echoes the accepted mask as door status.
//!
//! ```bash
//! ./icsim-bcm --interface vcan1
//! ```

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use clap::Parser;
use icsim::{init_tracing, run_bus_loop, ERROR_SLEEP, IDLE_SLEEP};
use icsim_core::transport;
use icsim_core::{BodyControlModule, IcsimConfig};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "icsim-bcm")]
#[command(about = "Door lock body controller for the instrument cluster simulator")]
struct Args {
    /// Configuration file path (TOML format), shared with the dashboard
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// CAN interface name (overrides the config file)
    #[arg(short, long)]
    interface: Option<String>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = match &args.config {
        Some(path) => IcsimConfig::load(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?,
        None => IcsimConfig::default(),
    };
    if let Some(interface) = &args.interface {
        config.transport.interface = interface.clone();
    }

    let ids = config.ids.to_bus_ids();
    info!(
        interface = %config.transport.interface,
        command_id = format!("0x{:03X}", ids.door_command),
        status_id = format!("0x{:03X}", ids.door_status),
        "Starting body controller"
    );

    let bus = transport::open(&config.transport)
        .with_context(|| format!("Failed to open {}", config.transport.interface))?;
    let mut bcm = BodyControlModule::new(ids.door_command, ids.door_status);

    run_bus_loop("icsim-bcm", move |running| {
        while running.load(Ordering::SeqCst) {
            match bus.try_recv() {
                Ok(Some(frame)) => {
                    if let Some(echo) = bcm.handle(&frame) {
                        if let Err(e) = bus.send(&echo) {
                            error!(error = %e, "Failed to send door status");
                        }
                    }
                }
                Ok(None) => std::thread::sleep(IDLE_SLEEP),
                Err(e) => {
                    error!(error = %e, "Socket read error");
                    std::thread::sleep(ERROR_SLEEP);
                }
            }
        }

        info!(doors = format!("0x{:02X}", bcm.door_state()), "Body controller stopped");
        Ok(())
    })
    .await
}
