//! Two-segment gateway
//!
//! Door commands travel from segment A to segment B and door status comes
//! back the other way. Everything else stays on its own segment.
//!
//! ```bash
//! ./icsim-gateway --segment-a vcan0 --segment-b vcan1
//! ```

use std::path::PathBuf;
use std::sync::atomic::Ordering;

use anyhow::{Context, Result};
use clap::Parser;
use icsim::{init_tracing, run_bus_loop, ERROR_SLEEP, IDLE_SLEEP};
use icsim_core::config::TransportConfig;
use icsim_core::transport::{self, BusTransport};
use icsim_core::{BusRelay, IcsimConfig, Segment};
use tracing::{debug, error, info};

#[derive(Parser, Debug)]
#[command(name = "icsim-gateway")]
#[command(about = "Relay door traffic between two CAN segments")]
struct Args {
    /// Configuration file path (TOML format), shared with the dashboard
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Interface of the dashboard segment
    #[arg(long, default_value = "vcan0")]
    segment_a: String,

    /// Interface of the body controller segment
    #[arg(long, default_value = "vcan1")]
    segment_b: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn open_segment(config: &IcsimConfig, interface: &str) -> Result<Box<dyn BusTransport>> {
    let transport = TransportConfig {
        interface: interface.to_string(),
        ..config.transport.clone()
    };
    transport::open(&transport).with_context(|| format!("Failed to open {}", interface))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let config = match &args.config {
        Some(path) => IcsimConfig::load(path)
            .map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?,
        None => IcsimConfig::default(),
    };

    let ids = config.ids.to_bus_ids();
    let relay = BusRelay::new(ids.door_command, ids.door_status);
    let segment_a = open_segment(&config, &args.segment_a)?;
    let segment_b = open_segment(&config, &args.segment_b)?;

    info!(
        segment_a = %args.segment_a,
        segment_b = %args.segment_b,
        command_id = format!("0x{:03X}", ids.door_command),
        status_id = format!("0x{:03X}", ids.door_status),
        "Starting gateway"
    );

    run_bus_loop("icsim-gateway", move |running| {
        while running.load(Ordering::SeqCst) {
            let mut idle = true;

            for (from, rx, tx) in [
                (Segment::A, &segment_a, &segment_b),
                (Segment::B, &segment_b, &segment_a),
            ] {
                match rx.try_recv() {
                    Ok(Some(frame)) => {
                        idle = false;
                        if relay.forward(from, &frame).is_some() {
                            debug!(frame = %frame, from = ?from, "Forwarding");
                            if let Err(e) = tx.send(&frame) {
                                error!(error = %e, to = tx.name(), "Failed to forward");
                            }
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        error!(error = %e, interface = rx.name(), "Socket read error");
                        std::thread::sleep(ERROR_SLEEP);
                    }
                }
            }

            if idle {
                std::thread::sleep(IDLE_SLEEP);
            }
        }

        Ok(())
    })
    .await
}
