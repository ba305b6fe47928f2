//! Headless instrument cluster
//!
//! Reads frames from a CAN interface, runs them through the dashboard
//! engine and publishes the presentation snapshot whenever it changes.
//!
//! # Usage
//!
//! ```bash
//! ./icsim --interface vcan0
//! ./icsim --config config/icsim.toml --randomize --json
//! ./icsim --seed 1234 --unlock 0x0F
//! ```

use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use icsim::{
    init_tracing, parse_mask, run_bus_loop, write_seed_file, SnapshotPublisher, ERROR_SLEEP,
    IDLE_SLEEP,
};
use icsim_core::transport::{self, BusTransport};
use icsim_core::{BusFrame, DashboardEngine, IcsimConfig, RandomizedLayout};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "icsim")]
#[command(about = "Headless instrument cluster simulator")]
struct Args {
    /// Configuration file path (TOML format)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// CAN interface name (overrides the config file)
    #[arg(short, long)]
    interface: Option<String>,

    /// Open the interface in CAN FD mode
    #[arg(long)]
    fd: bool,

    /// Randomize the door, signal and speed ids and byte positions
    #[arg(short, long)]
    randomize: bool,

    /// Seed for the randomized layout (implies --randomize)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Print each snapshot change as a JSON line on stdout
    #[arg(long)]
    json: bool,

    /// Send a lock command for these doors at startup (e.g. 0x0F)
    #[arg(long, value_parser = parse_mask)]
    lock: Option<u8>,

    /// Send an unlock command for these doors at startup
    #[arg(long, value_parser = parse_mask)]
    unlock: Option<u8>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut config = match &args.config {
        Some(path) => {
            info!(path = %path.display(), "Loading config");
            IcsimConfig::load(path).map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?
        }
        None => IcsimConfig::default(),
    };

    // Command line wins over the file
    if let Some(interface) = &args.interface {
        config.transport.interface = interface.clone();
    }
    if args.fd {
        config.transport.fd = true;
    }
    if args.randomize || args.seed.is_some() {
        config.randomize.enabled = true;
    }
    if args.seed.is_some() {
        config.randomize.seed = args.seed;
    }

    let mut engine = DashboardEngine::new(&config, StdRng::from_entropy());

    if config.randomize.enabled {
        let seed = config.randomize.seed.unwrap_or_else(rand::random);
        let layout = RandomizedLayout::from_seed(seed);
        engine.apply_layout(&layout);
        info!(
            seed,
            door_id = format!("0x{:03X}", layout.door_id),
            signal_id = format!("0x{:03X}", layout.signal_id),
            speed_id = format!("0x{:03X}", layout.speed_id),
            "Randomized layout"
        );
        if let Err(e) = write_seed_file(&config.randomize.seed_file, seed) {
            warn!(error = %e, "Seed not persisted");
        }
    }

    info!(
        interface = %config.transport.interface,
        fd = config.transport.fd,
        diag_request = format!("0x{:03X}", engine.ids().diag_request),
        diag_response = format!("0x{:03X}", engine.ids().diag_response),
        "Starting instrument cluster"
    );

    let bus = transport::open(&config.transport)
        .with_context(|| format!("Failed to open {}", config.transport.interface))?;

    let mut startup = Vec::new();
    if let Some(bits) = args.unlock {
        startup.push(engine.unlock_doors(bits));
    }
    if let Some(bits) = args.lock {
        startup.push(engine.lock_doors(bits));
    }
    send_all(bus.as_ref(), &startup);

    let mut publisher = SnapshotPublisher::new(args.json);
    run_bus_loop("icsim", move |running| {
        let start = Instant::now();

        while running.load(Ordering::SeqCst) {
            let now = start.elapsed();

            let outbound = match bus.try_recv() {
                Ok(Some(frame)) => {
                    debug!(frame = %frame, "Received");
                    engine.process(&frame, now)
                }
                Ok(None) => {
                    let outbound = engine.tick(now);
                    if outbound.is_empty() {
                        std::thread::sleep(IDLE_SLEEP);
                    }
                    outbound
                }
                Err(e) => {
                    error!(error = %e, "Socket read error");
                    std::thread::sleep(ERROR_SLEEP);
                    continue;
                }
            };

            send_all(bus.as_ref(), &outbound);
            // Idle ticks can change the snapshot too
            publisher.update(engine.snapshot())?;
        }

        info!(score = engine.challenges().score(), "Final score");
        Ok(())
    })
    .await
}

fn send_all(bus: &dyn BusTransport, frames: &[BusFrame]) {
    for frame in frames {
        if let Err(e) = bus.send(frame) {
            error!(frame = %frame, error = %e, "Failed to send");
        }
    }
}
