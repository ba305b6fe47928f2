//! Shared plumbing for the icsim node binaries
//!
//! Each binary owns one blocking bus loop running on the tokio blocking pool
//! and stops it on Ctrl+C.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use icsim_core::DashboardSnapshot;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// How long the bus loop sleeps when the socket has nothing to read
pub const IDLE_SLEEP: Duration = Duration::from_millis(1);

/// Back-off after a receive error
pub const ERROR_SLEEP: Duration = Duration::from_millis(100);

const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Initialise tracing; `RUST_LOG` wins over the verbosity flag
pub fn init_tracing(verbose: bool) {
    let default = if verbose {
        "icsim=debug,icsim_core=debug,icsim_bcm=debug,icsim_gateway=debug"
    } else {
        "icsim=info,icsim_core=info,icsim_bcm=info,icsim_gateway=info"
    };

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}

/// Run `body` on the blocking pool until Ctrl+C or until it returns
pub async fn run_bus_loop<F>(name: &'static str, body: F) -> Result<()>
where
    F: FnOnce(Arc<AtomicBool>) -> Result<()> + Send + 'static,
{
    let running = Arc::new(AtomicBool::new(true));
    let running_for_loop = running.clone();
    let mut handle: JoinHandle<Result<()>> =
        tokio::task::spawn_blocking(move || body(running_for_loop));

    info!(node = name, "Running. Press Ctrl+C to stop.");

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl+C")?;
            info!(node = name, "Shutting down...");
            running.store(false, Ordering::SeqCst);
            match tokio::time::timeout(SHUTDOWN_GRACE, handle).await {
                Ok(joined) => joined.context("Bus loop panicked")?,
                Err(_) => {
                    warn!(node = name, "Bus loop did not stop in time");
                    Ok(())
                }
            }
        }
        joined = &mut handle => joined.context("Bus loop panicked")?,
    }
}

/// Emits the dashboard snapshot whenever it differs from the last one emitted
#[derive(Debug, Default)]
pub struct SnapshotPublisher {
    json: bool,
    last: Option<DashboardSnapshot>,
}

impl SnapshotPublisher {
    /// `json` prints one JSON line per change on stdout instead of logging
    pub fn new(json: bool) -> Self {
        Self { json, last: None }
    }

    pub fn last(&self) -> Option<&DashboardSnapshot> {
        self.last.as_ref()
    }

    /// Publish `snapshot` if it changed; returns whether it was published
    pub fn update(&mut self, snapshot: DashboardSnapshot) -> Result<bool> {
        if self.last.as_ref() == Some(&snapshot) {
            return Ok(false);
        }

        if self.json {
            let line = serde_json::to_string(&snapshot).context("Failed to encode snapshot")?;
            println!("{}", line);
        } else {
            info!(
                speed = snapshot.speed,
                doors = ?snapshot.door_status,
                turn = ?snapshot.turn_status,
                luminosity = snapshot.luminosity,
                warning = snapshot.warning_state,
                light = snapshot.light_status,
                session = ?snapshot.diag_session,
                score = snapshot.score,
                "Dashboard"
            );
        }

        self.last = Some(snapshot);
        Ok(true)
    }
}

/// Parse a door mask given as decimal or `0x`-prefixed hex
pub fn parse_mask(value: &str) -> std::result::Result<u8, String> {
    let parsed = match value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16),
        None => value.parse::<u8>(),
    };
    parsed.map_err(|e| format!("invalid door mask '{}': {}", value, e))
}

/// Persist the randomization seed so the session can be replayed
pub fn write_seed_file(path: &Path, seed: u64) -> Result<()> {
    std::fs::write(path, format!("{}\n", seed))
        .with_context(|| format!("Failed to write seed file {}", path.display()))
}
