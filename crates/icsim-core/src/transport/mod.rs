//! Bus access
//!
//! - SocketCAN (classic or FD) on Linux behind the `socketcan` feature
//! - In-memory mock bus for tests and offline runs
//!
//! Both are non-blocking: `try_recv` returns `Ok(None)` when nothing is
//! pending so the caller can run its idle work.

pub mod error;
pub mod mock;

#[cfg(all(target_os = "linux", feature = "socketcan"))]
pub mod socketcan;

pub use error::TransportError;
pub use mock::MockBus;

use crate::config::TransportConfig;
use crate::frame::BusFrame;

/// A frame-level bus endpoint
pub trait BusTransport: Send + Sync {
    fn send(&self, frame: &BusFrame) -> Result<(), TransportError>;

    /// Next pending frame, or `None` when the bus is idle
    fn try_recv(&self) -> Result<Option<BusFrame>, TransportError>;

    /// Human-readable endpoint name for logs
    fn name(&self) -> &str;
}

/// Open the configured SocketCAN interface
pub fn open(config: &TransportConfig) -> Result<Box<dyn BusTransport>, TransportError> {
    #[cfg(all(target_os = "linux", feature = "socketcan"))]
    {
        let bus = socketcan::SocketCanBus::open(&config.interface, config.fd)?;
        Ok(Box::new(bus))
    }
    #[cfg(not(all(target_os = "linux", feature = "socketcan")))]
    {
        Err(TransportError::NoBackend(config.interface.clone()))
    }
}
