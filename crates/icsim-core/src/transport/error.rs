//! Bus endpoint errors

use std::io;

use thiserror::Error;

use crate::frame::FrameError;

#[derive(Debug, Error)]
pub enum TransportError {
    /// Socket creation or setup failed
    #[error("Cannot open {interface}: {source}")]
    Open { interface: String, source: io::Error },

    #[error("Interface {0} is down")]
    Down(String),

    #[error("Write to {interface} failed: {reason}")]
    Write { interface: String, reason: String },

    #[error("Read from {interface} failed: {source}")]
    Read { interface: String, source: io::Error },

    /// A received frame does not fit `BusFrame`
    #[error("Malformed frame: {0}")]
    Frame(#[from] FrameError),

    #[error("No bus backend for {0}: SocketCAN needs Linux and the `socketcan` feature")]
    NoBackend(String),
}
