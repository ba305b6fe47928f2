//! Crate-level error

use thiserror::Error;

use crate::config::ConfigError;
use crate::frame::FrameError;
use crate::transport::TransportError;

#[derive(Debug, Error)]
pub enum IcsimError {
    #[error("Frame error: {0}")]
    Frame(#[from] FrameError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

pub type Result<T> = std::result::Result<T, IcsimError>;
