//! icsim-core - instrument cluster protocol engine
//!
//! Everything the simulated dashboard does on the bus: plain signal
//! decoding, the obfuscated shared-control word, and a small UDS server with
//! an ISO-TP sender and seed/key security access.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    DashboardEngine                          │
//! │                                                             │
//! │                    ┌─────────────┐                          │
//! │                    │ FrameRouter │                          │
//! │                    └──────┬──────┘                          │
//! │          ┌────────────────┼──────────────────┐              │
//! │  ┌───────┴───────┐ ┌──────┴───────┐ ┌────────┴────────┐     │
//! │  │SharedControl  │ │VehicleState  │ │UdsStateMachine  │     │
//! │  │Codec          │ │(signals)     │ │                 │     │
//! │  └───────────────┘ └──────────────┘ │ ┌─────────────┐ │     │
//! │                                     │ │SecurityGuard│ │     │
//! │  ┌───────────────┐ ┌──────────────┐ │ ├─────────────┤ │     │
//! │  │Challenge      │ │DoorCommander │ │ │IsoTpSender  │ │     │
//! │  │Registry       │ │              │ │ └─────────────┘ │     │
//! │  └───────────────┘ └──────────────┘ └─────────────────┘     │
//! └─────────────────────────────────────────────────────────────┘
//!                            │
//!                     ┌──────┴───────┐
//!                     │ BusTransport │
//!                     │(SocketCAN/   │
//!                     │ mock)        │
//!                     └──────────────┘
//! ```

pub mod challenge;
pub mod config;
pub mod control;
pub mod doors;
pub mod engine;
pub mod error;
pub mod frame;
pub mod isotp;
pub mod peers;
pub mod randomize;
pub mod router;
pub mod security;
pub mod transport;
pub mod uds;
pub mod vehicle;

pub use challenge::{Challenge, ChallengeRegistry};
pub use config::{ConfigError, IcsimConfig};
pub use control::{Rejected, SharedControlCodec, SharedControlEncoder, SharedControlFrame, TurnSignal};
pub use doors::DoorCommander;
pub use engine::DashboardEngine;
pub use error::{IcsimError, Result};
pub use frame::{BusFrame, FrameError};
pub use isotp::{IsoTpTransfer, IsoTpTransmitter};
pub use peers::{BodyControlModule, BusRelay, Segment};
pub use randomize::RandomizedLayout;
pub use router::{BusIds, FrameRouter, Route};
pub use security::{KeyRejected, SecurityAccessGuard, SecurityState};
pub use transport::{BusTransport, MockBus, TransportError};
pub use uds::{DiagnosticSession, NegativeResponseCode, UdsStateMachine};
pub use vehicle::{DashboardSnapshot, DoorState, SignalPositions, VehicleState};
