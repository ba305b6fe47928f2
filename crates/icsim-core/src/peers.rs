//! Peer nodes that share the bus with the dashboard
//!
//! ```text
//!   segment A                 relay                 segment B
//!  +-----------+   0x123   +---------+   0x123   +-----------+
//!  | dashboard | --------> |         | --------> |    BCM    |
//!  |           | <-------- |         | <-------- |           |
//!  +-----------+   0x124   +---------+   0x124   +-----------+
//! ```

use tracing::{debug, trace};

use crate::frame::BusFrame;

/// Body controller: stores the last door command and echoes it as status
#[derive(Debug, Clone)]
pub struct BodyControlModule {
    command_id: u32,
    status_id: u32,
    door_state: u8,
}

impl BodyControlModule {
    pub fn new(command_id: u32, status_id: u32) -> Self {
        Self {
            command_id,
            status_id,
            door_state: 0,
        }
    }

    pub fn door_state(&self) -> u8 {
        self.door_state
    }

    /// Returns the status echo for a door command, `None` for anything else
    pub fn handle(&mut self, frame: &BusFrame) -> Option<BusFrame> {
        if frame.id() != self.command_id {
            return None;
        }
        let Some(bits) = frame.byte(0) else {
            trace!("Empty door command ignored");
            return None;
        };

        self.door_state = bits;
        debug!(mask = format!("0x{:02X}", bits), "Door command received");
        Some(BusFrame::classic(self.status_id, &[bits]))
    }
}

/// Side of the relay a frame arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Segment {
    A,
    B,
}

impl Segment {
    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

/// Two-segment forwarder for door traffic
///
/// Commands travel from A to B, status echoes from B to A. Everything else
/// stays on its own segment.
#[derive(Debug, Clone)]
pub struct BusRelay {
    command_id: u32,
    status_id: u32,
}

impl BusRelay {
    pub fn new(command_id: u32, status_id: u32) -> Self {
        Self {
            command_id,
            status_id,
        }
    }

    /// Destination segment for a frame, or `None` to drop it
    pub fn forward(&self, from: Segment, frame: &BusFrame) -> Option<Segment> {
        let forwarded = match from {
            Segment::A => frame.id() == self.command_id,
            Segment::B => frame.id() == self.status_id,
        };
        if forwarded {
            trace!(frame = %frame, from = ?from, "Relaying frame");
        }
        forwarded.then_some(from.other())
    }
}
