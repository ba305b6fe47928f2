//! Dashboard-side door lock commands

use tracing::info;

use crate::frame::BusFrame;

/// Door bits as carried in the command byte
pub mod door_bit {
    pub const DOOR1: u8 = 0x01;
    pub const DOOR2: u8 = 0x02;
    pub const DOOR3: u8 = 0x04;
    pub const DOOR4: u8 = 0x08;
    pub const ALL: u8 = DOOR1 | DOOR2 | DOOR3 | DOOR4;
}

/// Keeps the requested lock mask and turns changes into command frames
///
/// In the command mask a set bit means "locked".
#[derive(Debug, Clone)]
pub struct DoorCommander {
    command_id: u32,
    locked: u8,
}

impl DoorCommander {
    pub fn new(command_id: u32) -> Self {
        Self {
            command_id,
            locked: 0,
        }
    }

    pub fn set_command_id(&mut self, command_id: u32) {
        self.command_id = command_id;
    }

    /// Current lock mask
    pub fn mask(&self) -> u8 {
        self.locked
    }

    pub fn lock(&mut self, bits: u8) -> BusFrame {
        self.locked |= bits;
        info!(mask = format!("0x{:02X}", self.locked), "Door lock command");
        self.command()
    }

    pub fn unlock(&mut self, bits: u8) -> BusFrame {
        self.locked &= !bits;
        info!(mask = format!("0x{:02X}", self.locked), "Door unlock command");
        self.command()
    }

    fn command(&self) -> BusFrame {
        BusFrame::classic(self.command_id, &[self.locked])
    }
}
