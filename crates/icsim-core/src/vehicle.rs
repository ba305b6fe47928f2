//! Plain signal decoders and the presentation snapshot

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::challenge::Challenge;
use crate::control::{SharedControlFrame, TurnSignal};
use crate::frame::BusFrame;
use crate::uds::DiagnosticSession;

/// Speed at which the gauge tops out
pub const MAX_SPEED: u16 = 220;

/// Luminosity above which night driving counts as spoofed
pub const LIGHT_LEVEL: u8 = 50;

/// Number of doors on the cluster
pub const DOOR_COUNT: usize = 4;

/// Indicator bits in the signal byte
pub const LEFT_SIGNAL: u8 = 0x01;
pub const RIGHT_SIGNAL: u8 = 0x02;

/// Byte offsets of each plain signal within its frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignalPositions {
    pub door: usize,
    pub signal: usize,
    pub speed: usize,
    pub warning: usize,
    pub light: usize,
    pub luminosity: usize,
}

impl Default for SignalPositions {
    fn default() -> Self {
        Self {
            door: 2,
            signal: 0,
            speed: 3,
            warning: 0,
            light: 0,
            luminosity: 0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DoorState {
    #[default]
    Locked,
    Unlocked,
}

/// State driven by the plain signal streams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct VehicleState {
    pub door_status: [DoorState; DOOR_COUNT],
    /// Left and right indicator
    pub turn_status: [bool; 2],
    pub luminosity: u8,
    /// km/h
    pub speed: u16,
    pub warning: bool,
    pub light: bool,
}

impl VehicleState {
    /// Apply a door bitmask; a set bit means the door is unlocked
    pub fn apply_door_bits(&mut self, bits: u8) {
        for (n, door) in self.door_status.iter_mut().enumerate() {
            *door = if bits & (1 << n) != 0 {
                DoorState::Unlocked
            } else {
                DoorState::Locked
            };
        }
    }

    /// Door bitmask echoed by the body controller
    pub fn decode_door_status(&mut self, frame: &BusFrame) -> bool {
        match frame.byte(0) {
            Some(bits) => {
                self.apply_door_bits(bits);
                true
            }
            None => {
                trace!("Empty door status frame");
                false
            }
        }
    }

    /// Legacy door frame carrying the bitmask at a configurable position
    pub fn decode_door(&mut self, frame: &BusFrame, pos: usize) -> bool {
        match frame.byte(pos) {
            Some(bits) => {
                self.apply_door_bits(bits);
                true
            }
            None => false,
        }
    }

    pub fn decode_signal(
        &mut self,
        frame: &BusFrame,
        pos: usize,
        control: &SharedControlFrame,
    ) -> Option<Challenge> {
        let byte = frame.byte(pos)?;
        self.turn_status = [byte & LEFT_SIGNAL != 0, byte & RIGHT_SIGNAL != 0];

        let lit = self.turn_status[0] || self.turn_status[1];
        (lit && !control.warning_active && control.turn == TurnSignal::None)
            .then_some(Challenge::TurnSignals)
    }

    /// Big-endian hundredths of km/h
    pub fn decode_speed(&mut self, frame: &BusFrame, pos: usize) -> Option<Challenge> {
        let high = frame.byte(pos)?;
        let low = frame.byte(pos + 1)?;
        self.speed = u16::from_be_bytes([high, low]) / 100;

        (self.speed >= MAX_SPEED).then_some(Challenge::SpoofSpeed)
    }

    pub fn decode_warning(&mut self, frame: &BusFrame, pos: usize) -> bool {
        let Some(byte) = frame.byte(pos) else {
            return false;
        };
        self.warning = byte & 0x01 != 0;
        true
    }

    pub fn decode_light(&mut self, frame: &BusFrame, pos: usize) -> bool {
        let Some(byte) = frame.byte(pos) else {
            return false;
        };
        self.light = byte & 0x01 != 0;
        true
    }

    pub fn decode_luminosity(
        &mut self,
        frame: &BusFrame,
        pos: usize,
        control: &SharedControlFrame,
    ) -> Option<Challenge> {
        self.luminosity = frame.byte(pos)?;
        (control.is_night && self.luminosity > LIGHT_LEVEL).then_some(Challenge::SpoofLight)
    }
}

/// Everything a renderer needs to draw the cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DashboardSnapshot {
    pub door_status: [DoorState; DOOR_COUNT],
    pub turn_status: [bool; 2],
    pub luminosity: u8,
    pub speed: u16,
    pub warning_state: bool,
    pub light_status: bool,
    pub diag_session: DiagnosticSession,
    pub diag_active: u8,
    pub secret_session_found: bool,
    pub score: u32,
    pub control: SharedControlFrame,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(id: u32, data: &[u8]) -> BusFrame {
        BusFrame::new(id, data).unwrap()
    }

    #[test]
    fn test_door_bits_set_means_unlocked() {
        let mut state = VehicleState::default();
        assert!(state.decode_door_status(&frame(0x124, &[0b0101])));
        assert_eq!(
            state.door_status,
            [
                DoorState::Unlocked,
                DoorState::Locked,
                DoorState::Unlocked,
                DoorState::Locked
            ]
        );
        assert!(!state.decode_door_status(&frame(0x124, &[])));
    }

    #[test]
    fn test_legacy_door_position() {
        let mut state = VehicleState::default();
        assert!(!state.decode_door(&frame(0x19B, &[0x00, 0x00]), 2));
        assert!(state.decode_door(&frame(0x19B, &[0x00, 0x00, 0x0F]), 2));
        assert_eq!(state.door_status, [DoorState::Unlocked; DOOR_COUNT]);
    }

    #[test]
    fn test_speed_decoding() {
        let mut state = VehicleState::default();
        // 12000 / 100 = 120 km/h
        assert_eq!(state.decode_speed(&frame(0x244, &[0, 0, 0, 0x2E, 0xE0]), 3), None);
        assert_eq!(state.speed, 120);
        // 22000 / 100 = 220 km/h
        assert_eq!(
            state.decode_speed(&frame(0x244, &[0, 0, 0, 0x55, 0xF0]), 3),
            Some(Challenge::SpoofSpeed)
        );
        assert_eq!(state.speed, 220);
    }

    #[test]
    fn test_short_speed_frame_is_ignored() {
        let mut state = VehicleState::default();
        assert_eq!(state.decode_speed(&frame(0x244, &[0, 0, 0, 0x55]), 3), None);
        assert_eq!(state.speed, 0);
    }

    #[test]
    fn test_turn_signal_challenge_needs_quiet_control() {
        let mut state = VehicleState::default();
        let quiet = SharedControlFrame::default();
        assert_eq!(
            state.decode_signal(&frame(0x188, &[LEFT_SIGNAL]), 0, &quiet),
            Some(Challenge::TurnSignals)
        );
        assert_eq!(state.turn_status, [true, false]);

        let turning = SharedControlFrame {
            turn: TurnSignal::Left,
            ..SharedControlFrame::default()
        };
        assert_eq!(state.decode_signal(&frame(0x188, &[LEFT_SIGNAL]), 0, &turning), None);

        let hazard = SharedControlFrame {
            warning_active: true,
            ..SharedControlFrame::default()
        };
        assert_eq!(state.decode_signal(&frame(0x188, &[0x03]), 0, &hazard), None);
        assert_eq!(state.turn_status, [true, true]);

        assert_eq!(state.decode_signal(&frame(0x188, &[0x00]), 0, &quiet), None);
        assert_eq!(state.turn_status, [false, false]);
    }

    #[test]
    fn test_luminosity_challenge_only_at_night() {
        let mut state = VehicleState::default();
        let day = SharedControlFrame::default();
        let night = SharedControlFrame {
            is_night: true,
            ..SharedControlFrame::default()
        };
        assert_eq!(state.decode_luminosity(&frame(0x1A2, &[200]), 0, &day), None);
        assert_eq!(state.decode_luminosity(&frame(0x1A2, &[50]), 0, &night), None);
        assert_eq!(
            state.decode_luminosity(&frame(0x1A2, &[51]), 0, &night),
            Some(Challenge::SpoofLight)
        );
        assert_eq!(state.luminosity, 51);
    }

    #[test]
    fn test_warning_and_light_use_bit_zero() {
        let mut state = VehicleState::default();
        assert!(state.decode_warning(&frame(0x1A0, &[0xFE]), 0));
        assert!(!state.warning);
        assert!(state.decode_light(&frame(0x1A1, &[0x01]), 0));
        assert!(state.light);
        assert!(!state.decode_light(&frame(0x1A1, &[]), 0));
    }
}
