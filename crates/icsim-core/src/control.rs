//! Shared-control status word
//!
//! The control node publishes a 7-byte obfuscated status word on a reserved
//! identifier. Each frame carries a 16-bit seed split into two key bytes;
//! the receiver accepts only the seed following the last accepted one.
//!
//! ```text
//! byte  0      1           2      3         4               5     6
//!      flags  luminosity  speed  checksum  checksum^key1   key1  key2
//!      \_______________ XOR key2 _______________/
//! ```

use serde::Serialize;

use crate::frame::BusFrame;

/// Minimum number of bytes in a shared-control frame
pub const CONTROL_FRAME_LEN: usize = 7;

/// Bit layout of the flags byte
pub mod flag {
    pub const LIGHT_SHIFT: u8 = 6;
    pub const NIGHT_SHIFT: u8 = 5;
    pub const WARNING_SHIFT: u8 = 4;
    pub const DIAG_ON_SHIFT: u8 = 3;
    pub const DIAG_ACTIVE_SHIFT: u8 = 2;
    pub const TURN_MASK: u8 = 0x03;
}

const FLAGS: usize = 0;
const LUMINOSITY: usize = 1;
const SPEED: usize = 2;
const CHECKSUM: usize = 3;
const CHECK: usize = 4;
const KEY1: usize = 5;
const KEY2: usize = 6;

/// Turn indicator requested by the control node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TurnSignal {
    #[default]
    None,
    Left,
    Right,
    Both,
}

impl TurnSignal {
    fn from_bits(bits: u8) -> Self {
        match bits & flag::TURN_MASK {
            0 => Self::None,
            1 => Self::Left,
            2 => Self::Right,
            _ => Self::Both,
        }
    }

    fn bits(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Left => 1,
            Self::Right => 2,
            Self::Both => 3,
        }
    }
}

/// Decoded shared-control word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SharedControlFrame {
    pub light_on: bool,
    pub is_night: bool,
    pub warning_active: bool,
    pub diag_on: bool,
    pub diag_active: bool,
    pub turn: TurnSignal,
    pub luminosity: u8,
    pub speed: u8,
}

impl SharedControlFrame {
    /// Pack the boolean flags and turn bits into the flags byte
    pub fn pack_flags(&self) -> u8 {
        (self.light_on as u8) << flag::LIGHT_SHIFT
            | (self.is_night as u8) << flag::NIGHT_SHIFT
            | (self.warning_active as u8) << flag::WARNING_SHIFT
            | (self.diag_on as u8) << flag::DIAG_ON_SHIFT
            | (self.diag_active as u8) << flag::DIAG_ACTIVE_SHIFT
            | self.turn.bits()
    }

    /// Unpack a flags byte together with the luminosity and speed bytes
    pub fn unpack(flags: u8, luminosity: u8, speed: u8) -> Self {
        let bit = |shift: u8| (flags >> shift) & 0x01 == 1;
        Self {
            light_on: bit(flag::LIGHT_SHIFT),
            is_night: bit(flag::NIGHT_SHIFT),
            warning_active: bit(flag::WARNING_SHIFT),
            diag_on: bit(flag::DIAG_ON_SHIFT),
            diag_active: bit(flag::DIAG_ACTIVE_SHIFT),
            turn: TurnSignal::from_bits(flags),
            luminosity,
            speed,
        }
    }
}

/// Why a shared-control frame was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejected {
    /// Fewer than seven bytes
    TooShort,
    /// Seed is not the successor of the last accepted seed
    Replay { seed: u16, expected: u16 },
    /// Masked check byte does not match `checksum ^ key1`
    Integrity,
    /// Checksum does not match the unmasked payload bytes
    Checksum,
}

fn checksum(flags: u8, luminosity: u8, speed: u8) -> u8 {
    flags.wrapping_add(luminosity).wrapping_add(speed)
}

/// Stateful decoder holding the anti-replay cursor
#[derive(Debug, Clone, Default)]
pub struct SharedControlCodec {
    last_seed: Option<u16>,
}

impl SharedControlCodec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed of the last accepted frame
    pub fn last_seed(&self) -> Option<u16> {
        self.last_seed
    }

    /// Decode a frame, advancing the cursor only when every gate passes
    pub fn decode(&mut self, frame: &BusFrame) -> Result<SharedControlFrame, Rejected> {
        let data = frame.data();
        if data.len() < CONTROL_FRAME_LEN {
            return Err(Rejected::TooShort);
        }

        let key1 = data[KEY1];
        let key2 = data[KEY2];
        let seed = u16::from_be_bytes([key1, key2]);

        if let Some(last) = self.last_seed {
            let expected = last.wrapping_add(1);
            if seed != expected {
                return Err(Rejected::Replay { seed, expected });
            }
        }

        let mut word = [0u8; 5];
        for (unmasked, masked) in word.iter_mut().zip(&data[..=CHECK]) {
            *unmasked = masked ^ key2;
        }

        if word[CHECK] != word[CHECKSUM] ^ key1 {
            return Err(Rejected::Integrity);
        }

        if word[CHECKSUM] != checksum(word[FLAGS], word[LUMINOSITY], word[SPEED]) {
            return Err(Rejected::Checksum);
        }

        self.last_seed = Some(seed);
        Ok(SharedControlFrame::unpack(
            word[FLAGS],
            word[LUMINOSITY],
            word[SPEED],
        ))
    }

    /// Encode a control word under the given seed
    pub fn encode(id: u32, state: &SharedControlFrame, seed: u16) -> BusFrame {
        let [key1, key2] = seed.to_be_bytes();
        let flags = state.pack_flags();
        let sum = checksum(flags, state.luminosity, state.speed);

        let mut payload = [
            flags,
            state.luminosity,
            state.speed,
            sum,
            sum ^ key1,
            key1,
            key2,
        ];
        for byte in &mut payload[..=CHECK] {
            *byte ^= key2;
        }

        BusFrame::classic(id, &payload)
    }
}

/// Sender side: issues frames with consecutive seeds
#[derive(Debug, Clone)]
pub struct SharedControlEncoder {
    id: u32,
    next_seed: u16,
}

impl SharedControlEncoder {
    pub fn new(id: u32, first_seed: u16) -> Self {
        Self {
            id,
            next_seed: first_seed,
        }
    }

    pub fn next_frame(&mut self, state: &SharedControlFrame) -> BusFrame {
        let frame = SharedControlCodec::encode(self.id, state, self.next_seed);
        self.next_seed = self.next_seed.wrapping_add(1);
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ID: u32 = 0x3E9;

    fn sample() -> SharedControlFrame {
        SharedControlFrame {
            light_on: true,
            is_night: true,
            warning_active: false,
            diag_on: true,
            diag_active: false,
            turn: TurnSignal::Right,
            luminosity: 42,
            speed: 130,
        }
    }

    #[test]
    fn test_round_trip() {
        let mut codec = SharedControlCodec::new();
        let frame = SharedControlCodec::encode(ID, &sample(), 0x1234);
        assert_eq!(codec.decode(&frame), Ok(sample()));
        assert_eq!(codec.last_seed(), Some(0x1234));
    }

    #[test]
    fn test_flags_layout() {
        let state = sample();
        // light | night | diag_on | right
        assert_eq!(state.pack_flags(), 0b0110_1010);
        assert_eq!(SharedControlFrame::unpack(0b0110_1010, 42, 130), state);
    }

    #[test]
    fn test_wire_bytes_are_masked() {
        let frame = SharedControlCodec::encode(ID, &sample(), 0x0102);
        let data = frame.data();
        let sum = 0b0110_1010u8.wrapping_add(42).wrapping_add(130);
        assert_eq!(data[5], 0x01);
        assert_eq!(data[6], 0x02);
        assert_eq!(data[0], 0b0110_1010 ^ 0x02);
        assert_eq!(data[3], sum ^ 0x02);
        assert_eq!(data[4], (sum ^ 0x01) ^ 0x02);
    }

    #[test]
    fn test_accepts_only_successor_seed() {
        let mut codec = SharedControlCodec::new();
        let mut encoder = SharedControlEncoder::new(ID, 10);

        assert!(codec.decode(&encoder.next_frame(&sample())).is_ok());
        let replay = SharedControlCodec::encode(ID, &sample(), 10);
        assert_eq!(
            codec.decode(&replay),
            Err(Rejected::Replay {
                seed: 10,
                expected: 11
            })
        );
        let skipped = SharedControlCodec::encode(ID, &sample(), 12);
        assert!(codec.decode(&skipped).is_err());
        assert_eq!(codec.last_seed(), Some(10));

        assert!(codec.decode(&encoder.next_frame(&sample())).is_ok());
        assert_eq!(codec.last_seed(), Some(11));
    }

    #[test]
    fn test_seed_wraps() {
        let mut codec = SharedControlCodec::new();
        let mut encoder = SharedControlEncoder::new(ID, 0xFFFF);
        assert!(codec.decode(&encoder.next_frame(&sample())).is_ok());
        assert!(codec.decode(&encoder.next_frame(&sample())).is_ok());
        assert_eq!(codec.last_seed(), Some(0x0000));
    }

    #[test]
    fn test_corrupted_check_byte_is_rejected() {
        let mut codec = SharedControlCodec::new();
        let frame = SharedControlCodec::encode(ID, &sample(), 7);
        let mut data = frame.data().to_vec();
        data[4] ^= 0x80;
        let tampered = BusFrame::new(ID, &data).unwrap();

        assert_eq!(codec.decode(&tampered), Err(Rejected::Integrity));
        assert_eq!(codec.last_seed(), None);
    }

    #[test]
    fn test_corrupted_payload_fails_checksum() {
        let mut codec = SharedControlCodec::new();
        let frame = SharedControlCodec::encode(ID, &sample(), 7);
        let mut data = frame.data().to_vec();
        data[2] ^= 0x01;
        let tampered = BusFrame::new(ID, &data).unwrap();

        assert_eq!(codec.decode(&tampered), Err(Rejected::Checksum));
        assert_eq!(codec.last_seed(), None);
    }

    #[test]
    fn test_short_frame_is_rejected() {
        let mut codec = SharedControlCodec::new();
        let frame = BusFrame::new(ID, &[0; 6]).unwrap();
        assert_eq!(codec.decode(&frame), Err(Rejected::TooShort));
    }
}
