//! Bus frame: the wire unit exchanged with every peer on the bus

use std::fmt;

use thiserror::Error;

/// Maximum payload of a classic CAN frame
pub const CAN_MAX_DLEN: usize = 8;

/// Maximum payload of a CAN FD frame
pub const CANFD_MAX_DLEN: usize = 64;

/// Largest 11-bit identifier
pub const STANDARD_ID_MAX: u32 = 0x7FF;

/// Largest 29-bit identifier
pub const EXTENDED_ID_MAX: u32 = 0x1FFF_FFFF;

/// Frame construction errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("Payload of {0} bytes exceeds the 64-byte CAN FD limit")]
    TooLong(usize),

    #[error("Identifier 0x{0:X} does not fit in 29 bits")]
    InvalidId(u32),
}

/// A single CAN or CAN FD frame
///
/// Only `data[..len]` is ever exposed; the remainder of the buffer is padding.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct BusFrame {
    id: u32,
    len: u8,
    data: [u8; CANFD_MAX_DLEN],
}

impl BusFrame {
    /// Build a frame from an identifier and payload
    pub fn new(id: u32, payload: &[u8]) -> Result<Self, FrameError> {
        if id > EXTENDED_ID_MAX {
            return Err(FrameError::InvalidId(id));
        }
        if payload.len() > CANFD_MAX_DLEN {
            return Err(FrameError::TooLong(payload.len()));
        }

        let mut data = [0u8; CANFD_MAX_DLEN];
        data[..payload.len()].copy_from_slice(payload);

        Ok(Self {
            id,
            len: payload.len() as u8,
            data,
        })
    }

    /// Build a frame from a payload known to fit a classic frame
    ///
    /// Used internally for responses whose size is fixed by construction.
    pub(crate) fn classic(id: u32, payload: &[u8]) -> Self {
        let len = payload.len().min(CAN_MAX_DLEN);
        let mut data = [0u8; CANFD_MAX_DLEN];
        data[..len].copy_from_slice(&payload[..len]);
        Self {
            id: id & EXTENDED_ID_MAX,
            len: len as u8,
            data,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Payload bytes actually carried by the frame
    pub fn data(&self) -> &[u8] {
        &self.data[..self.len as usize]
    }

    /// Byte at `index`, or `None` when the frame is too short
    pub fn byte(&self, index: usize) -> Option<u8> {
        self.data().get(index).copied()
    }

    /// True when the payload does not fit a classic frame
    pub fn is_fd(&self) -> bool {
        self.len() > CAN_MAX_DLEN
    }

    /// True when the identifier needs 29 bits
    pub fn is_extended(&self) -> bool {
        self.id > STANDARD_ID_MAX
    }
}

impl fmt::Debug for BusFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BusFrame(0x{:03X} [{}]", self.id, self.len)?;
        for byte in self.data() {
            write!(f, " {:02X}", byte)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for BusFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:03X}#", self.id)?;
        for byte in self.data() {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_is_bounded_by_length() {
        let frame = BusFrame::new(0x244, &[0x00, 0x01, 0x02]).unwrap();
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.data(), &[0x00, 0x01, 0x02]);
        assert_eq!(frame.byte(2), Some(0x02));
        assert_eq!(frame.byte(3), None);
        assert!(!frame.is_fd());
    }

    #[test]
    fn test_fd_payload() {
        let payload = [0xAA; 48];
        let frame = BusFrame::new(0x123, &payload).unwrap();
        assert!(frame.is_fd());
        assert_eq!(frame.data().len(), 48);
    }

    #[test]
    fn test_rejects_oversized_payload() {
        let payload = [0u8; 65];
        assert_eq!(
            BusFrame::new(0x123, &payload),
            Err(FrameError::TooLong(65))
        );
    }

    #[test]
    fn test_rejects_wide_identifier() {
        assert_eq!(
            BusFrame::new(0x2000_0000, &[]),
            Err(FrameError::InvalidId(0x2000_0000))
        );
        assert!(BusFrame::new(0x18DA_F100, &[]).unwrap().is_extended());
    }

    #[test]
    fn test_display_matches_candump_notation() {
        let frame = BusFrame::new(0x7E8, &[0x03, 0x7F, 0x11, 0x31]).unwrap();
        assert_eq!(frame.to_string(), "7E8#037F1131");
    }
}
