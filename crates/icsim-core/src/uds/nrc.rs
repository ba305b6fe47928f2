//! Negative response codes emitted by the cluster's diagnostic server

use std::fmt;

/// Third byte of a `0x7F` reply
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NegativeResponseCode {
    // Format NRCs
    ServiceNotSupported,
    SubFunctionNotSupported,
    IncorrectMessageLengthOrFormat,

    /// Key sent without a pending seed
    RequestSequenceError,

    // Request NRCs
    RequestOutOfRange,
    InvalidKey,

    /// Service or routine not allowed in the active session
    FunctionIncorrectSession,

    Unknown(u8),
}

impl NegativeResponseCode {
    pub fn as_byte(self) -> u8 {
        self.into()
    }

    /// Short description used in logs
    pub fn description(self) -> &'static str {
        match self {
            Self::ServiceNotSupported => "service not supported",
            Self::SubFunctionNotSupported => "sub-function not supported",
            Self::IncorrectMessageLengthOrFormat => "incorrect message length",
            Self::RequestSequenceError => "request sequence error",
            Self::RequestOutOfRange => "request out of range",
            Self::InvalidKey => "invalid key",
            Self::FunctionIncorrectSession => "not supported in active session",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl From<u8> for NegativeResponseCode {
    fn from(value: u8) -> Self {
        match value {
            0x11 => Self::ServiceNotSupported,
            0x12 => Self::SubFunctionNotSupported,
            0x13 => Self::IncorrectMessageLengthOrFormat,
            0x24 => Self::RequestSequenceError,
            0x31 => Self::RequestOutOfRange,
            0x35 => Self::InvalidKey,
            0x7F => Self::FunctionIncorrectSession,
            other => Self::Unknown(other),
        }
    }
}

impl From<NegativeResponseCode> for u8 {
    fn from(nrc: NegativeResponseCode) -> Self {
        match nrc {
            NegativeResponseCode::ServiceNotSupported => 0x11,
            NegativeResponseCode::SubFunctionNotSupported => 0x12,
            NegativeResponseCode::IncorrectMessageLengthOrFormat => 0x13,
            NegativeResponseCode::RequestSequenceError => 0x24,
            NegativeResponseCode::RequestOutOfRange => 0x31,
            NegativeResponseCode::InvalidKey => 0x35,
            NegativeResponseCode::FunctionIncorrectSession => 0x7F,
            NegativeResponseCode::Unknown(byte) => byte,
        }
    }
}

impl fmt::Display for NegativeResponseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.description(), self.as_byte())
    }
}
