//! Diagnostic session levels

use serde::Serialize;

/// UDS diagnostic session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSession {
    /// Default session (0x01)
    #[default]
    Default,
    /// Programming session (0x02), also entered by a successful key
    Programming,
    /// Extended diagnostic session (0x03), required for security access
    Extended,
}

impl DiagnosticSession {
    pub fn from_sub_function(sub: u8) -> Option<Self> {
        match sub {
            0x01 => Some(Self::Default),
            0x02 => Some(Self::Programming),
            0x03 => Some(Self::Extended),
            _ => None,
        }
    }

    pub fn as_u8(self) -> u8 {
        match self {
            Self::Default => 0x01,
            Self::Programming => 0x02,
            Self::Extended => 0x03,
        }
    }
}
