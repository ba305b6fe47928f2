//! UDS (ISO 14229) diagnostic service of the cluster

mod machine;
mod nrc;
mod session;

pub use machine::{UdsEvent, UdsReply, UdsStateMachine, DEFAULT_SESSION_TIMEOUT, ECU_NAME, VIN};
pub use nrc::NegativeResponseCode;
pub use session::DiagnosticSession;

/// Service identifiers understood by the cluster
pub mod service_id {
    pub const CURRENT_DATA: u8 = 0x01;
    pub const VEHICLE_INFO: u8 = 0x09;
    pub const DIAGNOSTIC_SESSION_CONTROL: u8 = 0x10;
    pub const ECU_RESET: u8 = 0x11;
    pub const SECURITY_ACCESS: u8 = 0x27;
    pub const ROUTINE_CONTROL: u8 = 0x31;
    pub const TESTER_PRESENT: u8 = 0x3E;
    pub const NEGATIVE_RESPONSE: u8 = 0x7F;
}

/// OBD parameter identifiers
pub mod pid {
    pub const VEHICLE_SPEED: u8 = 0x0D;
    pub const VIN: u8 = 0x02;
    pub const ECU_NAME: u8 = 0x0A;
}

/// RoutineControl constants
pub mod routine {
    /// The only sub-function accepted
    pub const SUB_FUNCTION: u8 = 0x41;
    /// Diagnostic light, level equals the value
    pub const DIAGNOSTIC_LIGHT: u8 = 0x10;
    /// Hazard routine, level is twice the value
    pub const HAZARD: u8 = 0x22;
    pub const STOP: u8 = 0x00;
    pub const START: u8 = 0x01;
}

/// Build a single-frame positive response: `[len, sid + 0x40, data...]`
pub fn positive_response(sid: u8, data: &[u8]) -> Vec<u8> {
    let mut response = Vec::with_capacity(data.len() + 2);
    response.push(data.len() as u8 + 1);
    response.push(sid.wrapping_add(0x40));
    response.extend_from_slice(data);
    response
}

/// Build a single-frame negative response: `[0x03, 0x7F, sid, nrc]`
pub fn negative_response(sid: u8, nrc: NegativeResponseCode) -> Vec<u8> {
    tracing::debug!(sid = format!("0x{:02X}", sid), nrc = %nrc, "Negative response");
    vec![0x03, service_id::NEGATIVE_RESPONSE, sid, nrc.as_byte()]
}
