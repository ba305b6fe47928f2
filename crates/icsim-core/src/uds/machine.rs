//! Diagnostic session and service dispatcher

use std::time::Duration;

use tracing::{debug, info, trace};

use super::{
    negative_response, pid, positive_response, routine, service_id, DiagnosticSession,
    NegativeResponseCode as Nrc,
};
use crate::frame::BusFrame;
use crate::isotp::{is_flow_control, IsoTpTransmitter, Progress};
use crate::security::{KeyRejected, SecurityAccessGuard};

/// Session drops back to default without tester present for this long
pub const DEFAULT_SESSION_TIMEOUT: Duration = Duration::from_millis(3500);

/// Vehicle identification number served over ISO-TP
pub const VIN: &[u8; 17] = b"1HGCM82633A004352";

/// ECU name served by vehicle info PID 0x0A
pub const ECU_NAME: &[u8; 3] = b"ECU";

/// Noteworthy outcomes the owner may want to score or display
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UdsEvent {
    /// Hazard routine was started or stopped
    HazardRoutine,
    /// Security access granted
    SecurityUnlocked,
    /// Last consecutive frame of the VIN went out
    VinDelivered,
}

/// One frame to send back plus an optional event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UdsReply {
    pub frame: BusFrame,
    pub event: Option<UdsEvent>,
}

impl UdsReply {
    fn plain(frame: BusFrame) -> Self {
        Self { frame, event: None }
    }
}

/// UDS server state of the cluster
#[derive(Debug)]
pub struct UdsStateMachine {
    response_id: u32,
    session: DiagnosticSession,
    security: SecurityAccessGuard,
    isotp: IsoTpTransmitter,
    last_tester_present: Duration,
    session_timeout: Duration,
    diag_active: u8,
    secret_session_found: bool,
}

impl UdsStateMachine {
    pub fn new(
        response_id: u32,
        security: SecurityAccessGuard,
        isotp: IsoTpTransmitter,
        session_timeout: Duration,
    ) -> Self {
        Self {
            response_id,
            session: DiagnosticSession::Default,
            security,
            isotp,
            last_tester_present: Duration::ZERO,
            session_timeout,
            diag_active: 0,
            secret_session_found: false,
        }
    }

    pub fn session(&self) -> DiagnosticSession {
        self.session
    }

    pub fn security(&self) -> &SecurityAccessGuard {
        &self.security
    }

    pub fn isotp(&self) -> &IsoTpTransmitter {
        &self.isotp
    }

    pub fn diag_active(&self) -> u8 {
        self.diag_active
    }

    pub fn secret_session_found(&self) -> bool {
        self.secret_session_found
    }

    pub fn last_tester_present(&self) -> Duration {
        self.last_tester_present
    }

    pub fn set_response_id(&mut self, response_id: u32) {
        self.response_id = response_id;
        self.isotp.set_response_id(response_id);
    }

    /// Handle one frame received on a diagnostic address
    ///
    /// `speed` is the current control-word speed reported by PID 0x0D.
    /// Returns `None` for flow control and for frames dropped at the
    /// transport level.
    pub fn handle_request(&mut self, data: &[u8], now: Duration, speed: u8) -> Option<UdsReply> {
        let pci = *data.first()?;

        if is_flow_control(pci) {
            self.isotp.on_flow_control(now);
            return None;
        }

        let length = pci as usize;
        if !(1..=8).contains(&length) {
            trace!(pci = format!("0x{:02X}", pci), "Dropping non single-frame request");
            return None;
        }
        if length >= data.len() {
            trace!(
                pci = length,
                carried = data.len(),
                "Dropping request shorter than its PCI length"
            );
            return None;
        }

        let request = &data[1..=length];
        let sid = request[0];

        let reply = match sid {
            service_id::CURRENT_DATA => self.handle_current_data(request, speed),
            service_id::VEHICLE_INFO => return Some(self.handle_vehicle_info(request, now)),
            service_id::TESTER_PRESENT => self.handle_tester_present(request, now),
            service_id::DIAGNOSTIC_SESSION_CONTROL => self.handle_session_control(request, now),
            service_id::ECU_RESET => self.handle_ecu_reset(request),
            service_id::ROUTINE_CONTROL => return Some(self.handle_routine_control(request)),
            service_id::SECURITY_ACCESS => return Some(self.handle_security_access(request)),
            _ => {
                debug!(sid = format!("0x{:02X}", sid), "Service not supported");
                negative_response(sid, Nrc::ServiceNotSupported)
            }
        };

        Some(UdsReply::plain(self.frame(&reply)))
    }

    /// Demote to the default session when the tester has gone quiet
    ///
    /// Returns true when the session was dropped.
    pub fn check_session_timeout(&mut self, now: Duration) -> bool {
        if self.session == DiagnosticSession::Default {
            return false;
        }
        if now.saturating_sub(self.last_tester_present) <= self.session_timeout {
            return false;
        }

        info!(
            session = format!("0x{:02X}", self.session.as_u8()),
            "Tester present timeout, returning to default session"
        );
        self.session = DiagnosticSession::Default;
        self.security.lock();
        self.diag_active = 0;
        self.secret_session_found = false;
        true
    }

    /// Send the next consecutive frame of a pending multi-frame response
    pub fn continue_transfer(&mut self, now: Duration) -> Option<UdsReply> {
        match self.isotp.continue_transfer(now) {
            Progress::Sent { frame, complete } => Some(UdsReply {
                frame,
                event: complete.then_some(UdsEvent::VinDelivered),
            }),
            Progress::Idle | Progress::TimedOut => None,
        }
    }

    fn frame(&self, payload: &[u8]) -> BusFrame {
        BusFrame::classic(self.response_id, payload)
    }

    fn accept(&self, sid: u8, data: &[u8]) -> UdsReply {
        UdsReply::plain(self.frame(&positive_response(sid, data)))
    }

    fn reject(&self, sid: u8, nrc: Nrc) -> UdsReply {
        UdsReply::plain(self.frame(&negative_response(sid, nrc)))
    }

    fn handle_current_data(&self, request: &[u8], speed: u8) -> Vec<u8> {
        if request.len() != 2 {
            return negative_response(service_id::CURRENT_DATA, Nrc::IncorrectMessageLengthOrFormat);
        }

        if request[1] == pid::VEHICLE_SPEED {
            debug!(speed, "Current speed requested");
            positive_response(service_id::CURRENT_DATA, &[pid::VEHICLE_SPEED, speed])
        } else {
            negative_response(service_id::CURRENT_DATA, Nrc::SubFunctionNotSupported)
        }
    }

    fn handle_vehicle_info(&mut self, request: &[u8], now: Duration) -> UdsReply {
        if request.len() != 2 {
            return self.reject(service_id::VEHICLE_INFO, Nrc::IncorrectMessageLengthOrFormat);
        }

        match request[1] {
            pid::ECU_NAME => {
                let mut data = vec![pid::ECU_NAME];
                data.extend_from_slice(ECU_NAME);
                UdsReply::plain(self.isotp.begin(service_id::VEHICLE_INFO, &data, now))
            }
            pid::VIN => {
                debug!("VIN requested");
                UdsReply::plain(self.isotp.begin(service_id::VEHICLE_INFO, VIN, now))
            }
            _ => self.reject(service_id::VEHICLE_INFO, Nrc::SubFunctionNotSupported),
        }
    }

    fn handle_tester_present(&mut self, request: &[u8], now: Duration) -> Vec<u8> {
        if request.len() != 2 {
            return negative_response(service_id::TESTER_PRESENT, Nrc::IncorrectMessageLengthOrFormat);
        }

        trace!("Tester present");
        self.last_tester_present = now;
        positive_response(service_id::TESTER_PRESENT, &[request[1]])
    }

    fn handle_session_control(&mut self, request: &[u8], now: Duration) -> Vec<u8> {
        if request.len() != 2 {
            return negative_response(
                service_id::DIAGNOSTIC_SESSION_CONTROL,
                Nrc::IncorrectMessageLengthOrFormat,
            );
        }

        let sub = request[1];
        let Some(session) = DiagnosticSession::from_sub_function(sub) else {
            return negative_response(
                service_id::DIAGNOSTIC_SESSION_CONTROL,
                Nrc::SubFunctionNotSupported,
            );
        };

        info!(session = format!("0x{:02X}", sub), "Session control request");
        self.session = session;
        self.security.lock();
        self.secret_session_found = false;
        self.last_tester_present = now;
        if session == DiagnosticSession::Default {
            self.diag_active = 0;
        }

        positive_response(service_id::DIAGNOSTIC_SESSION_CONTROL, &[sub])
    }

    fn handle_ecu_reset(&mut self, request: &[u8]) -> Vec<u8> {
        if request.len() != 2 {
            return negative_response(service_id::ECU_RESET, Nrc::IncorrectMessageLengthOrFormat);
        }

        let sub = request[1];
        if !(1..=3).contains(&sub) {
            return negative_response(service_id::ECU_RESET, Nrc::RequestOutOfRange);
        }

        info!(reset_type = sub, "ECU reset");
        self.session = DiagnosticSession::Default;
        self.security.lock();
        self.diag_active = 0;
        self.secret_session_found = false;

        positive_response(service_id::ECU_RESET, &[sub])
    }

    fn handle_routine_control(&mut self, request: &[u8]) -> UdsReply {
        if request.len() != 4 {
            return self.reject(service_id::ROUTINE_CONTROL, Nrc::IncorrectMessageLengthOrFormat);
        }
        if self.session != DiagnosticSession::Programming {
            return self.reject(service_id::ROUTINE_CONTROL, Nrc::FunctionIncorrectSession);
        }

        let (sub, routine_id, value) = (request[1], request[2], request[3]);
        if sub != routine::SUB_FUNCTION {
            return self.reject(service_id::ROUTINE_CONTROL, Nrc::SubFunctionNotSupported);
        }
        if routine_id != routine::DIAGNOSTIC_LIGHT && routine_id != routine::HAZARD {
            return self.reject(service_id::ROUTINE_CONTROL, Nrc::RequestOutOfRange);
        }
        if value != routine::STOP && value != routine::START {
            return self.reject(service_id::ROUTINE_CONTROL, Nrc::RequestOutOfRange);
        }

        let event = if routine_id == routine::HAZARD {
            self.diag_active = value * 2;
            Some(UdsEvent::HazardRoutine)
        } else {
            self.diag_active = value;
            None
        };
        info!(
            routine = format!("0x{:02X}", routine_id),
            value,
            "Routine control"
        );

        UdsReply {
            frame: self.frame(&positive_response(
                service_id::ROUTINE_CONTROL,
                &[sub, routine_id, value],
            )),
            event,
        }
    }

    fn handle_security_access(&mut self, request: &[u8]) -> UdsReply {
        if self.session != DiagnosticSession::Extended {
            return self.reject(service_id::SECURITY_ACCESS, Nrc::FunctionIncorrectSession);
        }
        if request.len() != 2 && request.len() != 4 {
            return self.reject(service_id::SECURITY_ACCESS, Nrc::IncorrectMessageLengthOrFormat);
        }

        match (request[1], request.len()) {
            (0x01, 2) => {
                let seed = self.security.request_seed();
                self.accept(service_id::SECURITY_ACCESS, &[0x01, seed[0], seed[1]])
            }
            (0x02, 4) => match self.security.submit_key([request[2], request[3]]) {
                Ok(()) => {
                    info!("Security access unlocked, entering programming session");
                    self.session = DiagnosticSession::Programming;
                    self.secret_session_found = true;
                    UdsReply {
                        frame: self.frame(&positive_response(service_id::SECURITY_ACCESS, &[0x02])),
                        event: Some(UdsEvent::SecurityUnlocked),
                    }
                }
                Err(KeyRejected::NoSeed) => {
                    self.reject(service_id::SECURITY_ACCESS, Nrc::RequestSequenceError)
                }
                Err(KeyRejected::InvalidKey) => {
                    self.reject(service_id::SECURITY_ACCESS, Nrc::InvalidKey)
                }
            },
            (0x01 | 0x02, _) => {
                self.reject(service_id::SECURITY_ACCESS, Nrc::IncorrectMessageLengthOrFormat)
            }
            _ => self.reject(service_id::SECURITY_ACCESS, Nrc::SubFunctionNotSupported),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::isotp::DEFAULT_ISOTP_TIMEOUT;
    use crate::security::{SecurityState, DEFAULT_SESSION_KEY};
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn machine() -> UdsStateMachine {
        UdsStateMachine::new(
            0x7E8,
            SecurityAccessGuard::new(DEFAULT_SESSION_KEY, StdRng::seed_from_u64(42)),
            IsoTpTransmitter::new(0x7E8, DEFAULT_ISOTP_TIMEOUT),
            DEFAULT_SESSION_TIMEOUT,
        )
    }

    fn ms(value: u64) -> Duration {
        Duration::from_millis(value)
    }

    fn send(uds: &mut UdsStateMachine, data: &[u8], now: u64) -> Vec<u8> {
        uds.handle_request(data, ms(now), 0)
            .map(|reply| reply.frame.data().to_vec())
            .unwrap_or_default()
    }

    #[test]
    fn test_speed_request() {
        let mut uds = machine();
        let reply = uds.handle_request(&[0x02, 0x01, 0x0D], ms(0), 88).unwrap();
        assert_eq!(reply.frame.id(), 0x7E8);
        assert_eq!(reply.frame.data(), &[0x03, 0x41, 0x0D, 88]);
        assert_eq!(send(&mut uds, &[0x02, 0x01, 0x0C], 0), vec![0x03, 0x7F, 0x01, 0x12]);
    }

    #[test]
    fn test_ecu_name() {
        let mut uds = machine();
        assert_eq!(
            send(&mut uds, &[0x02, 0x09, 0x0A], 0),
            vec![0x05, 0x49, 0x0A, b'E', b'C', b'U']
        );
    }

    #[test]
    fn test_incorrect_length_before_sub_function() {
        let mut uds = machine();
        assert_eq!(send(&mut uds, &[0x03, 0x11, 0x00, 0x00], 0), vec![0x03, 0x7F, 0x11, 0x13]);
        assert_eq!(send(&mut uds, &[0x01, 0x10], 0), vec![0x03, 0x7F, 0x10, 0x13]);
    }

    #[test]
    fn test_ecu_reset_out_of_range() {
        let mut uds = machine();
        assert_eq!(send(&mut uds, &[0x02, 0x11, 0x00], 0), vec![0x03, 0x7F, 0x11, 0x31]);
        assert_eq!(send(&mut uds, &[0x02, 0x11, 0x04], 0), vec![0x03, 0x7F, 0x11, 0x31]);
        assert_eq!(send(&mut uds, &[0x02, 0x11, 0x01], 0), vec![0x02, 0x51, 0x01]);
    }

    #[test]
    fn test_negative_responses() {
        let cases: [(&[u8], [u8; 4]); 7] = [
            // Unsupported session
            (&[0x02, 0x10, 0x04], [0x03, 0x7F, 0x10, 0x12]),
            // Tester present with an extra byte
            (&[0x03, 0x3E, 0x00, 0x00], [0x03, 0x7F, 0x3E, 0x13]),
            (&[0x01, 0x3E], [0x03, 0x7F, 0x3E, 0x13]),
            // Unknown vehicle info PID
            (&[0x02, 0x09, 0x05], [0x03, 0x7F, 0x09, 0x12]),
            // Current data with the wrong length
            (&[0x03, 0x01, 0x0D, 0x00], [0x03, 0x7F, 0x01, 0x13]),
            (&[0x01, 0x01], [0x03, 0x7F, 0x01, 0x13]),
            // Session control with the wrong length
            (&[0x03, 0x10, 0x03, 0x00], [0x03, 0x7F, 0x10, 0x13]),
        ];

        for (request, expected) in cases {
            let mut uds = machine();
            assert_eq!(
                send(&mut uds, request, 0),
                expected.to_vec(),
                "request {:02X?}",
                request
            );
            assert_eq!(uds.session(), DiagnosticSession::Default);
        }
    }

    #[test]
    fn test_ecu_reset_drops_pending_seed() {
        let mut uds = machine();
        send(&mut uds, &[0x02, 0x10, 0x03], 0);
        let seed = send(&mut uds, &[0x02, 0x27, 0x01], 1);
        let key = [seed[3] ^ 0x35, seed[4] ^ 0x30];

        assert_eq!(send(&mut uds, &[0x02, 0x11, 0x01], 2), vec![0x02, 0x51, 0x01]);
        assert_eq!(uds.session(), DiagnosticSession::Default);
        assert_eq!(uds.security().state(), SecurityState::Locked);
        assert!(!uds.secret_session_found());

        send(&mut uds, &[0x02, 0x10, 0x03], 3);
        assert_eq!(
            send(&mut uds, &[0x04, 0x27, 0x02, key[0], key[1]], 4),
            vec![0x03, 0x7F, 0x27, 0x24]
        );
        assert!(!uds.security().is_unlocked());
    }

    #[test]
    fn test_unknown_service() {
        let mut uds = machine();
        assert_eq!(send(&mut uds, &[0x02, 0x22, 0xF1], 0), vec![0x03, 0x7F, 0x22, 0x11]);
    }

    #[test]
    fn test_truncated_request_is_dropped() {
        let mut uds = machine();
        assert!(uds.handle_request(&[0x04, 0x31, 0x41], ms(0), 0).is_none());
        assert!(uds.handle_request(&[0x00, 0x10], ms(0), 0).is_none());
        assert!(uds.handle_request(&[], ms(0), 0).is_none());
    }

    #[test]
    fn test_security_requires_extended_session() {
        let mut uds = machine();
        assert_eq!(send(&mut uds, &[0x02, 0x27, 0x01], 0), vec![0x03, 0x7F, 0x27, 0x7F]);
    }

    #[test]
    fn test_security_unlock_and_routine() {
        let mut uds = machine();
        assert_eq!(send(&mut uds, &[0x02, 0x10, 0x03], 0), vec![0x02, 0x50, 0x03]);

        let seed_reply = send(&mut uds, &[0x02, 0x27, 0x01], 10);
        assert_eq!(&seed_reply[..3], &[0x04, 0x67, 0x01]);
        let key = [seed_reply[3] ^ 0x35, seed_reply[4] ^ 0x30];

        let reply = uds
            .handle_request(&[0x04, 0x27, 0x02, key[0], key[1]], ms(20), 0)
            .unwrap();
        assert_eq!(reply.frame.data(), &[0x02, 0x67, 0x02]);
        assert_eq!(reply.event, Some(UdsEvent::SecurityUnlocked));
        assert_eq!(uds.session(), DiagnosticSession::Programming);
        assert!(uds.secret_session_found());

        let reply = uds
            .handle_request(&[0x04, 0x31, 0x41, 0x22, 0x01], ms(30), 0)
            .unwrap();
        assert_eq!(reply.frame.data(), &[0x04, 0x71, 0x41, 0x22, 0x01]);
        assert_eq!(reply.event, Some(UdsEvent::HazardRoutine));
        assert_eq!(uds.diag_active(), 2);
    }

    #[test]
    fn test_key_without_seed_is_sequence_error() {
        let mut uds = machine();
        send(&mut uds, &[0x02, 0x10, 0x03], 0);
        assert_eq!(
            send(&mut uds, &[0x04, 0x27, 0x02, 0x35, 0x30], 0),
            vec![0x03, 0x7F, 0x27, 0x24]
        );
    }

    #[test]
    fn test_wrong_key_discards_seed() {
        let mut uds = machine();
        send(&mut uds, &[0x02, 0x10, 0x03], 0);
        let seed = send(&mut uds, &[0x02, 0x27, 0x01], 0);
        let key = [seed[3] ^ 0x35, seed[4] ^ 0x30];

        assert_eq!(
            send(&mut uds, &[0x04, 0x27, 0x02, key[0] ^ 0x01, key[1]], 0),
            vec![0x03, 0x7F, 0x27, 0x35]
        );
        assert_eq!(
            send(&mut uds, &[0x04, 0x27, 0x02, key[0], key[1]], 0),
            vec![0x03, 0x7F, 0x27, 0x24]
        );
    }

    #[test]
    fn test_security_length_checks() {
        let mut uds = machine();
        send(&mut uds, &[0x02, 0x10, 0x03], 0);
        assert_eq!(send(&mut uds, &[0x03, 0x27, 0x01, 0x00], 0), vec![0x03, 0x7F, 0x27, 0x13]);
        assert_eq!(
            send(&mut uds, &[0x04, 0x27, 0x01, 0x00, 0x00], 0),
            vec![0x03, 0x7F, 0x27, 0x13]
        );
        assert_eq!(send(&mut uds, &[0x02, 0x27, 0x02], 0), vec![0x03, 0x7F, 0x27, 0x13]);
        assert_eq!(send(&mut uds, &[0x02, 0x27, 0x05], 0), vec![0x03, 0x7F, 0x27, 0x12]);
    }

    #[test]
    fn test_routine_control_checks() {
        let mut uds = machine();
        assert_eq!(
            send(&mut uds, &[0x03, 0x31, 0x41, 0x10], 0),
            vec![0x03, 0x7F, 0x31, 0x13]
        );
        assert_eq!(
            send(&mut uds, &[0x04, 0x31, 0x41, 0x10, 0x01], 0),
            vec![0x03, 0x7F, 0x31, 0x7F]
        );

        send(&mut uds, &[0x02, 0x10, 0x02], 0);
        assert_eq!(
            send(&mut uds, &[0x04, 0x31, 0x01, 0x10, 0x01], 0),
            vec![0x03, 0x7F, 0x31, 0x12]
        );
        assert_eq!(
            send(&mut uds, &[0x04, 0x31, 0x41, 0x11, 0x01], 0),
            vec![0x03, 0x7F, 0x31, 0x31]
        );
        assert_eq!(
            send(&mut uds, &[0x04, 0x31, 0x41, 0x10, 0x02], 0),
            vec![0x03, 0x7F, 0x31, 0x31]
        );
        assert_eq!(
            send(&mut uds, &[0x04, 0x31, 0x41, 0x10, 0x01], 0),
            vec![0x04, 0x71, 0x41, 0x10, 0x01]
        );
        assert_eq!(uds.diag_active(), 1);
    }

    #[test]
    fn test_default_session_clears_diag_active() {
        let mut uds = machine();
        send(&mut uds, &[0x02, 0x10, 0x02], 0);
        send(&mut uds, &[0x04, 0x31, 0x41, 0x10, 0x01], 0);
        assert_eq!(uds.diag_active(), 1);

        send(&mut uds, &[0x02, 0x10, 0x03], 0);
        assert_eq!(uds.diag_active(), 1);
        send(&mut uds, &[0x02, 0x10, 0x01], 0);
        assert_eq!(uds.diag_active(), 0);
    }

    #[test]
    fn test_session_timeout() {
        let mut uds = machine();
        send(&mut uds, &[0x02, 0x10, 0x03], 1000);
        assert!(!uds.check_session_timeout(ms(4500)));
        assert_eq!(send(&mut uds, &[0x02, 0x3E, 0x00], 4000), vec![0x02, 0x7E, 0x00]);
        assert!(!uds.check_session_timeout(ms(7500)));
        assert!(uds.check_session_timeout(ms(7501)));
        assert_eq!(uds.session(), DiagnosticSession::Default);
        assert!(!uds.check_session_timeout(ms(20000)));
    }

    #[test]
    fn test_vin_transfer_reports_completion() {
        let mut uds = machine();
        assert_eq!(
            send(&mut uds, &[0x02, 0x09, 0x02], 0),
            vec![0x10, 17, b'1', b'H', b'G', b'C', b'M', b'8']
        );
        assert!(uds.handle_request(&[0x30, 0x00, 0x00], ms(5), 0).is_none());

        let first = uds.continue_transfer(ms(6)).unwrap();
        assert_eq!(first.frame.data()[0], 0x21);
        assert_eq!(first.event, None);

        let last = uds.continue_transfer(ms(7)).unwrap();
        assert_eq!(last.frame.data()[0], 0x22);
        assert_eq!(last.event, Some(UdsEvent::VinDelivered));
        assert!(uds.continue_transfer(ms(8)).is_none());
    }
}
