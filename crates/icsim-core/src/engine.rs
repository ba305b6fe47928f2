//! Dashboard engine: one owner for every piece of protocol state
//!
//! Each received frame goes through the same cycle:
//!
//! ```text
//!   frame ──> router ──> shared control | plain signals | diagnostics
//!                                                    │
//!             session timeout check <────────────────┘
//!                    │
//!             ISO-TP continuation (one consecutive frame at most)
//!                    │
//!             snapshot available
//! ```
//!
//! `tick` runs the same epilogue without a frame so timeouts and pending
//! transfers progress while the bus is quiet.

use std::time::Duration;

use rand::rngs::StdRng;
use tracing::{debug, trace};

use crate::challenge::{Challenge, ChallengeRegistry};
use crate::config::IcsimConfig;
use crate::control::{SharedControlCodec, SharedControlFrame};
use crate::doors::DoorCommander;
use crate::frame::BusFrame;
use crate::isotp::IsoTpTransmitter;
use crate::randomize::RandomizedLayout;
use crate::router::{BusIds, FrameRouter, Route};
use crate::security::SecurityAccessGuard;
use crate::uds::{UdsEvent, UdsReply, UdsStateMachine};
use crate::vehicle::{DashboardSnapshot, SignalPositions, VehicleState};

#[derive(Debug)]
pub struct DashboardEngine {
    ids: BusIds,
    positions: SignalPositions,
    router: FrameRouter,
    codec: SharedControlCodec,
    control: SharedControlFrame,
    vehicle: VehicleState,
    uds: UdsStateMachine,
    challenges: ChallengeRegistry,
    doors: DoorCommander,
}

impl DashboardEngine {
    /// Build an engine from configuration; `rng` drives security seeds
    pub fn new(config: &IcsimConfig, rng: StdRng) -> Self {
        let ids = config.ids.to_bus_ids();
        let diagnostics = &config.diagnostics;

        let uds = UdsStateMachine::new(
            ids.diag_response,
            SecurityAccessGuard::new(diagnostics.session_key_bytes(), rng),
            IsoTpTransmitter::new(ids.diag_response, diagnostics.isotp_timeout()),
            diagnostics.session_timeout(),
        );

        Self {
            ids,
            positions: config.positions,
            router: FrameRouter::new(&ids),
            codec: SharedControlCodec::new(),
            control: SharedControlFrame::default(),
            vehicle: VehicleState::default(),
            uds,
            challenges: ChallengeRegistry::new(),
            doors: DoorCommander::new(ids.door_command),
        }
    }

    /// Move the door, signal and speed streams to a randomized layout
    pub fn apply_layout(&mut self, layout: &RandomizedLayout) {
        layout.apply(&mut self.ids, &mut self.positions);
        self.router.rebuild(&self.ids);
        debug!(
            seed = layout.seed,
            door_id = format!("0x{:03X}", self.ids.door),
            signal_id = format!("0x{:03X}", self.ids.signal),
            speed_id = format!("0x{:03X}", self.ids.speed),
            "Randomized layout applied"
        );
    }

    pub fn ids(&self) -> &BusIds {
        &self.ids
    }

    pub fn positions(&self) -> &SignalPositions {
        &self.positions
    }

    pub fn control(&self) -> &SharedControlFrame {
        &self.control
    }

    pub fn vehicle(&self) -> &VehicleState {
        &self.vehicle
    }

    pub fn uds(&self) -> &UdsStateMachine {
        &self.uds
    }

    pub fn challenges(&self) -> &ChallengeRegistry {
        &self.challenges
    }

    /// Run one full cycle for a received frame
    pub fn process(&mut self, frame: &BusFrame, now: Duration) -> Vec<BusFrame> {
        let mut out = Vec::new();

        if let Some(routes) = self.router.route(frame.id()) {
            for route in routes.to_vec() {
                self.dispatch(route, frame, now, &mut out);
            }
        } else {
            trace!(frame = %frame, "Unrouted frame");
        }

        self.supervise(now, &mut out);
        out
    }

    /// Run the supervisory part of a cycle while the bus is idle
    pub fn tick(&mut self, now: Duration) -> Vec<BusFrame> {
        let mut out = Vec::new();
        self.supervise(now, &mut out);
        out
    }

    pub fn snapshot(&self) -> DashboardSnapshot {
        DashboardSnapshot {
            door_status: self.vehicle.door_status,
            turn_status: self.vehicle.turn_status,
            luminosity: self.vehicle.luminosity,
            speed: self.vehicle.speed,
            warning_state: self.vehicle.warning,
            light_status: self.vehicle.light,
            diag_session: self.uds.session(),
            diag_active: self.uds.diag_active(),
            secret_session_found: self.uds.secret_session_found(),
            score: self.challenges.score(),
            control: self.control,
        }
    }

    /// Ask the body controller to lock the given doors
    pub fn lock_doors(&mut self, bits: u8) -> BusFrame {
        self.doors.lock(bits)
    }

    /// Ask the body controller to unlock the given doors
    pub fn unlock_doors(&mut self, bits: u8) -> BusFrame {
        self.doors.unlock(bits)
    }

    fn dispatch(&mut self, route: Route, frame: &BusFrame, now: Duration, out: &mut Vec<BusFrame>) {
        let pos = self.positions;
        let solved = match route {
            Route::SharedControl => {
                match self.codec.decode(frame) {
                    Ok(control) => self.control = control,
                    Err(rejected) => trace!(?rejected, "Shared control frame dropped"),
                }
                None
            }
            Route::DoorStatus => {
                self.vehicle.decode_door_status(frame);
                None
            }
            Route::Door => {
                self.vehicle.decode_door(frame, pos.door);
                None
            }
            Route::Signal => self.vehicle.decode_signal(frame, pos.signal, &self.control),
            Route::Speed => self.vehicle.decode_speed(frame, pos.speed),
            Route::Warning => {
                self.vehicle.decode_warning(frame, pos.warning);
                None
            }
            Route::Light => {
                self.vehicle.decode_light(frame, pos.light);
                None
            }
            Route::Luminosity => {
                self.vehicle
                    .decode_luminosity(frame, pos.luminosity, &self.control)
            }
            Route::Diagnostic => {
                if let Some(reply) = self.uds.handle_request(frame.data(), now, self.control.speed) {
                    self.emit(reply, out);
                }
                None
            }
        };

        if let Some(challenge) = solved {
            self.challenges.validate(challenge);
        }
    }

    fn supervise(&mut self, now: Duration, out: &mut Vec<BusFrame>) {
        self.uds.check_session_timeout(now);
        if let Some(reply) = self.uds.continue_transfer(now) {
            self.emit(reply, out);
        }
    }

    fn emit(&mut self, reply: UdsReply, out: &mut Vec<BusFrame>) {
        if let Some(event) = reply.event {
            let challenge = match event {
                UdsEvent::HazardRoutine => Challenge::FindRoutineControl,
                UdsEvent::SecurityUnlocked => Challenge::SecurityAccess,
                UdsEvent::VinDelivered => Challenge::RequestVin,
            };
            self.challenges.validate(challenge);
        }
        out.push(reply.frame);
    }
}
