//! Identifier dispatch table

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Bus identifiers the dashboard listens and talks on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BusIds {
    pub door_command: u32,
    pub door_status: u32,
    pub door: u32,
    pub signal: u32,
    pub speed: u32,
    pub warning: u32,
    pub light: u32,
    pub luminosity: u32,
    pub shared_control: u32,
    pub diag_request: u32,
    pub diag_response: u32,
}

impl Default for BusIds {
    fn default() -> Self {
        Self {
            door_command: 0x123,
            door_status: 0x124,
            door: 0x19B,
            signal: 0x188,
            speed: 0x244,
            warning: 0x1A0,
            light: 0x1A1,
            luminosity: 0x1A2,
            shared_control: 0x3E9,
            diag_request: 0x7E0,
            diag_response: 0x7E8,
        }
    }
}

impl BusIds {
    /// Functional (broadcast) diagnostic address, one below the physical one
    pub fn diag_functional(&self) -> u32 {
        self.diag_request.wrapping_sub(1)
    }
}

/// Handler a frame is dispatched to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    SharedControl,
    DoorStatus,
    Door,
    Signal,
    Speed,
    Warning,
    Light,
    Luminosity,
    Diagnostic,
}

/// Maps identifiers to the handlers interested in them
///
/// Several routes may share an identifier (a randomized layout can collide
/// with a fixed one); every one of them sees the frame, in declaration order.
#[derive(Debug, Clone)]
pub struct FrameRouter {
    table: HashMap<u32, Vec<Route>>,
}

impl FrameRouter {
    pub fn new(ids: &BusIds) -> Self {
        let mut router = Self {
            table: HashMap::new(),
        };
        router.rebuild(ids);
        router
    }

    /// Replace the whole table, e.g. after the layout was randomized
    pub fn rebuild(&mut self, ids: &BusIds) {
        self.table.clear();
        let entries = [
            (ids.shared_control, Route::SharedControl),
            (ids.door_status, Route::DoorStatus),
            (ids.door, Route::Door),
            (ids.signal, Route::Signal),
            (ids.speed, Route::Speed),
            (ids.warning, Route::Warning),
            (ids.light, Route::Light),
            (ids.luminosity, Route::Luminosity),
            (ids.diag_request, Route::Diagnostic),
            (ids.diag_functional(), Route::Diagnostic),
        ];
        for (id, route) in entries {
            let routes = self.table.entry(id).or_default();
            if !routes.contains(&route) {
                routes.push(route);
            }
        }
    }

    /// Routes registered for `id`, `None` when the frame is not ours
    pub fn route(&self, id: u32) -> Option<&[Route]> {
        self.table.get(&id).map(Vec::as_slice)
    }
}
