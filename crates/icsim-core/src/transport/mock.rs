//! In-memory bus for testing

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::{BusTransport, TransportError};
use crate::frame::BusFrame;

/// Mock bus: frames injected by the test are received, sent frames are kept
#[derive(Debug)]
pub struct MockBus {
    name: String,
    incoming: Mutex<VecDeque<BusFrame>>,
    sent: Mutex<Vec<BusFrame>>,
    connected: AtomicBool,
}

impl MockBus {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            incoming: Mutex::new(VecDeque::new()),
            sent: Mutex::new(Vec::new()),
            connected: AtomicBool::new(true),
        }
    }

    /// Queue a frame as if another node had sent it
    pub fn inject(&self, frame: BusFrame) {
        self.incoming.lock().push_back(frame);
    }

    /// Take every frame sent so far
    pub fn take_sent(&self) -> Vec<BusFrame> {
        std::mem::take(&mut *self.sent.lock())
    }

    pub fn pending(&self) -> usize {
        self.incoming.lock().len()
    }

    /// Simulate the interface going down
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }
}

impl BusTransport for MockBus {
    fn send(&self, frame: &BusFrame) -> Result<(), TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::Down(self.name.clone()));
        }
        self.sent.lock().push(*frame);
        Ok(())
    }

    fn try_recv(&self) -> Result<Option<BusFrame>, TransportError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::Down(self.name.clone()));
        }
        Ok(self.incoming.lock().pop_front())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_and_receive_in_order() {
        let bus = MockBus::new("mock0");
        bus.inject(BusFrame::new(0x1, &[1]).unwrap());
        bus.inject(BusFrame::new(0x2, &[2]).unwrap());

        assert_eq!(bus.try_recv().unwrap().unwrap().id(), 0x1);
        assert_eq!(bus.try_recv().unwrap().unwrap().id(), 0x2);
        assert!(bus.try_recv().unwrap().is_none());
    }

    #[test]
    fn test_sent_frames_are_recorded() {
        let bus = MockBus::new("mock0");
        bus.send(&BusFrame::new(0x7E8, &[0x02, 0x50, 0x03]).unwrap())
            .unwrap();
        let sent = bus.take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].data(), &[0x02, 0x50, 0x03]);
        assert!(bus.take_sent().is_empty());
    }

    #[test]
    fn test_disconnected_bus_fails() {
        let bus = MockBus::new("mock0");
        bus.set_connected(false);
        assert!(matches!(
            bus.try_recv(),
            Err(TransportError::Down(_))
        ));
        assert!(bus.send(&BusFrame::new(0x1, &[]).unwrap()).is_err());
    }
}
