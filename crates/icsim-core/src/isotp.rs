//! Minimal ISO-TP sender
//!
//! Only the transmit direction is implemented: a single frame for short
//! payloads, otherwise a first frame followed by consecutive frames once the
//! tester answers with flow control. Block size and separation time are not
//! honoured; one consecutive frame goes out per engine cycle.

use std::collections::VecDeque;
use std::time::Duration;

use tracing::{debug, trace};

use crate::frame::BusFrame;

/// Default wait for flow control after a first frame
pub const DEFAULT_ISOTP_TIMEOUT: Duration = Duration::from_millis(100);

/// Largest payload that still fits a single frame next to PCI and SID
pub const SINGLE_FRAME_MAX: usize = 6;

/// Payload bytes carried by the first frame
pub const FIRST_FRAME_DATA: usize = 6;

/// Payload bytes carried by a consecutive frame
pub const CONSECUTIVE_FRAME_DATA: usize = 7;

pub mod pci {
    pub const FIRST_FRAME: u8 = 0x10;
    pub const CONSECUTIVE_FRAME: u8 = 0x20;
    pub const FLOW_CONTROL: u8 = 0x30;
    pub const TYPE_MASK: u8 = 0xF0;
}

/// True when the PCI byte announces a flow-control frame
pub fn is_flow_control(pci_byte: u8) -> bool {
    pci_byte & pci::TYPE_MASK == pci::FLOW_CONTROL
}

/// A multi-frame response in flight
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IsoTpTransfer {
    pub remaining: VecDeque<u8>,
    pub sequence_counter: u8,
    pub first_frame_time: Duration,
    pub clear_to_send: bool,
}

/// Result of one continuation step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Progress {
    /// Nothing in flight, or still waiting for flow control
    Idle,
    /// A consecutive frame was produced; `complete` when it was the last one
    Sent { frame: BusFrame, complete: bool },
    /// Flow control never arrived; the transfer was dropped
    TimedOut,
}

/// Segmenting transmitter for one response identifier
#[derive(Debug, Clone)]
pub struct IsoTpTransmitter {
    response_id: u32,
    timeout: Duration,
    transfer: Option<IsoTpTransfer>,
}

impl IsoTpTransmitter {
    pub fn new(response_id: u32, timeout: Duration) -> Self {
        Self {
            response_id,
            timeout,
            transfer: None,
        }
    }

    pub fn transfer(&self) -> Option<&IsoTpTransfer> {
        self.transfer.as_ref()
    }

    pub fn is_busy(&self) -> bool {
        self.transfer.is_some()
    }

    pub fn set_response_id(&mut self, response_id: u32) {
        self.response_id = response_id;
    }

    /// Start sending a positive response for `service_id`
    ///
    /// A multi-frame response abandons any transfer still in flight; a
    /// single frame leaves it untouched.
    pub fn begin(&mut self, service_id: u8, payload: &[u8], now: Duration) -> BusFrame {
        if payload.len() <= SINGLE_FRAME_MAX {
            let mut data = Vec::with_capacity(payload.len() + 2);
            data.push(payload.len() as u8 + 1);
            data.push(service_id.wrapping_add(0x40));
            data.extend_from_slice(payload);
            return BusFrame::classic(self.response_id, &data);
        }

        if self.transfer.take().is_some() {
            debug!("Abandoning in-flight ISO-TP transfer");
        }

        let len = payload.len();
        let mut data = Vec::with_capacity(2 + FIRST_FRAME_DATA);
        data.push(pci::FIRST_FRAME | ((len >> 8) & 0x0F) as u8);
        data.push((len & 0xFF) as u8);
        data.extend_from_slice(&payload[..FIRST_FRAME_DATA]);

        self.transfer = Some(IsoTpTransfer {
            remaining: payload[FIRST_FRAME_DATA..].iter().copied().collect(),
            sequence_counter: 1,
            first_frame_time: now,
            clear_to_send: false,
        });
        debug!(length = len, "ISO-TP first frame sent");

        BusFrame::classic(self.response_id, &data)
    }

    /// Handle a flow-control frame from the tester
    ///
    /// Only the first one counts; once consecutive frames are flowing, later
    /// flow control frames are ignored whatever their timing.
    pub fn on_flow_control(&mut self, now: Duration) {
        let Some(transfer) = self.transfer.as_mut() else {
            trace!("Flow control without a pending transfer");
            return;
        };
        if transfer.clear_to_send {
            trace!("Repeated flow control ignored");
            return;
        }

        if now.saturating_sub(transfer.first_frame_time) <= self.timeout {
            transfer.clear_to_send = true;
        } else {
            debug!("Late flow control, abandoning ISO-TP transfer");
            self.transfer = None;
        }
    }

    /// Advance the transfer by at most one consecutive frame
    pub fn continue_transfer(&mut self, now: Duration) -> Progress {
        let Some(transfer) = self.transfer.as_mut() else {
            return Progress::Idle;
        };

        if !transfer.clear_to_send {
            if now.saturating_sub(transfer.first_frame_time) > self.timeout {
                debug!("No flow control received, abandoning ISO-TP transfer");
                self.transfer = None;
                return Progress::TimedOut;
            }
            return Progress::Idle;
        }

        let mut data = Vec::with_capacity(1 + CONSECUTIVE_FRAME_DATA);
        data.push(pci::CONSECUTIVE_FRAME | (transfer.sequence_counter & 0x0F));
        let take = transfer.remaining.len().min(CONSECUTIVE_FRAME_DATA);
        data.extend(transfer.remaining.drain(..take));
        transfer.sequence_counter = (transfer.sequence_counter + 1) & 0x0F;

        let complete = transfer.remaining.is_empty();
        if complete {
            self.transfer = None;
        }

        Progress::Sent {
            frame: BusFrame::classic(self.response_id, &data),
            complete,
        }
    }
}
