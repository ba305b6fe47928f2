//! Raw SocketCAN endpoint (classic or FD)

use socketcan::{
    CanAnyFrame, CanDataFrame, CanFdFrame, CanFdSocket, CanFrame, CanSocket, EmbeddedFrame,
    ExtendedId, Frame, Id, Socket, StandardId,
};
use tracing::{debug, info, trace};

use super::{BusTransport, TransportError};
use crate::frame::{BusFrame, CAN_MAX_DLEN};

enum RawSocket {
    Classic(CanSocket),
    Fd(CanFdSocket),
}

/// Non-blocking SocketCAN bus
pub struct SocketCanBus {
    interface: String,
    socket: RawSocket,
}

impl SocketCanBus {
    pub fn open(interface: &str, fd: bool) -> Result<Self, TransportError> {
        let open_failed = |source| TransportError::Open {
            interface: interface.to_string(),
            source,
        };

        let socket = if fd {
            let socket = CanFdSocket::open(interface).map_err(open_failed)?;
            socket.set_nonblocking(true).map_err(open_failed)?;
            RawSocket::Fd(socket)
        } else {
            let socket = CanSocket::open(interface).map_err(open_failed)?;
            socket.set_nonblocking(true).map_err(open_failed)?;
            RawSocket::Classic(socket)
        };

        info!(interface = %interface, fd, "CAN socket opened");
        Ok(Self {
            interface: interface.to_string(),
            socket,
        })
    }

    fn write_failed(&self, reason: impl ToString) -> TransportError {
        TransportError::Write {
            interface: self.interface.clone(),
            reason: reason.to_string(),
        }
    }

    fn read_failed(&self, source: std::io::Error) -> TransportError {
        TransportError::Read {
            interface: self.interface.clone(),
            source,
        }
    }
}

fn can_id(frame: &BusFrame) -> Option<Id> {
    if frame.is_extended() {
        ExtendedId::new(frame.id()).map(Id::Extended)
    } else {
        StandardId::new(frame.id() as u16).map(Id::Standard)
    }
}

fn would_block(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::WouldBlock
}

impl BusTransport for SocketCanBus {
    fn send(&self, frame: &BusFrame) -> Result<(), TransportError> {
        let invalid = || self.write_failed(format!("cannot encode {}", frame));
        let id = can_id(frame).ok_or_else(invalid)?;

        let result = match &self.socket {
            RawSocket::Classic(socket) => {
                let raw = CanFrame::new(id, frame.data()).ok_or_else(invalid)?;
                socket.write_frame(&raw)
            }
            RawSocket::Fd(socket) if frame.len() <= CAN_MAX_DLEN => {
                let raw = CanDataFrame::new(id, frame.data()).ok_or_else(invalid)?;
                socket.write_frame(&raw)
            }
            RawSocket::Fd(socket) => {
                let raw = CanFdFrame::new(id, frame.data()).ok_or_else(invalid)?;
                socket.write_frame(&raw)
            }
        };

        result.map_err(|e| self.write_failed(e))?;
        trace!(frame = %frame, "Frame sent");
        Ok(())
    }

    fn try_recv(&self) -> Result<Option<BusFrame>, TransportError> {
        let received = match &self.socket {
            RawSocket::Classic(socket) => match socket.read_frame() {
                Ok(raw) => BusFrame::new(raw.raw_id(), raw.data())?,
                Err(ref e) if would_block(e) => return Ok(None),
                Err(e) => return Err(self.read_failed(e)),
            },
            RawSocket::Fd(socket) => match socket.read_frame() {
                Ok(CanAnyFrame::Normal(raw)) => BusFrame::new(raw.raw_id(), raw.data())?,
                Ok(CanAnyFrame::Fd(raw)) => BusFrame::new(raw.raw_id(), raw.data())?,
                Ok(_) => {
                    debug!("Ignoring remote or error frame");
                    return Ok(None);
                }
                Err(ref e) if would_block(e) => return Ok(None),
                Err(e) => return Err(self.read_failed(e)),
            },
        };

        Ok(Some(received))
    }

    fn name(&self) -> &str {
        &self.interface
    }
}
