//! Stand-in for platforms without `AF_PACKET`.

use std::io;

use super::{RawSocket, SocketOpener};
use crate::domain::InterfaceDescriptor;
use crate::error::CaptureError;

/// A socket that can never be constructed.
pub enum UnsupportedSocket {}

impl RawSocket for UnsupportedSocket {
    fn recv(&self, _buf: &mut [u8]) -> io::Result<usize> {
        match *self {}
    }

    fn enable_promiscuous(&self) -> io::Result<()> {
        match *self {}
    }

    fn interrupt(&self) -> io::Result<()> {
        match *self {}
    }
}

/// Always fails: raw capture is only implemented for Linux.
#[derive(Debug, Default, Clone, Copy)]
pub struct PacketSocketOpener;

impl SocketOpener for PacketSocketOpener {
    type Socket = UnsupportedSocket;

    fn open(&self, _interface: &InterfaceDescriptor) -> Result<UnsupportedSocket, CaptureError> {
        Err(CaptureError::SocketUnavailable(io::Error::new(
            io::ErrorKind::Unsupported,
            "raw packet capture requires Linux",
        )))
    }
}
