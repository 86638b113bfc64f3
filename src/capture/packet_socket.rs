//! `AF_PACKET` capture socket for Linux.
//!
//! A `SOCK_DGRAM` packet socket bound to `ETH_P_IP` hands us IPv4 datagrams
//! with the link-layer header already stripped. Receives block in `poll(2)`
//! on the socket and on a self-pipe, so `interrupt` can wake them without a
//! read timeout.

use std::io::{self, Read};
use std::mem;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};

use socket2::{Domain, Protocol, Socket, Type};
use tracing::debug;

use super::{RawSocket, SocketOpener};
use crate::discovery::PnetInterfaces;
use crate::domain::InterfaceDescriptor;
use crate::error::CaptureError;

/// `struct packet_mreq` from `<linux/if_packet.h>`.
#[repr(C)]
struct PacketMreq {
    mr_ifindex: libc::c_int,
    mr_type: libc::c_ushort,
    mr_alen: libc::c_ushort,
    mr_address: [libc::c_uchar; 8],
}

/// Opens `PacketSocket`s on the interface that owns the selected address.
#[derive(Debug, Default, Clone, Copy)]
pub struct PacketSocketOpener;

impl SocketOpener for PacketSocketOpener {
    type Socket = PacketSocket;

    fn open(&self, interface: &InterfaceDescriptor) -> Result<PacketSocket, CaptureError> {
        let ifindex = PnetInterfaces::index_of(interface)
            .ok_or_else(|| CaptureError::InterfaceNotFound(interface.display_name().to_string()))?;
        PacketSocket::bind(ifindex as libc::c_int).map_err(CaptureError::SocketUnavailable)
    }
}

/// Packet socket bound to one interface.
///
/// The socket and the wake pipe are closed when this value is dropped.
pub struct PacketSocket {
    socket: Socket,
    ifindex: libc::c_int,
    wake_rx: OwnedFd,
    wake_tx: OwnedFd,
}

impl PacketSocket {
    /// Create a packet socket receiving IPv4 on interface `ifindex`.
    pub fn bind(ifindex: libc::c_int) -> io::Result<Self> {
        let protocol = (libc::ETH_P_IP as u16).to_be();
        let socket = Socket::new(
            Domain::PACKET,
            Type::DGRAM,
            Some(Protocol::from(libc::c_int::from(protocol))),
        )?;

        let addr = libc::sockaddr_ll {
            sll_family: libc::AF_PACKET as libc::c_ushort,
            sll_protocol: protocol,
            sll_ifindex: ifindex,
            sll_hatype: 0,
            sll_pkttype: 0,
            sll_halen: 0,
            sll_addr: [0; 8],
        };
        let rc = unsafe {
            libc::bind(
                socket.as_raw_fd(),
                &addr as *const libc::sockaddr_ll as *const libc::sockaddr,
                mem::size_of::<libc::sockaddr_ll>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }

        let (wake_rx, wake_tx) = pipe()?;
        debug!("Packet socket bound to ifindex {}", ifindex);

        Ok(Self {
            socket,
            ifindex,
            wake_rx,
            wake_tx,
        })
    }
}

impl RawSocket for PacketSocket {
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        let mut fds = [
            pollfd(self.socket.as_raw_fd()),
            pollfd(self.wake_rx.as_raw_fd()),
        ];
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, -1) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        if fds[1].revents != 0 {
            return Err(io::Error::new(
                io::ErrorKind::Interrupted,
                "capture interrupted",
            ));
        }

        (&self.socket).read(buf)
    }

    fn enable_promiscuous(&self) -> io::Result<()> {
        let mreq = PacketMreq {
            mr_ifindex: self.ifindex,
            mr_type: libc::PACKET_MR_PROMISC as libc::c_ushort,
            mr_alen: 0,
            mr_address: [0; 8],
        };
        let rc = unsafe {
            libc::setsockopt(
                self.socket.as_raw_fd(),
                libc::SOL_PACKET,
                libc::PACKET_ADD_MEMBERSHIP,
                &mreq as *const PacketMreq as *const libc::c_void,
                mem::size_of::<PacketMreq>() as libc::socklen_t,
            )
        };
        if rc != 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn interrupt(&self) -> io::Result<()> {
        let byte = 1u8;
        let rc = unsafe {
            libc::write(
                self.wake_tx.as_raw_fd(),
                &byte as *const u8 as *const libc::c_void,
                1,
            )
        };
        if rc < 0 {
            let err = io::Error::last_os_error();
            // A full pipe already wakes the reader.
            if err.kind() != io::ErrorKind::WouldBlock {
                return Err(err);
            }
        }
        Ok(())
    }
}

fn pollfd(fd: RawFd) -> libc::pollfd {
    libc::pollfd {
        fd,
        events: libc::POLLIN,
        revents: 0,
    }
}

/// Non-blocking, close-on-exec pipe as (read end, write end).
fn pipe() -> io::Result<(OwnedFd, OwnedFd)> {
    let mut fds: [libc::c_int; 2] = [0; 2];
    let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_CLOEXEC | libc::O_NONBLOCK) };
    if rc != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(unsafe { (OwnedFd::from_raw_fd(fds[0]), OwnedFd::from_raw_fd(fds[1])) })
}
