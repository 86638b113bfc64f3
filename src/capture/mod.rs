//! Live packet capture.
//!
//! This module defines the `RawSocket` and `SocketOpener` traits the session
//! depends on, the capture session state machine, and the controller that
//! exposes the capture control surface. The Linux implementation uses an
//! `AF_PACKET` datagram socket.

mod controller;
#[cfg(target_os = "linux")]
mod packet_socket;
mod session;
#[cfg(not(target_os = "linux"))]
mod unsupported;

pub use controller::CaptureController;
#[cfg(target_os = "linux")]
pub use packet_socket::{PacketSocket, PacketSocketOpener};
pub use session::{CaptureSession, StopReport};
#[cfg(not(target_os = "linux"))]
pub use unsupported::{PacketSocketOpener, UnsupportedSocket};

use std::fmt;
use std::io;

use crate::domain::InterfaceDescriptor;
use crate::error::CaptureError;

/// A socket delivering whole IPv4 datagrams, starting at the IP header.
///
/// The socket is shared between the controller and the capture thread:
/// only the capture thread calls `recv`, the controller calls `interrupt`.
pub trait RawSocket: Send + Sync + 'static {
    /// Block until a datagram arrives, then copy it into `buf`.
    ///
    /// Returns `ErrorKind::Interrupted` when woken by [`RawSocket::interrupt`]
    /// or by a signal.
    fn recv(&self, buf: &mut [u8]) -> io::Result<usize>;

    /// Ask the OS to deliver all frames seen by the interface.
    fn enable_promiscuous(&self) -> io::Result<()>;

    /// Wake a thread blocked in `recv`.
    fn interrupt(&self) -> io::Result<()>;
}

/// Acquires raw sockets bound to an interface.
pub trait SocketOpener {
    type Socket: RawSocket;

    fn open(&self, interface: &InterfaceDescriptor) -> Result<Self::Socket, CaptureError>;
}

/// Lifecycle states of a capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Bound,
    Promiscuous,
    Running,
    Stopping,
    Closed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Bound => "bound",
            SessionState::Promiscuous => "promiscuous",
            SessionState::Running => "running",
            SessionState::Stopping => "stopping",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted sockets and openers shared by the session and controller tests.

    use std::collections::VecDeque;
    use std::io;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Condvar, Mutex};
    use std::time::Duration;

    use super::{RawSocket, SocketOpener};
    use crate::domain::{CaptureEvent, InterfaceDescriptor};
    use crate::error::CaptureError;
    use crate::reporter::PacketReporter;

    /// What the next `recv` call should do once the script reaches it.
    pub enum Step {
        Datagram(Vec<u8>),
        Fail(io::ErrorKind),
    }

    #[derive(Default)]
    struct Script {
        steps: VecDeque<Step>,
        interrupted: bool,
    }

    /// A socket that replays `Step`s, then blocks until interrupted.
    pub struct ScriptedSocket {
        script: Mutex<Script>,
        wake: Condvar,
        pub recv_calls: AtomicUsize,
        pub promiscuous: AtomicBool,
        pub fail_promiscuous: bool,
        /// Ignore `interrupt` and sleep this long instead of blocking.
        pub stuck_for: Option<Duration>,
        pub closed: Arc<AtomicBool>,
    }

    impl ScriptedSocket {
        pub fn new(steps: Vec<Step>) -> Self {
            Self {
                script: Mutex::new(Script {
                    steps: steps.into(),
                    interrupted: false,
                }),
                wake: Condvar::new(),
                recv_calls: AtomicUsize::new(0),
                promiscuous: AtomicBool::new(false),
                fail_promiscuous: false,
                stuck_for: None,
                closed: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl Drop for ScriptedSocket {
        fn drop(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    impl RawSocket for ScriptedSocket {
        fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
            self.recv_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.stuck_for {
                std::thread::sleep(delay);
                return Err(io::ErrorKind::Interrupted.into());
            }

            let mut script = self.script.lock().unwrap();
            loop {
                if let Some(step) = script.steps.pop_front() {
                    return match step {
                        Step::Datagram(bytes) => {
                            let len = bytes.len().min(buf.len());
                            buf[..len].copy_from_slice(&bytes[..len]);
                            Ok(len)
                        }
                        Step::Fail(kind) => Err(io::Error::new(kind, "scripted failure")),
                    };
                }
                if script.interrupted {
                    return Err(io::ErrorKind::Interrupted.into());
                }
                script = self.wake.wait(script).unwrap();
            }
        }

        fn enable_promiscuous(&self) -> io::Result<()> {
            if self.fail_promiscuous {
                return Err(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "operation not permitted",
                ));
            }
            self.promiscuous.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn interrupt(&self) -> io::Result<()> {
            let mut script = self.script.lock().unwrap();
            script.interrupted = true;
            self.wake.notify_all();
            Ok(())
        }
    }

    /// Hands out one prepared socket and counts open attempts.
    pub struct ScriptedOpener {
        socket: Mutex<Option<ScriptedSocket>>,
        pub opens: AtomicUsize,
        pub fail: bool,
    }

    impl ScriptedOpener {
        pub fn new(socket: ScriptedSocket) -> Self {
            Self {
                socket: Mutex::new(Some(socket)),
                opens: AtomicUsize::new(0),
                fail: false,
            }
        }

        pub fn failing() -> Self {
            Self {
                socket: Mutex::new(None),
                opens: AtomicUsize::new(0),
                fail: true,
            }
        }
    }

    impl SocketOpener for ScriptedOpener {
        type Socket = ScriptedSocket;

        fn open(&self, _interface: &InterfaceDescriptor) -> Result<ScriptedSocket, CaptureError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(CaptureError::SocketUnavailable(io::Error::new(
                    io::ErrorKind::PermissionDenied,
                    "operation not permitted",
                )));
            }
            self.socket.lock().unwrap().take().ok_or_else(|| {
                CaptureError::SocketUnavailable(io::Error::new(
                    io::ErrorKind::AddrInUse,
                    "socket already handed out",
                ))
            })
        }
    }

    /// What a reporter saw, in a form tests can inspect after the loop ends.
    #[derive(Debug, Default, Clone, PartialEq, Eq)]
    pub struct Seen {
        pub started: Option<String>,
        pub packets: Vec<(u64, u16)>,
        pub undersized: Vec<(u64, usize)>,
        pub stopped: bool,
    }

    pub struct RecordingReporter(pub Arc<Mutex<Seen>>);

    impl RecordingReporter {
        pub fn new() -> (Self, Arc<Mutex<Seen>>) {
            let seen = Arc::new(Mutex::new(Seen::default()));
            (Self(seen.clone()), seen)
        }
    }

    impl PacketReporter for RecordingReporter {
        fn report(&mut self, event: &CaptureEvent<'_>) {
            let mut seen = self.0.lock().unwrap();
            match event {
                CaptureEvent::Packet {
                    sequence, summary, ..
                } => seen.packets.push((*sequence, summary.total_length)),
                CaptureEvent::UndersizedDatagram {
                    sequence, datagram, ..
                } => seen.undersized.push((*sequence, datagram.len())),
            }
        }

        fn on_start(&mut self, interface: &str) {
            self.0.lock().unwrap().started = Some(interface.to_string());
        }

        fn on_stop(&mut self) {
            self.0.lock().unwrap().stopped = true;
        }
    }

    /// A minimal valid IPv4 datagram with the given total length.
    pub fn datagram(total_length: u16) -> Vec<u8> {
        let mut bytes = vec![0u8; usize::from(total_length)];
        bytes[0] = 0x45;
        bytes[2..4].copy_from_slice(&total_length.to_be_bytes());
        bytes[8] = 64;
        bytes[9] = 17;
        bytes
    }

    pub fn eth0() -> InterfaceDescriptor {
        InterfaceDescriptor::new(
            "eth0",
            std::net::Ipv4Addr::new(192, 168, 1, 20),
            macaddr::MacAddr6::new(0x02, 0, 0, 0, 0, 0x01),
        )
    }
}
