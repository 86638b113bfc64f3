//! Capture session: socket ownership, the receive loop and shutdown.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};

use tracing::{debug, error, info, trace, warn};

use super::{RawSocket, SessionState, SocketOpener};
use crate::config::Config;
use crate::domain::{CaptureEvent, InterfaceDescriptor, PacketView, HEADER_LEN};
use crate::error::CaptureError;
use crate::reporter::PacketReporter;

/// Counters returned once the session is closed.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct StopReport {
    /// Whether the loop got past the startup delay.
    pub started: bool,
    /// Datagrams decoded and reported.
    pub packets: u64,
    /// Datagrams too short to carry an IPv4 header.
    pub undersized: u64,
    /// The loop missed the stop deadline and was abandoned.
    pub forced: bool,
}

/// What the capture thread hands back when it exits.
#[derive(Debug, Default)]
struct LoopOutcome {
    started: bool,
    packets: u64,
    undersized: u64,
    error: Option<io::Error>,
}

/// Settings the capture thread needs.
#[derive(Debug, Clone)]
struct LoopSettings {
    interface: String,
    startup_delay: Duration,
    recv_buffer: usize,
}

/// One capture on one interface.
///
/// The session walks `Idle -> Bound -> Promiscuous -> Running -> Stopping ->
/// Closed` without skipping states. It owns the socket; the capture thread
/// only borrows it through an `Arc` and releases its share before reporting
/// completion, so the socket is closed once the thread has exited.
pub struct CaptureSession<S: RawSocket> {
    config: Config,
    state: SessionState,
    interface: Option<InterfaceDescriptor>,
    socket: Option<Arc<S>>,
    running: Arc<AtomicBool>,
    stop_tx: Option<Sender<()>>,
    done_rx: Option<Receiver<LoopOutcome>>,
    handle: Option<JoinHandle<()>>,
}

impl<S: RawSocket> CaptureSession<S> {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            state: SessionState::Idle,
            interface: None,
            socket: None,
            running: Arc::new(AtomicBool::new(false)),
            stop_tx: None,
            done_rx: None,
            handle: None,
        }
    }

    /// Current lifecycle state.
    ///
    /// A loop that ended on its own after a receive failure reports
    /// `Stopping` until `stop` collects the outcome.
    pub fn state(&self) -> SessionState {
        if self.state == SessionState::Running
            && self.handle.as_ref().is_some_and(|h| h.is_finished())
        {
            return SessionState::Stopping;
        }
        self.state
    }

    pub fn interface(&self) -> Option<&InterfaceDescriptor> {
        self.interface.as_ref()
    }

    /// Whether the capture thread is alive and receiving.
    pub fn is_running(&self) -> bool {
        self.state == SessionState::Running
            && self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Acquire a raw socket on `interface` (Idle -> Bound).
    pub fn open<O>(&mut self, opener: &O, interface: &InterfaceDescriptor) -> Result<(), CaptureError>
    where
        O: SocketOpener<Socket = S>,
    {
        self.expect_state(SessionState::Idle, "open")?;
        if !interface.is_usable() {
            return Err(CaptureError::InterfaceUnusable(
                interface.display_name().to_string(),
            ));
        }

        let socket = opener.open(interface)?;
        info!(
            "Bound raw socket to {} ({})",
            interface.display_name(),
            interface.display_ipv4()
        );

        self.socket = Some(Arc::new(socket));
        self.interface = Some(interface.clone());
        self.transition(SessionState::Bound);
        Ok(())
    }

    /// Put the interface into promiscuous mode (Bound -> Promiscuous).
    pub fn enable_promiscuous(&mut self) -> Result<(), CaptureError> {
        self.expect_state(SessionState::Bound, "enable promiscuous mode")?;
        let interface = self.interface_name();
        let socket = self.socket.as_ref().ok_or(CaptureError::InvalidTransition {
            action: "enable promiscuous mode",
            state: self.state,
        })?;

        socket
            .enable_promiscuous()
            .map_err(|source| CaptureError::PromiscuousModeUnavailable {
                interface: interface.clone(),
                source,
            })?;

        info!("Promiscuous mode enabled on {}", interface);
        self.transition(SessionState::Promiscuous);
        Ok(())
    }

    /// Launch the capture thread (Promiscuous -> Running).
    ///
    /// The thread waits for the configured startup delay before its first
    /// receive; a stop during the delay means nothing is ever received.
    pub fn start<R>(&mut self, reporter: R) -> Result<(), CaptureError>
    where
        R: PacketReporter + 'static,
    {
        self.expect_state(SessionState::Promiscuous, "start")?;
        let socket = self
            .socket
            .clone()
            .ok_or(CaptureError::InvalidTransition {
                action: "start",
                state: self.state,
            })?;

        let (stop_tx, stop_rx) = mpsc::channel();
        let (done_tx, done_rx) = mpsc::channel();
        let running = self.running.clone();
        let settings = LoopSettings {
            interface: self.interface_name(),
            startup_delay: self.config.startup_delay,
            recv_buffer: self.config.recv_buffer,
        };

        self.running.store(true, Ordering::SeqCst);
        let handle = thread::spawn(move || {
            let outcome = run_loop(socket, running, stop_rx, reporter, settings);
            let _ = done_tx.send(outcome);
        });

        self.stop_tx = Some(stop_tx);
        self.done_rx = Some(done_rx);
        self.handle = Some(handle);
        self.transition(SessionState::Running);
        Ok(())
    }

    /// Stop the capture and release the socket (-> Stopping -> Closed).
    ///
    /// Safe to call more than once; once closed it is a no-op. A receive
    /// failure that ended the loop is returned from the first call.
    pub fn stop(&mut self) -> Result<StopReport, CaptureError> {
        if self.state == SessionState::Closed {
            return Ok(StopReport::default());
        }

        self.transition(SessionState::Stopping);
        self.running.store(false, Ordering::SeqCst);
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        let mut report = StopReport::default();
        let mut failure = None;

        if let Some(handle) = self.handle.take() {
            if let Some(socket) = &self.socket {
                if let Err(e) = socket.interrupt() {
                    warn!("Failed to interrupt capture loop: {}", e);
                }
            }

            let outcome = match &self.done_rx {
                Some(done_rx) => done_rx.recv_timeout(self.config.stop_deadline),
                None => Err(RecvTimeoutError::Disconnected),
            };
            self.done_rx = None;

            match outcome {
                Ok(outcome) => {
                    if handle.join().is_err() {
                        error!("Capture thread panicked after finishing");
                    }
                    report.started = outcome.started;
                    report.packets = outcome.packets;
                    report.undersized = outcome.undersized;
                    failure = outcome.error.map(CaptureError::ReceiveFailure);
                }
                Err(RecvTimeoutError::Timeout) => {
                    warn!(
                        "Capture loop did not stop within {:?}, abandoning it",
                        self.config.stop_deadline
                    );
                    report.forced = true;
                    drop(handle);
                }
                Err(RecvTimeoutError::Disconnected) => {
                    let _ = handle.join();
                    error!("Capture thread exited without reporting");
                }
            }
        }

        if self.socket.take().is_some() {
            debug!("Released raw socket on {}", self.interface_name());
        }

        self.transition(SessionState::Closed);
        info!(
            "Capture stopped: {} packets, {} undersized",
            report.packets, report.undersized
        );

        match failure {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    fn expect_state(&self, expected: SessionState, action: &'static str) -> Result<(), CaptureError> {
        if self.state != expected {
            return Err(CaptureError::InvalidTransition {
                action,
                state: self.state,
            });
        }
        Ok(())
    }

    fn transition(&mut self, next: SessionState) {
        debug!("Session {} -> {}", self.state, next);
        self.state = next;
    }

    fn interface_name(&self) -> String {
        self.interface
            .as_ref()
            .map(|i| i.display_name().to_string())
            .unwrap_or_else(|| crate::domain::UNKNOWN.to_string())
    }
}

impl<S: RawSocket> Drop for CaptureSession<S> {
    fn drop(&mut self) {
        if self.state != SessionState::Closed {
            if let Err(e) = self.stop() {
                error!("Capture ended with error: {}", e);
            }
        }
    }
}

/// Body of the capture thread.
fn run_loop<S, R>(
    socket: Arc<S>,
    running: Arc<AtomicBool>,
    stop_rx: Receiver<()>,
    mut reporter: R,
    settings: LoopSettings,
) -> LoopOutcome
where
    S: RawSocket,
    R: PacketReporter,
{
    let mut outcome = LoopOutcome::default();

    match stop_rx.recv_timeout(settings.startup_delay) {
        Err(RecvTimeoutError::Timeout) => {}
        Ok(()) | Err(RecvTimeoutError::Disconnected) => {
            info!("Capture cancelled before start");
            return outcome;
        }
    }
    if !running.load(Ordering::SeqCst) {
        info!("Capture cancelled before start");
        return outcome;
    }

    outcome.started = true;
    reporter.on_start(&settings.interface);
    info!("Capturing on {}", settings.interface);

    let mut buf = vec![0u8; settings.recv_buffer];
    let mut sequence: u64 = 0;

    while running.load(Ordering::SeqCst) {
        let len = match socket.recv(&mut buf) {
            Ok(len) => len,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => {
                trace!("Receive interrupted");
                continue;
            }
            Err(e) => {
                error!("Receive failed: {}", e);
                outcome.error = Some(e);
                break;
            }
        };

        sequence += 1;
        let timestamp = SystemTime::now();

        if len < HEADER_LEN {
            warn!("Undersized datagram #{}: {} bytes", sequence, len);
            outcome.undersized += 1;
            reporter.report(&CaptureEvent::UndersizedDatagram {
                sequence,
                timestamp,
                datagram: &buf[..len],
            });
            continue;
        }

        let summary = match PacketView::new(&mut buf[..len]) {
            Ok(packet) => packet.summary(),
            Err(e) => {
                warn!("Dropping datagram #{}: {}", sequence, e);
                continue;
            }
        };
        debug!(
            "Datagram #{}: {} -> {} proto {} len {}",
            sequence, summary.source, summary.destination, summary.protocol, summary.total_length
        );

        outcome.packets += 1;
        reporter.report(&CaptureEvent::Packet {
            sequence,
            timestamp,
            summary,
            datagram: &buf[..len],
        });
    }

    reporter.on_stop();
    outcome
}
