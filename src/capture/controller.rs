//! Capture control surface used by the CLI.

use tracing::{info, warn};

use super::{CaptureSession, SessionState, SocketOpener, StopReport};
use crate::config::Config;
use crate::discovery::InterfaceSource;
use crate::domain::{InterfaceCatalog, InterfaceDescriptor};
use crate::error::CaptureError;
use crate::reporter::PacketReporter;

/// Ties interface discovery, selection and one capture session together.
pub struct CaptureController<I, O>
where
    I: InterfaceSource,
    O: SocketOpener,
{
    source: I,
    opener: O,
    config: Config,
    selected: Option<InterfaceDescriptor>,
    session: Option<CaptureSession<O::Socket>>,
}

impl<I, O> CaptureController<I, O>
where
    I: InterfaceSource,
    O: SocketOpener,
{
    pub fn new(source: I, opener: O, config: Config) -> Self {
        Self {
            source,
            opener,
            config,
            selected: None,
            session: None,
        }
    }

    pub fn list_interfaces(&self) -> InterfaceCatalog {
        self.source.enumerate_interfaces()
    }

    /// Choose the interface the next capture binds to.
    pub fn select_interface(&mut self, interface: InterfaceDescriptor) -> Result<(), CaptureError> {
        if !interface.is_usable() {
            return Err(CaptureError::InterfaceUnusable(
                interface.display_name().to_string(),
            ));
        }
        info!("Selected interface {}", interface.display_name());
        self.selected = Some(interface);
        Ok(())
    }

    pub fn selected(&self) -> Option<&InterfaceDescriptor> {
        self.selected.as_ref()
    }

    /// Open, bind and start a capture on the selected interface.
    ///
    /// A failure at any step closes the half-built session before returning.
    pub fn start_capture<R>(&mut self, reporter: R) -> Result<(), CaptureError>
    where
        R: PacketReporter + 'static,
    {
        if let Some(session) = &self.session {
            if session.state() != SessionState::Closed {
                return Err(CaptureError::InvalidTransition {
                    action: "start capture",
                    state: session.state(),
                });
            }
        }
        let interface = self
            .selected
            .clone()
            .ok_or(CaptureError::NoInterfaceSelected)?;

        let mut session = CaptureSession::new(self.config.clone());
        if let Err(e) = bring_up(&mut session, &self.opener, &interface, reporter) {
            if let Err(cleanup) = session.stop() {
                warn!("Cleanup after failed start ended with error: {}", cleanup);
            }
            return Err(e);
        }

        self.session = Some(session);
        Ok(())
    }

    /// Stop the running capture, if any.
    pub fn stop_capture(&mut self) -> Result<StopReport, CaptureError> {
        match self.session.as_mut() {
            Some(session) => session.stop(),
            None => Ok(StopReport::default()),
        }
    }

    pub fn is_running(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.is_running())
    }

    pub fn state(&self) -> Option<SessionState> {
        self.session.as_ref().map(|s| s.state())
    }
}

fn bring_up<O, R>(
    session: &mut CaptureSession<O::Socket>,
    opener: &O,
    interface: &InterfaceDescriptor,
    reporter: R,
) -> Result<(), CaptureError>
where
    O: SocketOpener,
    R: PacketReporter + 'static,
{
    session.open(opener, interface)?;
    session.enable_promiscuous()?;
    session.start(reporter)
}
