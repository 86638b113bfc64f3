//! Reporting module for captured datagrams.
//!
//! This module defines the `PacketReporter` trait and provides console, pcap
//! file and fan-out implementations.

mod console_reporter;
mod pcap_reporter;

pub use console_reporter::ConsoleReporter;
pub use pcap_reporter::PcapReporter;

use crate::domain::CaptureEvent;

/// Sink for capture events.
///
/// Reporters run on the capture thread. They decide formatting and
/// persistence; the capture loop never inspects what they do.
pub trait PacketReporter: Send {
    /// Report one received datagram.
    fn report(&mut self, event: &CaptureEvent<'_>);

    /// Called once when the loop starts receiving.
    fn on_start(&mut self, interface: &str) {
        let _ = interface;
    }

    /// Called once when the loop exits.
    fn on_stop(&mut self) {}
}

impl<R: PacketReporter + ?Sized> PacketReporter for Box<R> {
    fn report(&mut self, event: &CaptureEvent<'_>) {
        (**self).report(event)
    }

    fn on_start(&mut self, interface: &str) {
        (**self).on_start(interface)
    }

    fn on_stop(&mut self) {
        (**self).on_stop()
    }
}

/// Forwards every call to each inner reporter in order.
#[derive(Default)]
pub struct FanoutReporter {
    reporters: Vec<Box<dyn PacketReporter>>,
}

impl FanoutReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, reporter: impl PacketReporter + 'static) -> Self {
        self.reporters.push(Box::new(reporter));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.reporters.is_empty()
    }
}

impl PacketReporter for FanoutReporter {
    fn report(&mut self, event: &CaptureEvent<'_>) {
        for reporter in &mut self.reporters {
            reporter.report(event);
        }
    }

    fn on_start(&mut self, interface: &str) {
        for reporter in &mut self.reporters {
            reporter.on_start(interface);
        }
    }

    fn on_stop(&mut self) {
        for reporter in &mut self.reporters {
            reporter.on_stop();
        }
    }
}
