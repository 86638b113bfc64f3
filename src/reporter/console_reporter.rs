//! Console-based packet reporter.

use std::io::{self, Write};

use crate::domain::{CaptureEvent, PacketSummary};
use crate::reporter::PacketReporter;

/// Prints one table row per captured datagram.
pub struct ConsoleReporter<W: Write + Send = io::Stdout> {
    out: W,
    /// Whether to print identification, fragmentation and checksum columns
    verbose: bool,
}

impl ConsoleReporter<io::Stdout> {
    /// Create a reporter that writes to stdout.
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }
}

impl Default for ConsoleReporter<io::Stdout> {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write + Send> ConsoleReporter<W> {
    pub fn with_writer(out: W) -> Self {
        Self {
            out,
            verbose: false,
        }
    }

    /// Enable or disable the extra columns.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn format_header(&self) -> String {
        let mut line = format!(
            "{:>7}  {:<15}    {:<15} {:<5} {:>3} {:>3} {:>4} {:>7} {:>5}",
            "No.", "Source", "Destination", "Proto", "Ver", "IHL", "DSCP", "ECN", "Len"
        );
        if self.verbose {
            line.push_str(&format!(
                " {:>6} {:>5} {:>5} {:>3} {:>9}",
                "ID", "Flags", "Frag", "TTL", "Checksum"
            ));
        }
        line.push_str(&format!(" {:>7}", "Payload"));
        line
    }

    fn format_summary(&self, sequence: u64, summary: &PacketSummary) -> String {
        let proto = summary
            .protocol_name()
            .map(str::to_string)
            .unwrap_or_else(|| summary.protocol.to_string());

        let mut line = format!(
            "{:>7}  {:<15} -> {:<15} {:<5} {:>3} {:>3} {:>4} {:>7} {:>5}",
            sequence,
            summary.source,
            summary.destination,
            proto,
            summary.version,
            summary.ihl,
            summary.dscp,
            summary.ecn_codepoint().to_string(),
            summary.total_length,
        );

        if self.verbose {
            let checksum = format!(
                "{:#06x}{}",
                summary.checksum,
                if summary.checksum_valid { " " } else { "!" }
            );
            line.push_str(&format!(
                " {:>6} {:>5} {:>5} {:>3} {:>9}",
                summary.identification,
                format_flags(summary.flags),
                summary.fragment_offset,
                summary.ttl,
                checksum,
            ));
        }

        line.push_str(&format!(" {:>7}", summary.payload_len));
        line
    }

    fn format_event(&self, event: &CaptureEvent<'_>) -> String {
        match event {
            CaptureEvent::Packet {
                sequence, summary, ..
            } => self.format_summary(*sequence, summary),
            CaptureEvent::UndersizedDatagram {
                sequence, datagram, ..
            } => format!(
                "{:>7}  [undersized datagram: {} bytes]",
                sequence,
                datagram.len()
            ),
        }
    }
}

/// Render the three flag bits as `R`, `D`, `M` or `-`.
fn format_flags(flags: u8) -> String {
    let mut out = String::with_capacity(3);
    out.push(if flags & 0b100 != 0 { 'R' } else { '-' });
    out.push(if flags & 0b010 != 0 { 'D' } else { '-' });
    out.push(if flags & 0b001 != 0 { 'M' } else { '-' });
    out
}

impl<W: Write + Send> PacketReporter for ConsoleReporter<W> {
    fn report(&mut self, event: &CaptureEvent<'_>) {
        let output = self.format_event(event);
        let _ = writeln!(self.out, "{}", output);
    }

    fn on_start(&mut self, interface: &str) {
        let header = self.format_header();
        let _ = writeln!(self.out, "Listening on: {}", interface);
        let _ = writeln!(self.out, "Press Ctrl+C to stop.\n");
        let _ = writeln!(self.out, "{}", header);
    }

    fn on_stop(&mut self) {
        let _ = writeln!(self.out, "\nStopped capture.");
        let _ = self.out.flush();
    }
}
