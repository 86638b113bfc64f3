//! Events emitted by the capture loop.

use std::time::SystemTime;

use super::summary::PacketSummary;

/// One received datagram, as forwarded to reporters.
///
/// Events borrow the receive buffer and are only valid for the duration of
/// the reporter call.
#[derive(Debug, Clone)]
pub enum CaptureEvent<'a> {
    /// A datagram long enough to carry an IPv4 header.
    Packet {
        sequence: u64,
        timestamp: SystemTime,
        summary: PacketSummary,
        datagram: &'a [u8],
    },
    /// A datagram shorter than the fixed header; never decoded.
    UndersizedDatagram {
        sequence: u64,
        timestamp: SystemTime,
        datagram: &'a [u8],
    },
}

impl<'a> CaptureEvent<'a> {
    pub fn sequence(&self) -> u64 {
        match self {
            CaptureEvent::Packet { sequence, .. } => *sequence,
            CaptureEvent::UndersizedDatagram { sequence, .. } => *sequence,
        }
    }

    pub fn timestamp(&self) -> SystemTime {
        match self {
            CaptureEvent::Packet { timestamp, .. } => *timestamp,
            CaptureEvent::UndersizedDatagram { timestamp, .. } => *timestamp,
        }
    }

    /// The raw bytes received from the socket.
    pub fn datagram(&self) -> &'a [u8] {
        match self {
            CaptureEvent::Packet { datagram, .. } => *datagram,
            CaptureEvent::UndersizedDatagram { datagram, .. } => *datagram,
        }
    }

    pub fn summary(&self) -> Option<&PacketSummary> {
        match self {
            CaptureEvent::Packet { summary, .. } => Some(summary),
            CaptureEvent::UndersizedDatagram { .. } => None,
        }
    }

    pub fn is_undersized(&self) -> bool {
        matches!(self, CaptureEvent::UndersizedDatagram { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HeaderView;

    #[test]
    fn undersized_event_has_no_summary() {
        let bytes = [0x45u8, 0x00, 0x00];
        let event = CaptureEvent::UndersizedDatagram {
            sequence: 3,
            timestamp: SystemTime::UNIX_EPOCH,
            datagram: &bytes,
        };
        assert!(event.is_undersized());
        assert!(event.summary().is_none());
        assert_eq!(event.sequence(), 3);
        assert_eq!(event.datagram().len(), 3);
    }

    #[test]
    fn packet_event_exposes_summary() {
        let view = HeaderView::zeroed();
        let summary = PacketSummary::from_header(&view, 0);
        let bytes = [0u8; 20];
        let event = CaptureEvent::Packet {
            sequence: 1,
            timestamp: SystemTime::UNIX_EPOCH,
            summary: summary.clone(),
            datagram: &bytes,
        };
        assert!(!event.is_undersized());
        assert_eq!(event.summary(), Some(&summary));
        assert_eq!(event.timestamp(), SystemTime::UNIX_EPOCH);
    }
}
