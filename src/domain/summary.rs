//! Decoded header record handed to reporters.

use std::net::Ipv4Addr;

use super::header::{EcnCodepoint, HeaderView};

/// Every fixed-header field of one datagram, plus its payload length.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketSummary {
    pub version: u8,
    pub ihl: u8,
    pub dscp: u8,
    pub ecn: u8,
    pub total_length: u16,
    pub identification: u16,
    pub flags: u8,
    pub fragment_offset: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    /// Whether `checksum` matches the fixed header contents.
    pub checksum_valid: bool,
    pub source: Ipv4Addr,
    pub destination: Ipv4Addr,
    pub payload_len: usize,
}

impl PacketSummary {
    pub fn from_header(header: &HeaderView<'_>, payload_len: usize) -> Self {
        Self {
            version: header.get_version(),
            ihl: header.get_ihl(),
            dscp: header.get_dscp(),
            ecn: header.get_ecn(),
            total_length: header.get_total_length(),
            identification: header.get_identification(),
            flags: header.get_flags(),
            fragment_offset: header.get_fragment_offset(),
            ttl: header.get_ttl(),
            protocol: header.get_protocol(),
            checksum: header.get_checksum(),
            checksum_valid: header.checksum_valid(),
            source: header.get_source_addr(),
            destination: header.get_destination_addr(),
            payload_len,
        }
    }

    pub fn ecn_codepoint(&self) -> EcnCodepoint {
        EcnCodepoint::from_bits(self.ecn)
    }

    /// Short name of well-known next level protocols.
    pub fn protocol_name(&self) -> Option<&'static str> {
        let name = match self.protocol {
            1 => "ICMP",
            2 => "IGMP",
            6 => "TCP",
            17 => "UDP",
            41 => "IPv6",
            47 => "GRE",
            50 => "ESP",
            51 => "AH",
            89 => "OSPF",
            132 => "SCTP",
            _ => return None,
        };
        Some(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::HEADER_LEN;

    #[test]
    fn copies_every_field() {
        let mut buf: [u8; HEADER_LEN] = [
            0x45, 0x00, 0x00, 0x73, 0x00, 0x00, 0x40, 0x00, 0x40, 0x11, 0xb8, 0x61, 0xc0, 0xa8,
            0x00, 0x01, 0xc0, 0xa8, 0x00, 0xc7,
        ];
        let view = HeaderView::new(&mut buf).unwrap();
        let summary = PacketSummary::from_header(&view, 95);

        assert_eq!(summary.version, 4);
        assert_eq!(summary.ihl, 5);
        assert_eq!(summary.total_length, 0x73);
        assert_eq!(summary.flags, 0b010);
        assert_eq!(summary.fragment_offset, 0);
        assert_eq!(summary.ttl, 64);
        assert_eq!(summary.protocol_name(), Some("UDP"));
        assert!(summary.checksum_valid);
        assert_eq!(summary.source, Ipv4Addr::new(192, 168, 0, 1));
        assert_eq!(summary.destination, Ipv4Addr::new(192, 168, 0, 199));
        assert_eq!(summary.payload_len, 95);
    }

    #[test]
    fn unknown_protocol_has_no_name() {
        let mut buf = [0u8; HEADER_LEN];
        buf[9] = 253;
        let view = HeaderView::new(&mut buf).unwrap();
        assert_eq!(PacketSummary::from_header(&view, 0).protocol_name(), None);
    }
}
