//! IPv4 packet view: a header view plus the bytes that follow it.

use super::header::{HeaderView, Region, HEADER_LEN};
use super::summary::PacketSummary;
use crate::error::HeaderError;

/// Borrowed IPv4 datagram split into its fixed header and an opaque payload.
///
/// The payload covers everything after the first 20 bytes, options included.
/// Options are never decoded; [`PacketView::has_options`] only reports them.
#[derive(Debug)]
pub struct PacketView<'a> {
    header: HeaderView<'a>,
    payload: &'a mut [u8],
}

impl PacketView<'static> {
    /// A fresh zeroed header with an empty payload.
    pub fn empty() -> Self {
        Self {
            header: HeaderView::zeroed(),
            payload: Default::default(),
        }
    }
}

impl<'a> PacketView<'a> {
    pub fn new(region: impl Into<Region<'a>>) -> Result<Self, HeaderError> {
        match region.into() {
            Region::Absent => Ok(PacketView::empty()),
            Region::Shared(_) => Err(HeaderError::InvalidBuffer(
                "packet requires a writable region".to_string(),
            )),
            Region::Exclusive(bytes) => {
                if bytes.len() < HEADER_LEN {
                    return Err(HeaderError::InvalidBuffer(format!(
                        "packet requires at least {} bytes, got {}",
                        HEADER_LEN,
                        bytes.len()
                    )));
                }
                let (head, payload) = bytes.split_at_mut(HEADER_LEN);
                Ok(Self {
                    header: HeaderView::new(head)?,
                    payload,
                })
            }
        }
    }

    pub fn header(&self) -> &HeaderView<'a> {
        &self.header
    }

    pub fn header_mut(&mut self) -> &mut HeaderView<'a> {
        &mut self.header
    }

    pub fn payload(&self) -> &[u8] {
        &*self.payload
    }

    pub fn payload_mut(&mut self) -> &mut [u8] {
        &mut *self.payload
    }

    /// Point the payload at another region and return the previous one.
    ///
    /// The view never grows its backing memory; a larger payload needs a
    /// larger region from the caller.
    pub fn set_payload(&mut self, payload: &'a mut [u8]) -> &'a mut [u8] {
        std::mem::replace(&mut self.payload, payload)
    }

    /// Copy `data` into the start of the current payload region.
    pub fn write_payload(&mut self, data: &[u8]) -> Result<(), HeaderError> {
        if data.len() > self.payload.len() {
            return Err(HeaderError::InvalidBuffer(format!(
                "payload of {} bytes does not fit region of {} bytes",
                data.len(),
                self.payload.len()
            )));
        }
        self.payload[..data.len()].copy_from_slice(data);
        Ok(())
    }

    pub fn has_options(&self) -> bool {
        self.header.has_options()
    }

    pub fn summary(&self) -> PacketSummary {
        PacketSummary::from_header(&self.header, self.payload.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_region_gives_zero_header_and_empty_payload() {
        let packet = PacketView::new(None::<&mut [u8]>).unwrap();
        assert_eq!(packet.header().as_bytes(), &[0u8; HEADER_LEN]);
        assert!(packet.payload().is_empty());
    }

    #[test]
    fn splits_header_and_payload() {
        let mut buf = vec![0u8; 28];
        buf[0] = 0x45;
        buf[20..].copy_from_slice(b"payload!");

        let packet = PacketView::new(&mut buf).unwrap();
        assert_eq!(packet.header().get_version(), 4);
        assert_eq!(packet.payload(), b"payload!");
        assert!(!packet.has_options());
    }

    #[test]
    fn exactly_twenty_bytes_has_empty_payload() {
        let mut buf = [0u8; HEADER_LEN];
        let packet = PacketView::new(&mut buf).unwrap();
        assert_eq!(packet.payload().len(), 0);
    }

    #[test]
    fn rejects_short_and_read_only_regions() {
        let mut short = [0u8; 19];
        assert!(matches!(
            PacketView::new(&mut short),
            Err(HeaderError::InvalidBuffer(_))
        ));

        let shared = [0u8; 40];
        assert!(matches!(
            PacketView::new(&shared),
            Err(HeaderError::InvalidBuffer(_))
        ));
    }

    #[test]
    fn header_and_payload_writes_reach_buffer() {
        let mut buf = [0u8; 24];
        {
            let mut packet = PacketView::new(&mut buf).unwrap();
            packet.header_mut().set_ttl(128);
            packet.payload_mut()[0] = 0xaa;
            packet.write_payload(&[1, 2]).unwrap();
        }
        assert_eq!(buf[8], 128);
        assert_eq!(&buf[20..24], &[1u8, 2, 0, 0]);
    }

    #[test]
    fn write_payload_rejects_oversized_data() {
        let mut buf = [0u8; 22];
        let mut packet = PacketView::new(&mut buf).unwrap();
        let result = packet.write_payload(&[0; 3]);
        assert!(matches!(result, Err(HeaderError::InvalidBuffer(_))));
        assert_eq!(packet.payload(), &[0u8, 0]);
    }

    #[test]
    fn set_payload_rebinds_to_new_region() {
        let mut buf = [0u8; 22];
        let mut larger = [7u8; 100];
        let mut packet = PacketView::new(&mut buf).unwrap();

        let previous = packet.set_payload(&mut larger);
        assert_eq!(previous.len(), 2);
        assert_eq!(packet.payload().len(), 100);
        assert_eq!(packet.summary().payload_len, 100);
    }

    #[test]
    fn reports_options_from_ihl() {
        let mut buf = [0u8; 32];
        buf[0] = 0x47;
        let packet = PacketView::new(&mut buf).unwrap();
        assert!(packet.has_options());
    }
}
