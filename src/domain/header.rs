//! Zero-copy view over a fixed IPv4 header.
//!
//! Field layout follows RFC 791 section 3.1. All accessors read and write the
//! underlying bytes directly; nothing is cached.

use std::fmt;
use std::net::Ipv4Addr;

use crate::error::HeaderError;

/// Length of the fixed IPv4 header in bytes.
pub const HEADER_LEN: usize = 20;

/// Largest value of the 13-bit fragment offset.
pub const MAX_FRAGMENT_OFFSET: u16 = 0x1fff;

const FLAG_RESERVED: u8 = 0b1000_0000;
const FLAG_DF: u8 = 0b0100_0000;
const FLAG_MF: u8 = 0b0010_0000;

/// A byte region a view can be built over.
///
/// Only `Exclusive` regions of at least [`HEADER_LEN`] bytes can back a view.
/// `Absent` asks the view to allocate its own zeroed header.
#[derive(Debug)]
pub enum Region<'a> {
    Absent,
    Shared(&'a [u8]),
    Exclusive(&'a mut [u8]),
}

impl<'a> From<&'a mut [u8]> for Region<'a> {
    fn from(bytes: &'a mut [u8]) -> Self {
        Region::Exclusive(bytes)
    }
}

impl<'a, const N: usize> From<&'a mut [u8; N]> for Region<'a> {
    fn from(bytes: &'a mut [u8; N]) -> Self {
        Region::Exclusive(bytes)
    }
}

impl<'a> From<&'a mut Vec<u8>> for Region<'a> {
    fn from(bytes: &'a mut Vec<u8>) -> Self {
        Region::Exclusive(bytes.as_mut_slice())
    }
}

impl<'a> From<&'a [u8]> for Region<'a> {
    fn from(bytes: &'a [u8]) -> Self {
        Region::Shared(bytes)
    }
}

impl<'a, const N: usize> From<&'a [u8; N]> for Region<'a> {
    fn from(bytes: &'a [u8; N]) -> Self {
        Region::Shared(bytes)
    }
}

impl<'a, T> From<Option<T>> for Region<'a>
where
    T: Into<Region<'a>>,
{
    fn from(region: Option<T>) -> Self {
        region.map(Into::into).unwrap_or(Region::Absent)
    }
}

/// ECN codepoints as defined by RFC 3168 section 5.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EcnCodepoint {
    NotEct,
    Ect1,
    Ect0,
    CongestionExperienced,
}

impl EcnCodepoint {
    /// Map the raw 2-bit ECN field.
    pub fn from_bits(bits: u8) -> Self {
        match bits & 0b11 {
            0b00 => EcnCodepoint::NotEct,
            0b01 => EcnCodepoint::Ect1,
            0b10 => EcnCodepoint::Ect0,
            _ => EcnCodepoint::CongestionExperienced,
        }
    }
}

impl fmt::Display for EcnCodepoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EcnCodepoint::NotEct => "Not-ECT",
            EcnCodepoint::Ect1 => "ECT(1)",
            EcnCodepoint::Ect0 => "ECT(0)",
            EcnCodepoint::CongestionExperienced => "CE",
        };
        f.write_str(name)
    }
}

#[derive(Debug)]
enum Storage<'a> {
    Borrowed(&'a mut [u8]),
    Owned([u8; HEADER_LEN]),
}

/// Mutable view over the first 20 bytes of an IPv4 datagram.
///
/// Setters for sub-byte fields only touch their own bits. Setters that can
/// overflow validate before writing, so a rejected call leaves the bytes as
/// they were.
#[derive(Debug)]
pub struct HeaderView<'a> {
    storage: Storage<'a>,
}

impl HeaderView<'static> {
    /// A view over its own zero-filled header.
    pub fn zeroed() -> Self {
        Self {
            storage: Storage::Owned([0u8; HEADER_LEN]),
        }
    }
}

impl<'a> HeaderView<'a> {
    /// Build a view over `region`.
    ///
    /// Only the first [`HEADER_LEN`] bytes of the region are borrowed.
    pub fn new(region: impl Into<Region<'a>>) -> Result<Self, HeaderError> {
        match region.into() {
            Region::Absent => Ok(Self {
                storage: Storage::Owned([0u8; HEADER_LEN]),
            }),
            Region::Shared(_) => Err(HeaderError::InvalidBuffer(
                "header requires a writable region".to_string(),
            )),
            Region::Exclusive(bytes) => {
                if bytes.len() < HEADER_LEN {
                    return Err(HeaderError::InvalidBuffer(format!(
                        "header requires at least {} bytes, got {}",
                        HEADER_LEN,
                        bytes.len()
                    )));
                }
                let (head, _) = bytes.split_at_mut(HEADER_LEN);
                Ok(Self {
                    storage: Storage::Borrowed(head),
                })
            }
        }
    }

    /// The raw header bytes.
    pub fn as_bytes(&self) -> &[u8] {
        match &self.storage {
            Storage::Borrowed(bytes) => bytes,
            Storage::Owned(bytes) => bytes,
        }
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        match &mut self.storage {
            Storage::Borrowed(bytes) => bytes,
            Storage::Owned(bytes) => bytes,
        }
    }

    fn byte(&self, index: usize) -> u8 {
        self.as_bytes()[index]
    }

    fn word(&self, index: usize) -> u16 {
        let b = self.as_bytes();
        u16::from_be_bytes([b[index], b[index + 1]])
    }

    fn set_word(&mut self, index: usize, value: u16) {
        self.bytes_mut()[index..index + 2].copy_from_slice(&value.to_be_bytes());
    }

    /// Replace the bits selected by `mask` in byte `index` with `bits`.
    fn write_masked(&mut self, index: usize, mask: u8, bits: u8) {
        let b = self.bytes_mut();
        b[index] = (b[index] & !mask) | (bits & mask);
    }

    /// IP version nibble; 4 for IPv4.
    pub fn get_version(&self) -> u8 {
        self.byte(0) >> 4
    }

    /// Set the version nibble, rejecting values above 15.
    pub fn set_version(&mut self, version: u8) -> Result<(), HeaderError> {
        check_range("version", version.into(), 0x0f)?;
        self.write_masked(0, 0xf0, version << 4);
        Ok(())
    }

    /// Internet Header Length in 32-bit words.
    pub fn get_ihl(&self) -> u8 {
        self.byte(0) & 0x0f
    }

    /// Set IHL, rejecting values above 15.
    pub fn set_ihl(&mut self, ihl: u8) -> Result<(), HeaderError> {
        check_range("ihl", ihl.into(), 0x0f)?;
        self.write_masked(0, 0x0f, ihl);
        Ok(())
    }

    /// Header length in bytes as declared by IHL.
    pub fn header_len(&self) -> usize {
        usize::from(self.get_ihl()) * 4
    }

    /// Whether IHL announces options after the fixed header.
    pub fn has_options(&self) -> bool {
        self.get_ihl() > 5
    }

    /// Differentiated Services Code Point.
    pub fn get_dscp(&self) -> u8 {
        self.byte(1) >> 2
    }

    /// Set DSCP, rejecting values above 63.
    pub fn set_dscp(&mut self, dscp: u8) -> Result<(), HeaderError> {
        check_range("dscp", dscp.into(), 0x3f)?;
        self.write_masked(1, 0xfc, dscp << 2);
        Ok(())
    }

    /// Raw 2-bit ECN field.
    pub fn get_ecn(&self) -> u8 {
        self.byte(1) & 0x03
    }

    /// Set the raw ECN bits, rejecting values above 3.
    pub fn set_ecn(&mut self, ecn: u8) -> Result<(), HeaderError> {
        check_range("ecn", ecn.into(), 0x03)?;
        self.write_masked(1, 0x03, ecn);
        Ok(())
    }

    /// ECN field decoded per RFC 3168.
    pub fn ecn_codepoint(&self) -> EcnCodepoint {
        EcnCodepoint::from_bits(self.get_ecn())
    }

    /// Length of the whole datagram in bytes.
    pub fn get_total_length(&self) -> u16 {
        self.word(2)
    }

    /// Set the datagram length in bytes.
    pub fn set_total_length(&mut self, length: u16) {
        self.set_word(2, length);
    }

    /// Identification used to group fragments.
    pub fn get_identification(&self) -> u16 {
        self.word(4)
    }

    /// Set the fragment identification value.
    pub fn set_identification(&mut self, identification: u16) {
        self.set_word(4, identification);
    }

    /// The three flag bits: reserved, DF, MF (most significant first).
    pub fn get_flags(&self) -> u8 {
        self.byte(6) >> 5
    }

    /// Set all three flag bits, rejecting values above 7.
    pub fn set_flags(&mut self, flags: u8) -> Result<(), HeaderError> {
        check_range("flags", flags.into(), 0x07)?;
        self.write_masked(6, 0xe0, flags << 5);
        Ok(())
    }

    /// Reserved (evil) bit.
    pub fn get_flag_reserved(&self) -> bool {
        self.byte(6) & FLAG_RESERVED != 0
    }

    /// Set or clear the reserved bit.
    pub fn set_flag_reserved(&mut self, set: bool) {
        self.write_masked(6, FLAG_RESERVED, if set { FLAG_RESERVED } else { 0 });
    }

    /// Don't Fragment.
    pub fn get_flag_df(&self) -> bool {
        self.byte(6) & FLAG_DF != 0
    }

    /// Set or clear Don't Fragment.
    pub fn set_flag_df(&mut self, set: bool) {
        self.write_masked(6, FLAG_DF, if set { FLAG_DF } else { 0 });
    }

    /// More Fragments.
    pub fn get_flag_mf(&self) -> bool {
        self.byte(6) & FLAG_MF != 0
    }

    /// Set or clear More Fragments.
    pub fn set_flag_mf(&mut self, set: bool) {
        self.write_masked(6, FLAG_MF, if set { FLAG_MF } else { 0 });
    }

    /// Fragment offset in 8-byte blocks, without the flag bits.
    pub fn get_fragment_offset(&self) -> u16 {
        self.word(6) & MAX_FRAGMENT_OFFSET
    }

    /// Set the fragment offset, rejecting values above 8191.
    pub fn set_fragment_offset(&mut self, offset: u16) -> Result<(), HeaderError> {
        check_range("fragment offset", offset.into(), MAX_FRAGMENT_OFFSET.into())?;
        let [high, low] = offset.to_be_bytes();
        self.write_masked(6, 0x1f, high);
        self.bytes_mut()[7] = low;
        Ok(())
    }

    /// Time to live.
    pub fn get_ttl(&self) -> u8 {
        self.byte(8)
    }

    /// Set time to live.
    pub fn set_ttl(&mut self, ttl: u8) {
        self.bytes_mut()[8] = ttl;
    }

    /// Next level protocol number (IANA assigned).
    pub fn get_protocol(&self) -> u8 {
        self.byte(9)
    }

    /// Set the next level protocol number.
    pub fn set_protocol(&mut self, protocol: u8) {
        self.bytes_mut()[9] = protocol;
    }

    /// Header checksum as stored.
    pub fn get_checksum(&self) -> u16 {
        self.word(10)
    }

    /// Store a checksum without validating it.
    pub fn set_checksum(&mut self, checksum: u16) {
        self.set_word(10, checksum);
    }

    /// RFC 1071 checksum of the fixed header, computed with the checksum
    /// field taken as zero.
    pub fn compute_checksum(&self) -> u16 {
        let b = self.as_bytes();
        let mut sum: u32 = 0;
        for (i, pair) in b.chunks_exact(2).enumerate() {
            if i == 5 {
                continue;
            }
            sum += u32::from(u16::from_be_bytes([pair[0], pair[1]]));
        }
        while sum > 0xffff {
            sum = (sum & 0xffff) + (sum >> 16);
        }
        !(sum as u16)
    }

    /// Whether the stored checksum matches the header contents.
    pub fn checksum_valid(&self) -> bool {
        self.compute_checksum() == self.get_checksum()
    }

    /// Recompute and store the header checksum.
    pub fn update_checksum(&mut self) {
        let checksum = self.compute_checksum();
        self.set_checksum(checksum);
    }

    /// Source address as a big-endian 32-bit integer.
    pub fn get_source(&self) -> u32 {
        self.address(12)
    }

    /// Set the source address from a 32-bit integer.
    pub fn set_source(&mut self, address: u32) {
        self.set_address(12, address);
    }

    /// Source address.
    pub fn get_source_addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.get_source())
    }

    /// Set the source address.
    pub fn set_source_addr(&mut self, address: Ipv4Addr) {
        self.set_source(address.into());
    }

    /// Source address as four octets.
    pub fn get_source_octets(&self) -> [u8; 4] {
        self.get_source().to_be_bytes()
    }

    /// Set the source address from four octets.
    pub fn set_source_octets(&mut self, octets: [u8; 4]) {
        self.set_source(u32::from_be_bytes(octets));
    }

    /// Destination address as a big-endian 32-bit integer.
    pub fn get_destination(&self) -> u32 {
        self.address(16)
    }

    /// Set the destination address from a 32-bit integer.
    pub fn set_destination(&mut self, address: u32) {
        self.set_address(16, address);
    }

    /// Destination address.
    pub fn get_destination_addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.get_destination())
    }

    /// Set the destination address.
    pub fn set_destination_addr(&mut self, address: Ipv4Addr) {
        self.set_destination(address.into());
    }

    /// Destination address as four octets.
    pub fn get_destination_octets(&self) -> [u8; 4] {
        self.get_destination().to_be_bytes()
    }

    /// Set the destination address from four octets.
    pub fn set_destination_octets(&mut self, octets: [u8; 4]) {
        self.set_destination(u32::from_be_bytes(octets));
    }

    fn address(&self, index: usize) -> u32 {
        let b = self.as_bytes();
        u32::from_be_bytes([b[index], b[index + 1], b[index + 2], b[index + 3]])
    }

    fn set_address(&mut self, index: usize, address: u32) {
        self.bytes_mut()[index..index + 4].copy_from_slice(&address.to_be_bytes());
    }
}

fn check_range(field: &'static str, value: u32, max: u32) -> Result<(), HeaderError> {
    if value > max {
        return Err(HeaderError::FieldOverflow { field, value, max });
    }
    Ok(())
}
