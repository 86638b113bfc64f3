//! Interface descriptors and the catalog they are selected from.

use std::fmt;
use std::net::Ipv4Addr;

use macaddr::MacAddr6;

use crate::error::CaptureError;

/// Marker printed for fields that discovery could not fill in.
pub const UNKNOWN: &str = "unknown";

/// A network interface as reported by discovery.
///
/// Any field may be `None` when discovery only partly succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceDescriptor {
    pub name: Option<String>,
    pub ipv4: Option<Ipv4Addr>,
    pub mac: Option<MacAddr6>,
}

impl InterfaceDescriptor {
    pub fn new(name: impl Into<String>, ipv4: Ipv4Addr, mac: MacAddr6) -> Self {
        Self {
            name: Some(name.into()),
            ipv4: Some(ipv4),
            mac: Some(mac),
        }
    }

    /// Whether the interface can be bound for capture.
    pub fn is_usable(&self) -> bool {
        self.ipv4.is_some()
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNKNOWN)
    }

    pub fn display_ipv4(&self) -> String {
        self.ipv4
            .map(|ip| ip.to_string())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }

    pub fn display_mac(&self) -> String {
        self.mac
            .map(|mac| mac.to_string().to_lowercase())
            .unwrap_or_else(|| UNKNOWN.to_string())
    }
}

impl fmt::Display for InterfaceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<20} {:<20} {}",
            self.display_ipv4(),
            self.display_mac(),
            self.display_name()
        )
    }
}

/// Ordered result of one interface enumeration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterfaceCatalog {
    interfaces: Vec<InterfaceDescriptor>,
}

impl InterfaceCatalog {
    pub fn new(interfaces: Vec<InterfaceDescriptor>) -> Self {
        Self { interfaces }
    }

    pub fn is_empty(&self) -> bool {
        self.interfaces.is_empty()
    }

    pub fn len(&self) -> usize {
        self.interfaces.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InterfaceDescriptor> {
        self.interfaces.iter()
    }

    /// Entries that carry an IPv4 address to bind to.
    pub fn usable(&self) -> Vec<&InterfaceDescriptor> {
        self.interfaces.iter().filter(|i| i.is_usable()).collect()
    }

    pub fn get(&self, index: usize) -> Option<&InterfaceDescriptor> {
        self.interfaces.get(index)
    }

    pub fn find(&self, name: &str) -> Option<&InterfaceDescriptor> {
        self.interfaces
            .iter()
            .find(|i| i.name.as_deref() == Some(name))
    }

    /// The only usable entry, if there is exactly one.
    pub fn sole(&self) -> Result<Option<&InterfaceDescriptor>, CaptureError> {
        let usable = self.usable();
        match usable.len() {
            0 => Err(CaptureError::NoInterfaces),
            1 => Ok(Some(usable[0])),
            _ => Ok(None),
        }
    }
}

impl From<Vec<InterfaceDescriptor>> for InterfaceCatalog {
    fn from(interfaces: Vec<InterfaceDescriptor>) -> Self {
        Self::new(interfaces)
    }
}
