//! pnet-based interface discovery.

use std::net::IpAddr;

use macaddr::MacAddr6;
use pnet::datalink::{self, NetworkInterface};
use tracing::debug;

use super::InterfaceSource;
use crate::domain::{InterfaceCatalog, InterfaceDescriptor};

/// Enumerates interfaces through `pnet::datalink`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PnetInterfaces;

impl PnetInterfaces {
    pub fn new() -> Self {
        Self
    }

    /// OS interface index of the interface owning `iface`'s address,
    /// falling back to a lookup by name.
    pub fn index_of(iface: &InterfaceDescriptor) -> Option<u32> {
        let interfaces = datalink::interfaces();

        if let Some(ipv4) = iface.ipv4 {
            let owner = interfaces
                .iter()
                .find(|i| i.ips.iter().any(|net| net.ip() == IpAddr::V4(ipv4)));
            if let Some(owner) = owner {
                return Some(owner.index);
            }
        }

        let name = iface.name.as_deref()?;
        interfaces.iter().find(|i| i.name == name).map(|i| i.index)
    }
}

impl InterfaceSource for PnetInterfaces {
    fn enumerate_interfaces(&self) -> InterfaceCatalog {
        let interfaces: Vec<_> = datalink::interfaces()
            .iter()
            .filter(|iface| iface.is_up())
            .map(describe)
            .collect();

        debug!("Discovered {} interfaces", interfaces.len());
        InterfaceCatalog::new(interfaces)
    }
}

/// Convert a pnet interface, leaving out whatever it does not report.
fn describe(iface: &NetworkInterface) -> InterfaceDescriptor {
    let name = if iface.name.is_empty() {
        None
    } else {
        Some(iface.name.clone())
    };

    let ipv4 = iface.ips.iter().find_map(|net| match net.ip() {
        IpAddr::V4(ip) => Some(ip),
        IpAddr::V6(_) => None,
    });

    let mac = iface.mac.map(|mac| MacAddr6::from(mac.octets()));

    InterfaceDescriptor { name, ipv4, mac }
}
